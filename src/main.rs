mod cli;
mod config;
mod connection;
mod error;
mod filter;
mod input;
mod irc;
mod netinfo;
mod overlay;
mod render;
mod session;
mod shutdown;
mod store;
mod tags;
mod terminal;

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use env_logger::{Env, Target};
use log::{error, info, warn};

use crate::cli::Cli;
use crate::config::{Credentials, normalize_channel};
use crate::connection::{Connection, IngestEnd, Outbound, run_ingest};
use crate::error::Result;
use crate::filter::Blacklist;
use crate::overlay::{Overlay, OverlayConfig};
use crate::session::{DisplayMode, Session};

/// Time the server gets to act on PART and QUIT before the socket closes.
const FAREWELL_GRACE: Duration = Duration::from_millis(500);

// The terminal belongs to the chat view, so log records go to a file.
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn resolve_credentials(cli: &Cli) -> Result<Credentials> {
    if !cli.new_token
        && let Some(saved) = Credentials::load(&cli.config)?
    {
        info!("using saved credentials for {}", saved.nickname());
        return Ok(saved);
    }

    let token = cli::stdin_prompt("OAuth Token: ")?;
    let nickname = cli::stdin_prompt("Your Twitch Username: ")?;
    let credentials = Credentials::new(&token, &nickname)?;
    credentials.save(&cli.config)?;
    println!("Credentials saved!");
    Ok(credentials)
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    let credentials = resolve_credentials(&cli)?;
    let channel = match &cli.channel {
        Some(channel) => normalize_channel(channel)?,
        None => normalize_channel(&cli::stdin_prompt("Channel to Monitor: ")?)?,
    };
    let display = match cli.mode {
        Some(display) => display,
        None => cli::stdin_prompt_mode()?,
    };

    let blacklist = Blacklist::load(&cli.blacklist)?;
    if !blacklist.is_empty() {
        println!("Loaded {} blacklisted words", blacklist.len());
    }

    println!("Connecting to Twitch IRC...");
    let (connection, reader) = Connection::open(irc::HOST, irc::PORT)?;
    let connection = Arc::new(connection);
    let outbound: Arc<dyn Outbound> = connection.clone();
    let session = Arc::new(Session::new(
        &channel,
        credentials.nickname(),
        display,
        blacklist,
        outbound,
    ));

    if let Err(err) = session.join(credentials.token()) {
        connection.close();
        return Err(err.into());
    }
    println!("Connected! Monitoring #{channel}");
    info!(
        "joined #{} as {} in {:?} mode",
        session.channel(),
        session.nickname(),
        session.display()
    );

    let ingest = {
        let session = Arc::clone(&session);
        thread::spawn(move || run_ingest(&session, reader))
    };

    let mut overlay_thread = None;
    let front = match display {
        DisplayMode::Terminal => terminal::run(&session),
        DisplayMode::Web => {
            let config = OverlayConfig {
                template: cli.template.clone(),
                stylesheet: cli.stylesheet.clone(),
            };
            match Overlay::bind(SocketAddr::from(([0, 0, 0, 0], cli.port)), config) {
                Ok(overlay) => {
                    print_overlay_banner(cli.port);
                    let session_for_overlay = Arc::clone(&session);
                    overlay_thread =
                        Some(thread::spawn(move || overlay.run(&session_for_overlay)));
                    terminal::run_quit_prompt(&session);
                    Ok(())
                }
                Err(err) => Err(err.into()),
            }
        }
    };

    session.shutdown().cancel();
    if let Some(handle) = overlay_thread
        && handle.join().is_err()
    {
        error!("overlay thread panicked");
    }
    let ended = match ingest.join() {
        Ok(ended) => ended,
        Err(_) => {
            error!("ingest thread panicked");
            IngestEnd::ConnectionLost("ingest thread panicked".to_owned())
        }
    };

    match ended {
        IngestEnd::ConnectionLost(reason) => {
            warn!("connection lost: {reason}");
            println!("Connection lost");
        }
        IngestEnd::Cancelled => {
            if let Err(err) = session.leave() {
                warn!("could not say goodbye: {err}");
            }
            thread::sleep(FAREWELL_GRACE);
        }
    }
    connection.close();
    println!("Disconnected. See ya!");
    info!("session ended");

    front
}

fn print_overlay_banner(port: u16) {
    let network = netinfo::display_ipv4(netinfo::local_ipv4());
    println!();
    println!("Web chatbox running at:");
    println!("  Local:   http://localhost:{port}");
    println!("  Network: http://{network}:{port}");
    println!("Add this URL to OBS Browser Source");
    println!("Press 'q' and Enter to quit");
}

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("twitchchat failed: {err}");
        std::process::exit(1);
    }
}
