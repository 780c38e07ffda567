use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    BLACKLIST_FILE, CONFIG_FILE, LOG_FILE, STYLESHEET_FILE, TEMPLATE_FILE,
};
use crate::error::{Error, Result};
use crate::overlay::DEFAULT_PORT;
use crate::session::DisplayMode;

/// Read Twitch chat in the terminal, or serve it as an OBS overlay.
///
/// Get an OAuth token from https://twitchtokengenerator.com/ and paste it
/// without the `oauth:` prefix when asked. It is saved for next time.
#[derive(Debug, Parser)]
#[command(name = "twitchchat", version, about, long_about)]
pub struct Cli {
    /// Ignore saved credentials and ask for a new token.
    #[arg(long)]
    pub new_token: bool,

    /// Channel to monitor; asked for when omitted.
    #[arg(short, long)]
    pub channel: Option<String>,

    /// Where to show chat; asked for when omitted.
    #[arg(short, long, value_enum)]
    pub mode: Option<DisplayMode>,

    /// Port for the web overlay.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Saved token and nickname.
    #[arg(long, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// One filtered word per line.
    #[arg(long, default_value = BLACKLIST_FILE)]
    pub blacklist: PathBuf,

    /// Overlay HTML template.
    #[arg(long, default_value = TEMPLATE_FILE)]
    pub template: PathBuf,

    /// Overlay stylesheet, served at `/<file name>`.
    #[arg(long, default_value = STYLESHEET_FILE)]
    pub stylesheet: PathBuf,

    /// Log destination; filter with RUST_LOG.
    #[arg(long, default_value = LOG_FILE)]
    pub log_file: PathBuf,
}

/// Prints `label` and reads one trimmed line from `input`.
pub fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<String> {
    write!(output, "{label}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(Error::InvalidInput(format!("no answer for {:?}", label.trim())));
    }
    Ok(line.trim().to_owned())
}

pub fn prompt_mode<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<DisplayMode> {
    writeln!(output, "\nDisplay Mode:")?;
    writeln!(output, "1. Terminal Display (interactive)")?;
    writeln!(output, "2. Web Chatbox (for OBS)")?;
    match prompt(input, output, "Choice: ")?.as_str() {
        "1" => Ok(DisplayMode::Terminal),
        "2" => Ok(DisplayMode::Web),
        other => Err(Error::InvalidInput(format!("invalid choice {other:?}"))),
    }
}

pub fn stdin_prompt(label: &str) -> Result<String> {
    prompt(&mut io::stdin().lock(), &mut io::stdout(), label)
}

pub fn stdin_prompt_mode() -> Result<DisplayMode> {
    prompt_mode(&mut io::stdin().lock(), &mut io::stdout())
}
