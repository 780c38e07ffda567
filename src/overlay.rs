//! On-demand HTML snapshot of the chat for OBS browser sources.
//!
//! One request per connection, `Connection: close`, no keep-alive. The
//! listener is non-blocking and polled so the loop notices shutdown.

use std::fs;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};

use crate::render::{self, Format};
use crate::session::Session;

pub const DEFAULT_PORT: u16 = 5000;
pub const MESSAGES_MARKER: &str = "<!-- Messages will be inserted here -->";

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_REQUEST_BYTES: usize = 1024;

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub template: PathBuf,
    pub stylesheet: PathBuf,
}

impl OverlayConfig {
    fn stylesheet_route(&self) -> Option<String> {
        let name = self.stylesheet.file_name()?.to_str()?;
        Some(format!("/{name}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Page,
    Stylesheet,
}

pub struct Overlay {
    listener: TcpListener,
    config: OverlayConfig,
}

impl Overlay {
    pub fn bind(addr: SocketAddr, config: OverlayConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until the session shuts down. The listener closes on return.
    pub fn run(self, session: &Session) {
        info!(
            "overlay listening on {}",
            self.local_addr()
                .map_or_else(|_| "?".to_owned(), |addr| addr.to_string())
        );

        while !session.shutdown().is_cancelled() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!("overlay request from {peer}");
                    if let Err(err) = self.handle(stream, session) {
                        debug!("overlay client {peer}: {err}");
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    let _ = session.shutdown().wait_timeout(ACCEPT_POLL_INTERVAL);
                }
                Err(err) => {
                    warn!("overlay accept failed: {err}");
                    let _ = session.shutdown().wait_timeout(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        info!("overlay stopped");
    }

    fn handle(&self, mut stream: TcpStream, session: &Session) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(CLIENT_TIMEOUT))?;
        stream.set_write_timeout(Some(CLIENT_TIMEOUT))?;

        let mut request = [0u8; MAX_REQUEST_BYTES];
        let count = stream.read(&mut request)?;
        let request = String::from_utf8_lossy(&request[..count]);

        match self.route(&request) {
            Route::Stylesheet => match fs::read(&self.config.stylesheet) {
                Ok(css) => write_response(&mut stream, "text/css", &css),
                // Unmatched: close without answering.
                Err(_) => Ok(()),
            },
            Route::Page => {
                let messages = render::render(&session.store().snapshot(), Format::Html);
                let template = fs::read_to_string(&self.config.template).ok();
                let stylesheet_href = self
                    .config
                    .stylesheet_route()
                    .map(|route| route.trim_start_matches('/').to_owned())
                    .unwrap_or_default();
                let page = assemble_page(&messages, template.as_deref(), &stylesheet_href);
                write_response(&mut stream, "text/html; charset=utf-8", page.as_bytes())
            }
        }
    }

    fn route(&self, request: &str) -> Route {
        let path = request_path(request);
        match (path, self.config.stylesheet_route()) {
            (Some(path), Some(stylesheet)) if path == stylesheet => Route::Stylesheet,
            _ => Route::Page,
        }
    }
}

fn request_path(request: &str) -> Option<&str> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    Some(target.split('?').next().unwrap_or(target))
}

fn write_response(stream: &mut TcpStream, content_type: &str, body: &[u8]) -> io::Result<()> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()
}

/// Splices the rendered messages into the user's template, or into a
/// built-in auto-refreshing page when there is none.
pub fn assemble_page(messages: &str, template: Option<&str>, stylesheet_href: &str) -> String {
    match template {
        Some(template) => match template.find(MESSAGES_MARKER) {
            Some(marker) => format!("{}{messages}</div></body></html>", &template[..marker]),
            None => format!("<html><body>{messages}</body></html>"),
        },
        None => format!(
            "<!DOCTYPE html><html><head><meta http-equiv=\"refresh\" content=\"2\">\
             <link rel=\"stylesheet\" href=\"{}\"></head>\
             <body><div class=\"chat-container\">{messages}</div></body></html>",
            render::escape_html(stylesheet_href)
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;

    use super::{MESSAGES_MARKER, Overlay, OverlayConfig, assemble_page, request_path};
    use crate::connection::testing::RecordingOutbound;
    use crate::filter::Blacklist;
    use crate::session::{DisplayMode, Session};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("twitchchat-{}-{name}", std::process::id()))
    }

    fn fetch(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).expect("connect to overlay");
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").expect("send request");
        let mut response = String::new();
        stream.read_to_string(&mut response).expect("read response");
        response
    }

    #[test]
    fn request_path_reads_get_target() {
        assert_eq!(request_path("GET / HTTP/1.1\r\n"), Some("/"));
        assert_eq!(
            request_path("GET /twitchchat.css?v=2 HTTP/1.1\r\n"),
            Some("/twitchchat.css")
        );
        assert_eq!(request_path("POST / HTTP/1.1\r\n"), None);
        assert_eq!(request_path(""), None);
    }

    #[test]
    fn template_marker_is_replaced() {
        let template = format!("<html><body><div class=\"chat\">{MESSAGES_MARKER}</div></body></html>");
        let page = assemble_page("<p>m</p>", Some(&template), "x.css");
        assert_eq!(
            page,
            "<html><body><div class=\"chat\"><p>m</p></div></body></html>"
        );
    }

    #[test]
    fn template_without_marker_wraps_messages() {
        let page = assemble_page("<p>m</p>", Some("<html>nothing</html>"), "x.css");
        assert_eq!(page, "<html><body><p>m</p></body></html>");
    }

    #[test]
    fn builtin_page_refreshes_and_links_stylesheet() {
        let page = assemble_page("", None, "twitchchat.css");
        assert!(page.contains("http-equiv=\"refresh\" content=\"2\""));
        assert!(page.contains("href=\"twitchchat.css\""));
        assert!(page.contains("<div class=\"chat-container\"></div>"));
    }

    #[test]
    fn serves_snapshot_and_stylesheet_until_shutdown() {
        let stylesheet = scratch("overlay.css");
        fs::write(&stylesheet, "body { color: red; }").expect("write stylesheet");
        let config = OverlayConfig {
            template: scratch("missing-template.html"),
            stylesheet: stylesheet.clone(),
        };

        let session = Arc::new(Session::new(
            "chan",
            "me",
            DisplayMode::Web,
            Blacklist::default(),
            Arc::new(RecordingOutbound::default()),
        ));
        session.ingest_line(
            "@badges=vip/1;bits=5 :alice!alice@alice.tmi.twitch.tv PRIVMSG #chan :<hi>\r\n",
        );

        let overlay =
            Overlay::bind(SocketAddr::from(([127, 0, 0, 1], 0)), config).expect("bind overlay");
        let addr = overlay.local_addr().expect("local addr");
        let server = {
            let session = Arc::clone(&session);
            thread::spawn(move || overlay.run(&session))
        };

        let page = fetch(addr, "/");
        let css_name = stylesheet
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let css = fetch(addr, &format!("/{css_name}"));

        session.shutdown().cancel();
        server.join().expect("overlay thread");
        let _ = fs::remove_file(&stylesheet);

        assert!(page.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(page.contains("Content-Type: text/html"));
        assert!(page.contains("<span class=\"username\">alice</span>"));
        assert!(page.contains("<i class=\"nf nf-md-crown\"></i>"));
        assert!(page.contains("[5 bits]"));
        assert!(page.contains("&lt;hi&gt;"));

        assert!(css.contains("Content-Type: text/css"));
        assert!(css.ends_with("body { color: red; }"));
    }

    #[test]
    fn missing_stylesheet_closes_without_response() {
        let config = OverlayConfig {
            template: scratch("no-template.html"),
            stylesheet: scratch("no-style.css"),
        };
        let session = Arc::new(Session::new(
            "chan",
            "me",
            DisplayMode::Web,
            Blacklist::default(),
            Arc::new(RecordingOutbound::default()),
        ));
        let overlay =
            Overlay::bind(SocketAddr::from(([127, 0, 0, 1], 0)), config.clone()).expect("bind");
        let addr = overlay.local_addr().expect("local addr");
        let server = {
            let session = Arc::clone(&session);
            thread::spawn(move || overlay.run(&session))
        };

        let route = format!(
            "/{}",
            config
                .stylesheet
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
        );
        let response = fetch(addr, &route);

        session.shutdown().cancel();
        server.join().expect("overlay thread");
        assert!(response.is_empty());
    }
}
