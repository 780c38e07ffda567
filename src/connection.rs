use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown as SocketShutdown, TcpStream};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::Session;

/// How long a blocked read waits before re-checking for shutdown.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The only thing the chat core needs from the transport: write one line.
pub trait Outbound: Send + Sync {
    /// `line` is sent followed by CRLF.
    fn send_line(&self, line: &str) -> io::Result<()>;
}

/// Write half of the IRC socket. Writes are serialized so a keep-alive reply
/// never interleaves with a chat send.
#[derive(Debug)]
pub struct Connection {
    stream: Mutex<TcpStream>,
}

impl Connection {
    /// Connects and returns the write half plus a buffered read half.
    pub fn open(host: &str, port: u16) -> Result<(Self, BufReader<TcpStream>)> {
        let stream = TcpStream::connect((host, port)).map_err(|source| Error::Connect {
            host: format!("{host}:{port}"),
            source,
        })?;
        stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;
        let reader = BufReader::new(stream.try_clone()?);
        info!("connected to {host}:{port}");

        Ok((
            Self {
                stream: Mutex::new(stream),
            },
            reader,
        ))
    }

    pub fn close(&self) {
        let stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = stream.shutdown(SocketShutdown::Both) {
            debug!("socket shutdown: {err}");
        }
    }
}

impl Outbound for Connection {
    fn send_line(&self, line: &str) -> io::Result<()> {
        let mut framed = String::with_capacity(line.len() + 2);
        framed.push_str(line);
        framed.push_str("\r\n");

        let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        stream.write_all(framed.as_bytes())?;
        stream.flush()
    }
}

/// Why the ingest loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEnd {
    Cancelled,
    ConnectionLost(String),
}

/// Reads CRLF-terminated lines until shutdown or end of stream, feeding each
/// to the session. Losing the connection cancels the whole session.
pub fn run_ingest<R: BufRead>(session: &Session, mut reader: R) -> IngestEnd {
    let mut buf = Vec::with_capacity(4096);

    loop {
        if session.shutdown().is_cancelled() {
            return IngestEnd::Cancelled;
        }

        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                if !buf.is_empty() {
                    session.ingest_line(&String::from_utf8_lossy(&buf));
                }
                warn!("server closed the connection");
                session.shutdown().cancel();
                return IngestEnd::ConnectionLost("end of stream".to_owned());
            }
            Ok(_) => {
                // A timeout can split a line; only complete lines are parsed.
                if buf.ends_with(b"\n") {
                    session.ingest_line(&String::from_utf8_lossy(&buf));
                    buf.clear();
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(err) => {
                warn!("read failed: {err}");
                session.shutdown().cancel();
                return IngestEnd::ConnectionLost(err.to_string());
            }
        }
    }
}
