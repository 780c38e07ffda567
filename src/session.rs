use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use log::{debug, info, trace, warn};

use crate::connection::Outbound;
use crate::filter::Blacklist;
use crate::irc::{self, Command, Inbound};
use crate::shutdown::Shutdown;
use crate::store::{ChatMessage, ChatStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisplayMode {
    /// Interactive chat in this terminal.
    Terminal,
    /// HTML snapshot served over HTTP for OBS browser sources.
    Web,
}

/// Everything the worker threads share, built once per run.
pub struct Session {
    channel: String,
    nickname: String,
    display: DisplayMode,
    store: ChatStore,
    blacklist: Blacklist,
    shutdown: Shutdown,
    outbound: Arc<dyn Outbound>,
    redraw_requested: AtomicBool,
}

impl Session {
    pub fn new(
        channel: &str,
        nickname: &str,
        display: DisplayMode,
        blacklist: Blacklist,
        outbound: Arc<dyn Outbound>,
    ) -> Self {
        Self {
            channel: channel.to_owned(),
            nickname: nickname.to_owned(),
            display,
            store: ChatStore::new(),
            blacklist,
            shutdown: Shutdown::new(),
            outbound,
            redraw_requested: AtomicBool::new(false),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn display(&self) -> DisplayMode {
        self.display
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn send(&self, command: Command<'_>) -> io::Result<()> {
        self.outbound.send_line(&command.to_string())
    }

    pub fn join(&self, token: &str) -> io::Result<()> {
        self.send(Command::Pass { token })?;
        self.send(Command::Nick {
            nickname: &self.nickname,
        })?;
        self.send(Command::CapReq)?;
        self.send(Command::Join {
            channel: &self.channel,
        })?;
        info!("joined #{} as {}", self.channel, self.nickname);
        Ok(())
    }

    pub fn leave(&self) -> io::Result<()> {
        self.send(Command::Part {
            channel: &self.channel,
        })?;
        self.send(Command::Quit)
    }

    /// Handles one raw protocol line. Never fails: unknown or malformed
    /// lines are skipped.
    pub fn ingest_line(&self, line: &str) {
        match irc::parse_line(line) {
            Inbound::Ping(argument) => {
                debug!("keep-alive probe, replying");
                if let Err(err) = self.send(Command::Pong { argument }) {
                    warn!("failed to answer keep-alive: {err}");
                }
            }
            Inbound::Chat(chat) => {
                let Some(message) = chat.into_message() else {
                    trace!("dropping chat line without sender");
                    return;
                };
                if self.record(message) {
                    self.request_redraw();
                }
            }
            Inbound::Ignored => trace!("ignored: {}", line.trim_end()),
        }
    }

    /// Sends `text` to the channel and echoes it into the store.
    pub fn send_chat(&self, text: &str) -> io::Result<()> {
        let Some(message) = ChatMessage::local(&self.nickname, text) else {
            return Ok(());
        };
        self.send(Command::Privmsg {
            channel: &self.channel,
            text: message.body(),
        })?;
        if self.record(message) {
            self.request_redraw();
        }
        Ok(())
    }

    /// Appends unless the blacklist rejects the body. Returns whether the
    /// message was stored.
    pub fn record(&self, message: ChatMessage) -> bool {
        if self.blacklist.matches(message.body()) {
            debug!("filtered message from {}", message.sender());
            return false;
        }
        self.store.append(message);
        true
    }

    /// Only the terminal view redraws on arrival; the web view renders on
    /// request.
    pub fn request_redraw(&self) {
        if self.display == DisplayMode::Terminal {
            self.redraw_requested.store(true, Ordering::Release);
        }
    }

    pub fn take_redraw_request(&self) -> bool {
        self.redraw_requested.swap(false, Ordering::AcqRel)
    }
}
