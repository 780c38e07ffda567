use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};

use crate::tags::{Classification, Privileges};

pub const MAX_STORED_MESSAGES: usize = 50;
pub const MAX_SENDER_CHARS: usize = 99;
pub const MAX_BODY_CHARS: usize = 511;

/// One chat line as shown to the user. Never mutated after construction.
///
/// Overlong senders and bodies are cut to [`MAX_SENDER_CHARS`] and
/// [`MAX_BODY_CHARS`] rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    sender: String,
    body: String,
    privileges: Privileges,
    bits: u32,
    received_at: DateTime<Local>,
}

impl ChatMessage {
    /// Returns `None` when the sender is empty.
    pub fn new(sender: &str, body: &str, classification: Classification) -> Option<Self> {
        if sender.is_empty() {
            return None;
        }

        Some(Self {
            sender: truncate_chars(sender, MAX_SENDER_CHARS),
            body: truncate_chars(strip_line_ending(body), MAX_BODY_CHARS),
            privileges: classification.privileges,
            bits: classification.bits,
            received_at: Local::now(),
        })
    }

    /// A message typed by the local user: no badges, no bits.
    pub fn local(sender: &str, body: &str) -> Option<Self> {
        Self::new(sender, body, Classification::default())
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn privileges(&self) -> Privileges {
        self.privileges
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_owned(),
        None => text.to_owned(),
    }
}

fn strip_line_ending(text: &str) -> &str {
    match text.find(['\r', '\n']) {
        Some(end) => &text[..end],
        None => text,
    }
}

/// Fixed-capacity, oldest-first window of recent messages shared by every
/// thread. Each operation holds the lock only for the structural change or
/// the copy, never across I/O.
#[derive(Debug)]
pub struct ChatStore {
    capacity: usize,
    messages: Mutex<VecDeque<ChatMessage>>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_STORED_MESSAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn append(&self, message: ChatMessage) {
        let mut messages = self.lock();
        if messages.len() >= self.capacity {
            let _ = messages.pop_front();
        }
        messages.push_back(message);
    }

    /// Point-in-time copy, oldest first.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().iter().cloned().collect()
    }

    /// Advisory only; may be stale as soon as it returns.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A writer that panicked mid-append cannot leave the deque half-updated,
    // so a poisoned lock is still safe to read through.
    fn lock(&self) -> MutexGuard<'_, VecDeque<ChatMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}
