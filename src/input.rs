//! Keystroke handling for the interactive view.
//!
//! [`InputState`] is a pure state machine: it consumes [`Key`]s and returns
//! the [`Action`] the driver in `terminal.rs` must carry out. It never does
//! I/O itself.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::store::MAX_BODY_CHARS;

const RESUME_KEY: char = ' ';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chat,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Submit,
    Erase,
    Interrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The edit buffer changed; redraw the chat view.
    Redraw,
    /// Switch to the menu, sending `outgoing` first if present.
    OpenMenu { outgoing: Option<String> },
    ResumeChat,
    Quit,
}

#[derive(Debug)]
pub struct InputState {
    mode: Mode,
    buffer: String,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            mode: Mode::Chat,
            buffer: String::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn handle(&mut self, key: Key) -> Option<Action> {
        if key == Key::Interrupt {
            return Some(Action::Quit);
        }

        match (self.mode, key) {
            (Mode::Chat, Key::Submit) => {
                let outgoing = (!self.buffer.is_empty()).then(|| std::mem::take(&mut self.buffer));
                self.mode = Mode::Menu;
                Some(Action::OpenMenu { outgoing })
            }
            (Mode::Chat, Key::Char(ch)) => {
                if self.buffer.chars().count() >= MAX_BODY_CHARS {
                    return None;
                }
                self.buffer.push(ch);
                Some(Action::Redraw)
            }
            (Mode::Chat, Key::Erase) => {
                let _ = self.buffer.pop();
                Some(Action::Redraw)
            }
            (Mode::Menu, Key::Char(RESUME_KEY)) => {
                self.mode = Mode::Chat;
                self.buffer.clear();
                Some(Action::ResumeChat)
            }
            (Mode::Menu, Key::Char('q' | 'Q')) => Some(Action::Quit),
            _ => None,
        }
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn key_from_event(event: &KeyEvent) -> Option<Key> {
    if event.kind == KeyEventKind::Release {
        return None;
    }

    match event.code {
        KeyCode::Enter => Some(Key::Submit),
        KeyCode::Backspace => Some(Key::Erase),
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Key::Interrupt)
        }
        KeyCode::Char('j' | 'm') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Key::Submit)
        }
        KeyCode::Char('h') if event.modifiers.contains(KeyModifiers::CONTROL) => Some(Key::Erase),
        KeyCode::Char(ch)
            if !ch.is_control()
                && !event
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            Some(Key::Char(ch))
        }
        _ => None,
    }
}

/// Byte-level mapping used when the terminal cannot enter raw mode and input
/// arrives as plain lines.
pub fn key_from_byte(byte: u8) -> Option<Key> {
    match byte {
        b'\r' | b'\n' => Some(Key::Submit),
        0x7f | 0x08 => Some(Key::Erase),
        0x03 => Some(Key::Interrupt),
        0x20..=0x7e => Some(Key::Char(char::from(byte))),
        _ => None,
    }
}
