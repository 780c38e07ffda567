use std::io::{self, BufRead, IsTerminal, Stdout, Write};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::input::{Action, InputState, Key, Mode, key_from_byte, key_from_event};
use crate::render::{self, Format};
use crate::session::Session;

pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Raw mode and the alternate screen, held for as long as the guard lives.
struct TerminalGuard;

impl TerminalGuard {
    fn enter(stdout: &mut Stdout) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        if let Err(err) = execute!(stdout, EnterAlternateScreen) {
            let _ = terminal::disable_raw_mode();
            return Err(err);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

/// What the loop should do after an action has been carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue { redraw: bool },
    Stop,
}

/// Performs the side effects of an input action against the session.
pub fn apply(session: &Session, action: Action) -> Flow {
    match action {
        Action::Redraw | Action::ResumeChat => Flow::Continue { redraw: true },
        Action::OpenMenu { outgoing } => {
            if let Some(text) = outgoing
                && let Err(err) = session.send_chat(&text)
            {
                warn!("failed to send chat message: {err}");
            }
            Flow::Continue { redraw: true }
        }
        Action::Quit => {
            info!("quit requested from keyboard");
            session.shutdown().cancel();
            Flow::Stop
        }
    }
}

/// Runs the interactive view until shutdown. Falls back to line input when
/// raw mode is unavailable.
pub fn run(session: &Session) -> Result<()> {
    let mut stdout = io::stdout();
    let guard = match TerminalGuard::enter(&mut stdout) {
        Ok(guard) => guard,
        Err(err) => {
            warn!("{}", Error::Terminal(err));
            return run_line_mode(session);
        }
    };

    let result = run_raw(session, &mut stdout);
    drop(guard);
    if result.is_err() {
        session.shutdown().cancel();
    }
    result
}

fn run_raw(session: &Session, stdout: &mut Stdout) -> Result<()> {
    let mut state = InputState::new();
    let mut dirty = true;

    while !session.shutdown().is_cancelled() {
        if session.take_redraw_request() && state.mode() == Mode::Chat {
            dirty = true;
        }

        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key_event) => {
                    let action = key_from_event(&key_event).and_then(|key| state.handle(key));
                    if let Some(action) = action {
                        debug!("input action {action:?}, mode now {:?}", state.mode());
                        match apply(session, action) {
                            Flow::Continue { redraw } => dirty |= redraw,
                            Flow::Stop => break,
                        }
                    }
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }

        if dirty {
            draw(stdout, session, &state)?;
            dirty = false;
        }
    }

    Ok(())
}

fn draw(stdout: &mut Stdout, session: &Session, state: &InputState) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    let lines = match state.mode() {
        Mode::Chat => {
            let input = (!state.buffer().is_empty()).then_some(state.buffer());
            render::chat_view(
                session.channel(),
                &session.store().snapshot(),
                input,
                cols as usize,
                rows as usize,
            )
        }
        Mode::Menu => render::menu_view(
            session.channel(),
            session.nickname(),
            session.store().len(),
        ),
    };

    queue!(stdout, MoveTo(0, 0), Clear(ClearType::All))?;
    for (row, line) in lines.iter().take(rows as usize).enumerate() {
        queue!(stdout, MoveTo(0, row as u16), Print(line))?;
    }
    stdout.flush()
}

#[derive(Debug)]
enum LineMessage {
    Line(String),
    Closed,
}

// Detached: a blocking stdin read cannot be interrupted, so the thread is
// left to die with the process.
fn spawn_line_reader(tx: SyncSender<LineMessage>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut locked = stdin.lock();
        let mut buf = String::new();

        loop {
            buf.clear();
            match locked.read_line(&mut buf) {
                Ok(0) | Err(_) => {
                    let _ = tx.send(LineMessage::Closed);
                    break;
                }
                Ok(_) => {
                    if tx.send(LineMessage::Line(buf.clone())).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Feeds one line of cooked input through the state machine. The newline
/// only counts as Enter for lines typed in chat mode; a menu line such as
/// ` <Enter>` must not resume and then immediately reopen the menu.
pub fn feed_line(session: &Session, state: &mut InputState, line: &str) -> Flow {
    let submits = state.mode() == Mode::Chat;
    let mut redraw = false;
    for byte in line.bytes() {
        let Some(key) = key_from_byte(byte) else {
            continue;
        };
        if key == Key::Submit && !submits {
            continue;
        }
        if let Some(action) = state.handle(key) {
            match apply(session, action) {
                Flow::Continue { redraw: again } => redraw |= again,
                Flow::Stop => return Flow::Stop,
            }
        }
    }
    Flow::Continue { redraw }
}

fn run_line_mode(session: &Session) -> Result<()> {
    let (tx, rx) = mpsc::sync_channel(64);
    spawn_line_reader(tx);

    let mut state = InputState::new();
    print_view(session, &state)?;

    while !session.shutdown().is_cancelled() {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(LineMessage::Line(line)) => match feed_line(session, &mut state, &line) {
                Flow::Continue { redraw: true } => print_view(session, &state)?,
                Flow::Continue { redraw: false } => {}
                Flow::Stop => return Ok(()),
            },
            Ok(LineMessage::Closed) | Err(RecvTimeoutError::Disconnected) => {
                info!("stdin closed");
                session.shutdown().cancel();
            }
            Err(RecvTimeoutError::Timeout) => {
                if session.take_redraw_request() && state.mode() == Mode::Chat {
                    print_view(session, &state)?;
                }
            }
        }
    }

    Ok(())
}

/// Overlay mode keeps the terminal in cooked mode: a line starting with
/// `q` ends the session. A closed stdin just leaves shutdown to others.
pub fn run_quit_prompt(session: &Session) {
    let (tx, rx) = mpsc::sync_channel(8);
    spawn_line_reader(tx);

    let mut stdin_open = true;
    while !session.shutdown().is_cancelled() {
        if !stdin_open {
            let _ = session.shutdown().wait_timeout(POLL_INTERVAL);
            continue;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(LineMessage::Line(line)) if is_quit_line(&line) => {
                info!("quit requested from stdin");
                session.shutdown().cancel();
            }
            Ok(LineMessage::Line(_)) | Err(RecvTimeoutError::Timeout) => {}
            Ok(LineMessage::Closed) | Err(RecvTimeoutError::Disconnected) => {
                debug!("stdin closed, waiting for shutdown");
                stdin_open = false;
            }
        }
    }
}

fn is_quit_line(line: &str) -> bool {
    line.trim_start().starts_with(['q', 'Q'])
}

// Colors are dropped when stdout is piped.
fn print_view(session: &Session, state: &InputState) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match state.mode() {
        Mode::Chat => {
            writeln!(stdout, "=== Twitch Chat: #{} ===", session.channel())?;
            if session.store().is_empty() {
                writeln!(stdout, "Waiting for messages...")?;
            }
            let rendered = render::render(&session.store().snapshot(), Format::Terminal);
            if stdout.is_terminal() {
                write!(stdout, "{rendered}")?;
            } else {
                write!(stdout, "{}", render::strip_ansi(&rendered))?;
            }
        }
        Mode::Menu => {
            for line in render::menu_view(
                session.channel(),
                session.nickname(),
                session.store().len(),
            ) {
                writeln!(stdout, "{line}")?;
            }
        }
    }
    stdout.flush()
}
