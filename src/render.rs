//! Stateless views over a store snapshot: ANSI-coloured text for the
//! terminal, HTML fragments for the overlay.

use std::fmt::Write as _;

use crossterm::style::{Color, Stylize};

use crate::store::ChatMessage;

pub const INPUT_PROMPT: &str = "> ";
const MENU_RULE: &str = "════════════════════════════════════════";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Terminal,
    Html,
}

/// Renders every message oldest first. An empty snapshot renders to an
/// empty string.
pub fn render(snapshot: &[ChatMessage], format: Format) -> String {
    let mut out = String::new();
    for message in snapshot {
        match format {
            Format::Terminal => {
                out.push_str(&terminal_line(message));
                out.push('\n');
            }
            Format::Html => out.push_str(&html_fragment(message)),
        }
    }
    out
}

pub fn terminal_line(message: &ChatMessage) -> String {
    let mut line = format!(
        "{} {}",
        message
            .received_at()
            .format("%H:%M")
            .to_string()
            .with(Color::DarkGrey),
        message.sender().with(Color::Blue).bold()
    );

    let privileges = message.privileges();
    for (present, label, color) in [
        (privileges.broadcaster, "[B]", Color::Red),
        (privileges.moderator, "[MOD]", Color::Green),
        (privileges.subscriber, "[SUB]", Color::Magenta),
        (privileges.vip, "[VIP]", Color::Yellow),
    ] {
        if present {
            let _ = write!(line, " {}", label.with(color).bold());
        }
    }
    if message.bits() > 0 {
        let _ = write!(
            line,
            " {}",
            format!("[{} bits]", message.bits()).with(Color::Cyan).bold()
        );
    }

    let _ = write!(line, ": {}", message.body().with(Color::DarkCyan));
    line
}

pub fn html_fragment(message: &ChatMessage) -> String {
    let privileges = message.privileges();
    let mut badges = String::new();
    for (present, icon) in [
        (privileges.broadcaster, "nf-fa-gear"),
        (privileges.moderator, "nf-fa-user_gear"),
        (privileges.subscriber, "nf-seti-sublime"),
        (privileges.vip, "nf-md-crown"),
    ] {
        if present {
            let _ = write!(badges, "<i class=\"nf {icon}\"></i>");
        }
    }
    if message.bits() > 0 {
        let _ = write!(
            badges,
            "<span style=\"color: #9147ff; font-weight: bold;\">[{} bits]</span>",
            message.bits()
        );
    }

    format!(
        "<div class=\"message\"><span class=\"username\">{}</span>{}: <span class=\"text\">{}</span></div>\n",
        escape_html(message.sender()),
        badges,
        escape_html(message.body())
    )
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Screen lines for the chat view. Only the newest messages that fit in
/// `rows` are kept; the input line, when present, takes the last row.
pub fn chat_view(
    channel: &str,
    snapshot: &[ChatMessage],
    input: Option<&str>,
    cols: usize,
    rows: usize,
) -> Vec<String> {
    let mut lines = vec![
        format!("=== Twitch Chat: #{channel} ==="),
        "(Type to chat | Press Enter to open menu)".to_owned(),
        String::new(),
    ];

    let reserved = lines.len() + usize::from(input.is_some());
    let body_height = rows.saturating_sub(reserved);
    let skip = snapshot.len().saturating_sub(body_height);
    lines.extend(
        snapshot
            .iter()
            .skip(skip)
            .map(|message| clip_ansi_to_visible_width(&terminal_line(message), cols)),
    );

    if let Some(input) = input {
        lines.push(input_line(input, cols));
    }

    lines.truncate(rows);
    lines
        .into_iter()
        .map(|line| clip_ansi_to_visible_width(&line, cols))
        .collect()
}

pub fn menu_view(channel: &str, nickname: &str, message_count: usize) -> Vec<String> {
    vec![
        "╔════════════════════════════════════════╗".to_owned(),
        "║                  MENU                  ║".to_owned(),
        "╚════════════════════════════════════════╝".to_owned(),
        String::new(),
        format!("  Channel: #{channel}"),
        format!("  User: {nickname}"),
        format!("  Messages: {message_count}"),
        String::new(),
        "  [SPACE] - Back to chat".to_owned(),
        "  [Q]     - Disconnect".to_owned(),
        String::new(),
        MENU_RULE.to_owned(),
    ]
}

// Keeps the tail of long input visible, the way a text field scrolls.
fn input_line(input: &str, cols: usize) -> String {
    let room = cols.saturating_sub(INPUT_PROMPT.chars().count());
    let count = input.chars().count();
    let shown = input.chars().skip(count.saturating_sub(room)).collect::<String>();
    format!("{INPUT_PROMPT}{shown}")
}

/// Piece of styled text: an escape sequence or one visible character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Escape(&'a str),
    Visible(char),
}

/// Splits text into escape sequences (`ESC [ ... final` or `ESC x`) and the
/// characters that actually occupy a column.
fn segments(text: &str) -> impl Iterator<Item = Segment<'_>> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let ch = rest.chars().next()?;
        if ch != '\u{1b}' {
            rest = &rest[ch.len_utf8()..];
            return Some(Segment::Visible(ch));
        }

        let mut end = ch.len_utf8();
        let mut tail = rest[end..].chars();
        match tail.next() {
            Some('[') => {
                end += 1;
                for seq_char in tail {
                    end += seq_char.len_utf8();
                    if ('@'..='~').contains(&seq_char) {
                        break;
                    }
                }
            }
            Some(other) => end += other.len_utf8(),
            None => {}
        }
        let (escape, remainder) = rest.split_at(end);
        rest = remainder;
        Some(Segment::Escape(escape))
    })
}

/// Cuts styled text to `width` columns. Escape sequences are kept, and a
/// reset is appended when styled text was cut short.
pub fn clip_ansi_to_visible_width(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut visible = 0usize;
    let mut styled = false;

    for segment in segments(text) {
        match segment {
            Segment::Escape(escape) => {
                styled = true;
                out.push_str(escape);
            }
            Segment::Visible(_) if visible == width => {
                if styled {
                    out.push_str("\u{1b}[0m");
                }
                return out;
            }
            Segment::Visible(ch) => {
                visible += 1;
                out.push(ch);
            }
        }
    }
    out
}

pub fn strip_ansi(text: &str) -> String {
    segments(text)
        .filter_map(|segment| match segment {
            Segment::Visible(ch) => Some(ch),
            Segment::Escape(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        Format, chat_view, clip_ansi_to_visible_width, escape_html, html_fragment, menu_view,
        render, strip_ansi, terminal_line,
    };
    use crate::store::ChatMessage;
    use crate::tags::{Classification, Privileges};

    fn message(sender: &str, body: &str, privileges: Privileges, bits: u32) -> ChatMessage {
        ChatMessage::new(sender, body, Classification { privileges, bits }).expect("sender")
    }

    fn plain(sender: &str, body: &str) -> ChatMessage {
        message(sender, body, Privileges::none(), 0)
    }

    // Drops the leading "HH:MM " stamp.
    fn without_time(line: &str) -> String {
        strip_ansi(line).chars().skip(6).collect()
    }

    #[test]
    fn terminal_line_orders_badges_before_body() {
        let all = Privileges {
            broadcaster: true,
            moderator: true,
            subscriber: true,
            vip: true,
        };
        let line = terminal_line(&message("alice", "hi", all, 250));
        assert_eq!(
            without_time(&line),
            "alice [B] [MOD] [SUB] [VIP] [250 bits]: hi"
        );
    }

    #[test]
    fn terminal_line_without_badges_is_bare() {
        assert_eq!(without_time(&terminal_line(&plain("bob", "yo"))), "bob: yo");
    }

    #[test]
    fn zero_bits_are_not_annotated() {
        let line = terminal_line(&message("bob", "x", Privileges::none(), 0));
        assert!(!strip_ansi(&line).contains("bits"));
    }

    #[test]
    fn html_fragment_escapes_and_badges() {
        let privileges = Privileges {
            moderator: true,
            vip: true,
            ..Privileges::none()
        };
        let fragment = html_fragment(&message("eve", "<b>hi</b> & bye", privileges, 10));
        assert_eq!(
            fragment,
            "<div class=\"message\"><span class=\"username\">eve</span>\
             <i class=\"nf nf-fa-user_gear\"></i><i class=\"nf nf-md-crown\"></i>\
             <span style=\"color: #9147ff; font-weight: bold;\">[10 bits]</span>: \
             <span class=\"text\">&lt;b&gt;hi&lt;/b&gt; &amp; bye</span></div>\n"
        );
    }

    #[test]
    fn escape_covers_quotes() {
        assert_eq!(escape_html("\"a\" 'b'"), "&quot;a&quot; &#39;b&#39;");
    }

    #[test]
    fn render_keeps_snapshot_order() {
        let snapshot = vec![plain("a", "first"), plain("b", "second")];
        let html = render(&snapshot, Format::Html);
        let first = html.find("first").expect("first rendered");
        let second = html.find("second").expect("second rendered");
        assert!(first < second);

        let text = strip_ansi(&render(&snapshot, Format::Terminal));
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().is_some_and(|line| line.ends_with("a: first")));
    }

    #[test]
    fn empty_snapshot_renders_empty() {
        assert_eq!(render(&[], Format::Html), "");
        assert_eq!(render(&[], Format::Terminal), "");
    }

    #[test]
    fn empty_chat_view_still_has_header() {
        let view = chat_view("chan", &[], None, 80, 24);
        assert_eq!(view.len(), 3);
        assert_eq!(view[0], "=== Twitch Chat: #chan ===");
    }

    #[test]
    fn chat_view_keeps_newest_that_fit() {
        let snapshot = (0..10)
            .map(|index| plain("u", &format!("m{index}")))
            .collect::<Vec<_>>();
        let view = chat_view("chan", &snapshot, Some("typing"), 80, 8);

        assert_eq!(view.len(), 8);
        let bodies = view[3..7]
            .iter()
            .map(|line| strip_ansi(line))
            .collect::<Vec<_>>();
        assert!(bodies[0].ends_with("u: m6"));
        assert!(bodies[3].ends_with("u: m9"));
        assert_eq!(view[7], "> typing");
    }

    #[test]
    fn long_input_shows_its_tail() {
        let view = chat_view("c", &[], Some("abcdefghij"), 6, 10);
        assert_eq!(view.last().map(String::as_str), Some("> ghij"));
    }

    #[test]
    fn menu_shows_session_details() {
        let menu = menu_view("chan", "me", 7).join("\n");
        assert!(menu.contains("Channel: #chan"));
        assert!(menu.contains("User: me"));
        assert!(menu.contains("Messages: 7"));
        assert!(menu.contains("[SPACE] - Back to chat"));
        assert!(menu.contains("[Q]"));
    }

    #[test]
    fn clipping_counts_only_visible_columns() {
        let line = terminal_line(&message("alice", "hello there", Privileges::none(), 0));
        let clipped = clip_ansi_to_visible_width(&line, 9);
        assert_eq!(strip_ansi(&clipped), strip_ansi(&line).chars().take(9).collect::<String>());
        assert!(clipped.ends_with("\u{1b}[0m"));
    }

    #[test]
    fn clipping_plain_text_adds_no_reset() {
        assert_eq!(clip_ansi_to_visible_width("abcdef", 3), "abc");
        assert_eq!(clip_ansi_to_visible_width("abc", 3), "abc");
        assert_eq!(clip_ansi_to_visible_width("abc", 0), "");
    }

    #[test]
    fn stripping_keeps_multibyte_text() {
        let text = "\u{1b}[1m\u{1b}[34mzoë\u{1b}[0m: \u{1b}[36mhéllo 👋\u{1b}[0m";
        assert_eq!(strip_ansi(text), "zoë: héllo 👋");
    }
}
