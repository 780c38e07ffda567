//! The slice of Twitch IRC needed to join one channel, read its chat and
//! talk back. Inbound parsing is a best-effort scanner: anything it does not
//! recognise is [`Inbound::Ignored`], never an error.

use std::fmt;

use crate::store::ChatMessage;
use crate::tags;

pub const HOST: &str = "irc.chat.twitch.tv";
pub const PORT: u16 = 6667;
pub const CAPABILITIES: &str = "twitch.tv/tags twitch.tv/commands";
pub const FAREWELL: &str = "Goodbye!";

const PING: &str = "PING";
const PRIVMSG: &str = "PRIVMSG";

/// Outbound commands, rendered without the trailing CRLF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Pass { token: &'a str },
    Nick { nickname: &'a str },
    CapReq,
    Join { channel: &'a str },
    Pong { argument: &'a str },
    Privmsg { channel: &'a str, text: &'a str },
    Part { channel: &'a str },
    Quit,
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass { token } => write!(f, "PASS oauth:{token}"),
            Command::Nick { nickname } => write!(f, "NICK {nickname}"),
            Command::CapReq => write!(f, "CAP REQ :{CAPABILITIES}"),
            Command::Join { channel } => write!(f, "JOIN #{channel}"),
            Command::Pong { argument } => write!(f, "PONG {argument}"),
            Command::Privmsg { channel, text } => write!(f, "PRIVMSG #{channel} :{text}"),
            Command::Part { channel } => write!(f, "PART #{channel}"),
            Command::Quit => write!(f, "QUIT :{FAREWELL}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Keep-alive probe; the payload must be echoed back in a `PONG`.
    Ping(&'a str),
    Chat(ChatLine<'a>),
    Ignored,
}

/// Borrowed pieces of a `PRIVMSG` line, not yet bounded or classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLine<'a> {
    pub tags: &'a str,
    pub sender: &'a str,
    pub body: &'a str,
}

impl ChatLine<'_> {
    pub fn into_message(self) -> Option<ChatMessage> {
        ChatMessage::new(self.sender, self.body, tags::classify(self.tags))
    }
}

pub fn parse_line(line: &str) -> Inbound<'_> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix(PING) {
        return Inbound::Ping(rest.strip_prefix(' ').unwrap_or(rest));
    }

    if !line.contains(PRIVMSG) {
        return Inbound::Ignored;
    }

    parse_privmsg(line).map_or(Inbound::Ignored, Inbound::Chat)
}

fn parse_privmsg(line: &str) -> Option<ChatLine<'_>> {
    let (tags, rest) = if line.starts_with('@') {
        line.split_once(' ')?
    } else {
        ("", line)
    };

    let sender_start = rest.find(':')? + 1;
    let sender_len = rest[sender_start..].find('!')?;
    let sender = &rest[sender_start..sender_start + sender_len];

    let after_sender = &rest[sender_start + sender_len..];
    let command = after_sender.find(PRIVMSG)?;
    let after_command = &after_sender[command..];
    let body_start = after_command.find(':')? + 1;

    Some(ChatLine {
        tags,
        sender,
        body: &after_command[body_start..],
    })
}

#[cfg(test)]
mod tests {
    use super::{ChatLine, Command, Inbound, parse_line};
    use crate::tags::Privileges;

    #[test]
    fn ping_payload_is_kept_verbatim() {
        assert_eq!(parse_line("PING :tmi.twitch.tv"), Inbound::Ping(":tmi.twitch.tv"));
        assert_eq!(parse_line("PING :tmi.twitch.tv\r\n"), Inbound::Ping(":tmi.twitch.tv"));
        assert_eq!(parse_line("PING"), Inbound::Ping(""));
    }

    #[test]
    fn pong_echoes_ping_argument() {
        let Inbound::Ping(argument) = parse_line("PING :tmi.twitch.tv") else {
            panic!("expected ping");
        };
        assert_eq!(Command::Pong { argument }.to_string(), "PONG :tmi.twitch.tv");
    }

    #[test]
    fn tagged_chat_line_is_split() {
        let line =
            "@badges=broadcaster/1;bits=0 :alice!alice@alice.tmi.twitch.tv PRIVMSG #chan :hello world\r\n";
        assert_eq!(
            parse_line(line),
            Inbound::Chat(ChatLine {
                tags: "@badges=broadcaster/1;bits=0",
                sender: "alice",
                body: "hello world",
            })
        );
    }

    #[test]
    fn chat_line_becomes_classified_message() {
        let line =
            "@badges=broadcaster/1;bits=0 :alice!alice@alice.tmi.twitch.tv PRIVMSG #chan :hello world\r\n";
        let Inbound::Chat(chat) = parse_line(line) else {
            panic!("expected chat line");
        };
        let message = chat.into_message().expect("sender present");

        assert_eq!(message.sender(), "alice");
        assert_eq!(message.body(), "hello world");
        assert_eq!(
            message.privileges(),
            Privileges {
                broadcaster: true,
                ..Privileges::none()
            }
        );
        assert_eq!(message.bits(), 0);
    }

    #[test]
    fn body_keeps_inner_colons() {
        let line = "@bits=100 :bob!bob@bob.tmi.twitch.tv PRIVMSG #chan :cheer100 ratio: 10:1";
        let Inbound::Chat(chat) = parse_line(line) else {
            panic!("expected chat line");
        };
        assert_eq!(chat.body, "cheer100 ratio: 10:1");
    }

    #[test]
    fn untagged_chat_line_is_accepted() {
        let line = ":carol!carol@carol.tmi.twitch.tv PRIVMSG #chan :no tags here";
        assert_eq!(
            parse_line(line),
            Inbound::Chat(ChatLine {
                tags: "",
                sender: "carol",
                body: "no tags here",
            })
        );
    }

    #[test]
    fn other_server_lines_are_ignored() {
        for line in [
            ":tmi.twitch.tv 001 nick :Welcome, GLHF!",
            ":tmi.twitch.tv CAP * ACK :twitch.tv/tags twitch.tv/commands",
            ":nick!nick@nick.tmi.twitch.tv JOIN #chan",
            "@emote-sets=0 :tmi.twitch.tv USERSTATE #chan",
            "",
        ] {
            assert_eq!(parse_line(line), Inbound::Ignored, "{line}");
        }
    }

    #[test]
    fn malformed_privmsg_lines_are_dropped() {
        for line in [
            "@badges=vip/1",
            "@badges=vip/1 PRIVMSG",
            "@badges=vip/1 :nobang PRIVMSG #chan :hi",
            "@badges=vip/1 :dave!dave PRIVMSG #chan no colon body",
            "PRIVMSG",
        ] {
            assert_eq!(parse_line(line), Inbound::Ignored, "{line}");
        }
    }

    #[test]
    fn empty_sender_never_becomes_a_message() {
        let Inbound::Chat(chat) = parse_line("@x=1 :!anon PRIVMSG #chan :hi") else {
            panic!("expected chat line");
        };
        assert!(chat.into_message().is_none());
    }

    #[test]
    fn outbound_commands_match_wire_format() {
        assert_eq!(Command::Pass { token: "abc" }.to_string(), "PASS oauth:abc");
        assert_eq!(Command::Nick { nickname: "me" }.to_string(), "NICK me");
        assert_eq!(
            Command::CapReq.to_string(),
            "CAP REQ :twitch.tv/tags twitch.tv/commands"
        );
        assert_eq!(Command::Join { channel: "chan" }.to_string(), "JOIN #chan");
        assert_eq!(
            Command::Privmsg {
                channel: "chan",
                text: "hi there"
            }
            .to_string(),
            "PRIVMSG #chan :hi there"
        );
        assert_eq!(Command::Part { channel: "chan" }.to_string(), "PART #chan");
        assert_eq!(Command::Quit.to_string(), "QUIT :Goodbye!");
    }
}
