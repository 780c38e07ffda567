//! Permissive scanner for the `@key=value;key=value` tag block Twitch
//! prepends to IRC lines when the `twitch.tv/tags` capability is granted.
//!
//! Not a full IRCv3 tag grammar: values come back verbatim (no
//! unescaping) and key order does not matter. Callers only see
//! [`tag_value`] and [`classify`].

const ROLE_BROADCASTER: &str = "broadcaster/";
const ROLE_MODERATOR: &str = "moderator/";
const ROLE_SUBSCRIBER: &str = "subscriber/";
const ROLE_VIP: &str = "vip/";

/// Sender roles inside the monitored channel. Not mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Privileges {
    pub broadcaster: bool,
    pub moderator: bool,
    pub subscriber: bool,
    pub vip: bool,
}

impl Privileges {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub privileges: Privileges,
    pub bits: u32,
}

/// Returns the raw value stored under `key`, or `None` when the key is absent.
///
/// A key that is present with an empty value (`bits=;`) yields `Some("")`.
pub fn tag_value<'a>(tags: &'a str, key: &str) -> Option<&'a str> {
    let tags = tags.strip_prefix('@').unwrap_or(tags);
    tags.split(';').find_map(|entry| {
        let (name, value) = entry.split_once('=').unwrap_or((entry, ""));
        (name == key).then_some(value)
    })
}

pub fn classify(tags: &str) -> Classification {
    Classification {
        privileges: privileges(tags),
        bits: bits(tags),
    }
}

fn privileges(tags: &str) -> Privileges {
    let Some(badges) = tag_value(tags, "badges") else {
        return Privileges::none();
    };

    Privileges {
        broadcaster: badges.contains(ROLE_BROADCASTER),
        moderator: badges.contains(ROLE_MODERATOR),
        subscriber: badges.contains(ROLE_SUBSCRIBER),
        vip: badges.contains(ROLE_VIP),
    }
}

// Leading digits only, like C's atoi; anything unparsable counts as no bits.
fn bits(tags: &str) -> u32 {
    let Some(value) = tag_value(tags, "bits") else {
        return 0;
    };

    value
        .trim_start()
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |acc, digit| {
            acc.saturating_mul(10).saturating_add(u32::from(digit - b'0'))
        })
}
