use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = ".twitch_config";
pub const BLACKLIST_FILE: &str = "blacklist.txt";
pub const TEMPLATE_FILE: &str = "twitchchat.html";
pub const STYLESHEET_FILE: &str = "twitchchat.css";
pub const LOG_FILE: &str = "twitchchat.log";

const TOKEN_PREFIX: &str = "oauth:";

/// OAuth token and login name, stored as two lines on disk.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    nickname: String,
}

impl Credentials {
    /// Accepts a token with or without the `oauth:` prefix.
    pub fn new(token: &str, nickname: &str) -> Result<Self> {
        let token = token.trim();
        let token = token.strip_prefix(TOKEN_PREFIX).unwrap_or(token);
        let nickname = nickname.trim();

        if token.is_empty() || token.contains(char::is_whitespace) {
            return Err(Error::Credentials("token must be a single word".to_owned()));
        }
        if nickname.is_empty() || nickname.contains(char::is_whitespace) {
            return Err(Error::Credentials(
                "nickname must be a single word".to_owned(),
            ));
        }

        Ok(Self {
            token: token.to_owned(),
            nickname: nickname.to_lowercase(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// `Ok(None)` when the file is missing or incomplete.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut lines = contents.lines().map(str::trim).filter(|line| !line.is_empty());
        let (Some(token), Some(nickname)) = (lines.next(), lines.next()) else {
            debug!("{} is incomplete, ignoring it", path.display());
            return Ok(None);
        };

        Self::new(token, nickname).map(Some)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, format!("{}\n{}\n", self.token, self.nickname))?;
        restrict_to_owner(path)?;
        info!("saved credentials for {} to {}", self.nickname, path.display());
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("nickname", &self.nickname)
            .finish()
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Channel names are joined lowercase and without the leading `#`.
pub fn normalize_channel(raw: &str) -> Result<String> {
    let channel = raw.trim().trim_start_matches('#').to_lowercase();
    if channel.is_empty() || channel.contains(char::is_whitespace) {
        return Err(Error::InvalidInput(format!("not a channel name: {raw:?}")));
    }
    Ok(channel)
}
