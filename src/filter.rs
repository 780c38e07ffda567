use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};

pub const MAX_BLACKLIST_WORDS: usize = 1_000;

/// Case-insensitive substring filter applied to message bodies before they
/// reach the store.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    words: Vec<String>,
}

impl Blacklist {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|word| word.as_ref().trim_end_matches(['\r', '\n']).to_lowercase())
            .filter(|word| !word.is_empty())
            .take(MAX_BLACKLIST_WORDS)
            .collect();
        Self { words }
    }

    /// One word per line. A missing file is an empty blacklist.
    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no blacklist at {}", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(err),
        };

        let blacklist = Self::new(contents.lines());
        info!(
            "loaded {} blacklisted words from {}",
            blacklist.len(),
            path.display()
        );
        Ok(blacklist)
    }

    pub fn matches(&self, body: &str) -> bool {
        if self.words.is_empty() {
            return false;
        }

        let body = body.to_lowercase();
        self.words.iter().any(|word| body.contains(word.as_str()))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
