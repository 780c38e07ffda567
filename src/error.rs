use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("could not connect to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("credentials: {0}")]
    Credentials(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("terminal unavailable: {0}")]
    Terminal(#[source] io::Error),
}
