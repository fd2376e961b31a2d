use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The page lacks a landmark the parsers rely on (form, heading).
    #[error("Unexpected page structure: {0}")]
    Structure(String),

    #[error("Couldn't fetch {url} got: {reason}")]
    Transport { url: String, reason: String },

    /// A snapshot exists but isn't an array of flat string records.
    #[error("Couldn't load snapshot {origin} got: {reason}")]
    Load { origin: String, reason: String },

    #[error("I/O failure on {path:?} got: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn structure(what: impl Into<String>) -> Self {
        Self::Structure(what.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
