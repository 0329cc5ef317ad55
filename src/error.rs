use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::record::Record;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid configuration value for {key}: {value:?}")]
    Config { key: &'static str, value: String },

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("Couldn't send a batch through a channel.")]
    RuntimeSendError,

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Request to {url} failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },
}

impl From<mpsc::error::SendError<Vec<Record>>> for Error {
    fn from(_value: mpsc::error::SendError<Vec<Record>>) -> Self {
        Error::RuntimeSendError
    }
}

/// Failure to read or write the persisted collection.
/// When one of these is returned the file on disk is still the one from before the call.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Couldn't read collection at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Collection at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Couldn't encode collection for {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Couldn't write collection to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A single malformed item. Never fatal to a batch.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Item {index} has no community id")]
    MissingId { index: usize },
    #[error("Item {index} ({id}) has no name")]
    MissingName { index: usize, id: String },
    #[error("Couldn't decode about document: {0}")]
    About(String),
}
