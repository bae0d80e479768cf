//! Crate-level error type and `Result` alias shared by both tools.
use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::CommandError;

pub type Result<T> = std::result::Result<T, Error>;

/// Process exit status used for every fatal error.
pub const FAIL_EXIT: u8 = 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("{0}")]
    Command(#[from] CommandError),

    #[error(
        "--cmdsequencefile and other cmd specification args cannot be defined together in the command line."
    )]
    ConflictingSources,

    #[error("None of the cmd specification arg is defined.")]
    NoCommands,

    #[error("{}:{line}: {text}\nThe command format is incorrect", path.display())]
    SequenceFormat {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("no reply line within {0:?}")]
    ReplyTimeout(std::time::Duration),

    #[error("serial link closed before a full reply line was received")]
    LinkClosed,

    #[error("{}: suite `{suite}` is registered but its suite info was not found", path.display())]
    MissingSuiteInfo { path: PathBuf, suite: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
