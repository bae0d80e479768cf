//! Acquiring the command sequence, either from flags or from a sequence file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{self, Command};

/// Where the sequence comes from; exactly one source is allowed.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandSource {
    Flags(Vec<Command>),
    File(PathBuf),
}

impl CommandSource {
    /// Checks that commands were given either as flags or as a file, not both.
    pub fn select(flags: &[Command], file: Option<PathBuf>) -> Result<Self> {
        match (flags.is_empty(), file) {
            (false, Some(_)) => Err(Error::ConflictingSources),
            (true, None) => Err(Error::NoCommands),
            (true, Some(path)) => Ok(CommandSource::File(path)),
            (false, None) => Ok(CommandSource::Flags(flags.to_vec())),
        }
    }

    /// Resolves the source into the entries to run, in order.
    pub fn acquire(&self) -> Result<Vec<SequenceEntry>> {
        match self {
            CommandSource::Flags(selected) => Ok(Command::CLI_ORDER
                .into_iter()
                .filter(|cmd| selected.contains(cmd))
                .map(SequenceEntry::Known)
                .collect()),
            CommandSource::File(path) => load_sequence(path),
        }
    }
}

/// One line of the sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceEntry {
    Known(Command),
    /// Framed correctly but not a command the firmware knows.
    Unknown(String),
}

impl SequenceEntry {
    pub fn token(&self) -> String {
        match self {
            SequenceEntry::Known(cmd) => cmd.token(),
            SequenceEntry::Unknown(raw) => raw.clone(),
        }
    }
}

pub fn load_sequence(path: &Path) -> Result<Vec<SequenceEntry>> {
    let text = fs::read_to_string(path)?;
    parse_sequence(path, &text)
}

/// Parses a sequence file: one framed command per line, `#` comments and
/// blank lines allowed. Any other line aborts with its line number.
pub fn parse_sequence(path: &Path, text: &str) -> Result<Vec<SequenceEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !protocol::is_framed(line) {
            return Err(Error::SequenceFormat {
                path: path.to_path_buf(),
                line: idx + 1,
                text: line.to_string(),
            });
        }
        let entry = match Command::from_token(line) {
            Some(cmd) => SequenceEntry::Known(cmd),
            None => SequenceEntry::Unknown(line.to_string()),
        };
        debug!(?entry, "sequence entry");
        entries.push(entry);
    }
    Ok(entries)
}
