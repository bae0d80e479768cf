//! Drives a command sequence over a link and prints the transcript.

use std::io::{Read, Write};

use tracing::warn;

use crate::error::Result;
use crate::link::CommandLink;
use crate::protocol::{self, Command, Measurement};
use crate::sequence::SequenceEntry;

/// One completed request/reply pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub command: Command,
    pub reply: String,
    pub measurement: Option<Measurement>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub exchanges: Vec<Exchange>,
    /// Framed entries that named no known command and were not sent.
    pub rejected: Vec<String>,
}

/// Runs `entries` in order, writing the transcript to `out`.
///
/// A scaled reply that cannot be decoded stops the run.
pub fn run_sequence<P, W>(
    link: &mut CommandLink<P>,
    entries: &[SequenceEntry],
    out: &mut W,
) -> Result<RunSummary>
where
    P: Read + Write,
    W: Write,
{
    let mut summary = RunSummary::default();

    for (idx, entry) in entries.iter().enumerate() {
        writeln!(out, "command[{idx}] is: {}", entry.token())?;

        let command = match entry {
            SequenceEntry::Known(command) => *command,
            SequenceEntry::Unknown(raw) => {
                warn!(token = %raw, "unknown command skipped");
                writeln!(out, "command entered error: {raw}")?;
                summary.rejected.push(raw.clone());
                continue;
            }
        };

        let reply = link.transact(command)?;
        writeln!(out, "received by UART is:")?;
        writeln!(out, "{reply}")?;

        let measurement = protocol::decode_reading(command, &reply)?;
        if let Some(m) = &measurement {
            writeln!(out, "{m}")?;
        }

        summary.exchanges.push(Exchange {
            command,
            reply,
            measurement,
        });
    }

    Ok(summary)
}
