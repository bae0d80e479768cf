//! Blocking request/response exchange over a byte port.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{self, Command, TERMINATOR};

/// Poll interval for a single serial read.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Opens `port_name` with the frame format the firmware expects (8N1).
pub fn open_serial(port_name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(port_name, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(POLL_TIMEOUT)
        .open()?;
    info!(port = port_name, baud_rate, "serial port open");
    Ok(port)
}

/// One command link to the micro.
pub struct CommandLink<P> {
    port: P,
    reply_timeout: Option<Duration>,
}

impl<P: Read + Write> CommandLink<P> {
    /// Wraps `port`; replies are awaited forever.
    pub fn new(port: P) -> Self {
        Self {
            port,
            reply_timeout: None,
        }
    }

    /// Gives up on a reply after `timeout` instead of waiting forever.
    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Writes the framed token for `command` followed by the terminator.
    pub fn send(&mut self, command: Command) -> Result<()> {
        let request = protocol::encode_request(command);
        debug!(%command, "sending");
        self.port.write_all(&request)?;
        self.port.flush()?;
        Ok(())
    }

    /// Reads one reply line, blocking until the terminator arrives.
    ///
    /// `\r` bytes are dropped and the terminator is not included.
    pub fn read_line(&mut self) -> Result<String> {
        let started = Instant::now();
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(Error::LinkClosed),
                Ok(_) => match byte[0] {
                    TERMINATOR => break,
                    b'\r' => {}
                    b => line.push(b),
                },
                Err(ref e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }

            if let Some(limit) = self.reply_timeout {
                if started.elapsed() >= limit {
                    return Err(Error::ReplyTimeout(limit));
                }
            }
        }

        let reply = String::from_utf8_lossy(&line).into_owned();
        debug!(%reply, elapsed = ?started.elapsed(), "received");
        Ok(reply)
    }

    /// Sends `command` and returns its reply line.
    pub fn transact(&mut self, command: Command) -> Result<String> {
        self.send(command)?;
        self.read_line()
    }
}
