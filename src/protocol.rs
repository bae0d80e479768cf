//! # Adapter card command protocol
//!
//! Commands travel from the PC to the ATmega328P as ASCII tokens framed by the
//! literal markers `0xEE` and `0xFF` and terminated by `\n`. The micro answers
//! with a single `\n`-terminated line: either a status sentence or the 16-bit
//! content of an INA209 register written MSB first as `0`/`1` characters.

use std::fmt;
use std::num::ParseIntError;

use thiserror::Error;

/// Header marker that opens every command token.
pub const HEADER: &str = "0xEE";
/// Tail marker that closes every command token.
pub const TAIL: &str = "0xFF";
/// Line terminator for both directions.
pub const TERMINATOR: u8 = b'\n';
/// UART rate the firmware is built for.
pub const DEFAULT_BAUD: u32 = 4800;

// LSB weights in micro-units, fixed by the calibration the firmware writes.
const SHUNT_VOLT_LSB_MICRO: u64 = 10; // 0.01 mV, INA209 default
const BUS_VOLT_LSB_MICRO: u64 = 4_000; // 4 mV, INA209 default
const POWER_LSB_MICRO: u64 = 1_600; // 1.6 mW
const CURRENT_LSB_MICRO: u64 = 80; // 80 uA

// Low bits of the bus voltage register carry status flags, not voltage.
const BUS_VOLT_STATUS_BITS: usize = 3;

// Errors raised while decoding what the micro sent back.
#[derive(Debug, PartialEq, Error)]
pub enum CommandError {
    /// Reply is not a string of `0`/`1` characters.
    #[error("reply `{0}` is not a binary register value")]
    InvalidReading(String),
    /// Reply is binary but does not fit a register.
    #[error("reply does not fit a register: {0}")]
    Overflow(ParseIntError),
}

/// Every command the adapter card firmware understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    PowerOn,
    TurnOff,
    ReadConfig,
    ReadCalib,
    ShuntVolt,
    BusVolt,
    Power,
    Current,
    SetConfig,
    SetCalib,
}

impl Command {
    /// Order in which commands run when they are selected by flags.
    pub const CLI_ORDER: [Command; 10] = [
        Command::PowerOn,
        Command::SetConfig,
        Command::SetCalib,
        Command::ReadConfig,
        Command::ReadCalib,
        Command::ShuntVolt,
        Command::BusVolt,
        Command::Power,
        Command::Current,
        Command::TurnOff,
    ];

    /// The bare command name carried between the markers.
    pub fn name(self) -> &'static str {
        match self {
            Command::PowerOn => "poweron",
            Command::TurnOff => "turnOFF",
            Command::ReadConfig => "readconfig",
            Command::ReadCalib => "readcalib",
            Command::ShuntVolt => "shuntvolt",
            Command::BusVolt => "busvolt",
            Command::Power => "power",
            Command::Current => "current",
            Command::SetConfig => "setconfig",
            Command::SetCalib => "setcalib",
        }
    }

    /// The framed token, e.g. `0xEEpoweron0xFF`.
    pub fn token(self) -> String {
        format!("{HEADER}{}{TAIL}", self.name())
    }

    pub fn from_name(name: &str) -> Option<Command> {
        Self::CLI_ORDER.into_iter().find(|cmd| cmd.name() == name)
    }

    /// Looks up a command by its exact framed token.
    pub fn from_token(token: &str) -> Option<Command> {
        token
            .strip_prefix(HEADER)
            .and_then(|rest| rest.strip_suffix(TAIL))
            .and_then(Command::from_name)
    }

    /// The physical quantity this command reads back, if its reply is scaled.
    pub fn quantity(self) -> Option<Quantity> {
        match self {
            Command::ShuntVolt => Some(Quantity::ShuntVoltage),
            Command::BusVolt => Some(Quantity::BusVoltage),
            Command::Power => Some(Quantity::Power),
            Command::Current => Some(Quantity::Current),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{HEADER}{}{TAIL}", self.name())
    }
}

/// True when `line` opens with the header marker and closes with the tail marker.
pub fn is_framed(line: &str) -> bool {
    line.starts_with(HEADER) && line.ends_with(TAIL)
}

/// Bytes written to the link for one command.
pub fn encode_request(command: Command) -> Vec<u8> {
    let mut bytes = command.token().into_bytes();
    bytes.push(TERMINATOR);
    bytes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    ShuntVoltage,
    BusVoltage,
    Power,
    Current,
}

impl Quantity {
    fn lsb_micro(self) -> u64 {
        match self {
            Quantity::ShuntVoltage => SHUNT_VOLT_LSB_MICRO,
            Quantity::BusVoltage => BUS_VOLT_LSB_MICRO,
            Quantity::Power => POWER_LSB_MICRO,
            Quantity::Current => CURRENT_LSB_MICRO,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quantity::ShuntVoltage => "shuntvolt",
            Quantity::BusVoltage => "busvolt",
            Quantity::Power => "power",
            Quantity::Current => "current",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Quantity::ShuntVoltage | Quantity::BusVoltage => "V",
            Quantity::Power => "W",
            Quantity::Current => "A",
        }
    }
}

/// A register reading scaled into SI units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub quantity: Quantity,
    /// Register value after status bits were stripped.
    pub raw: u32,
    /// Value in millionths of the SI unit; exact for every LSB above.
    pub micros: u64,
}

impl Measurement {
    pub fn value(&self) -> f64 {
        self.micros as f64 / 1_000_000.0
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {} {}",
            self.quantity.label(),
            self.value(),
            self.quantity.unit()
        )
    }
}

/// Scales the reply to `command` when it carries a measurement.
///
/// Commands whose reply is a status sentence or an unscaled register dump
/// yield `Ok(None)`.
pub fn decode_reading(command: Command, reply: &str) -> Result<Option<Measurement>, CommandError> {
    let Some(quantity) = command.quantity() else {
        return Ok(None);
    };

    let bits = match quantity {
        Quantity::BusVoltage => {
            let keep = reply.len().saturating_sub(BUS_VOLT_STATUS_BITS);
            reply.get(..keep).unwrap_or_default()
        }
        _ => reply,
    };

    if bits.is_empty() || !bits.bytes().all(|b| b == b'0' || b == b'1') {
        return Err(CommandError::InvalidReading(reply.to_string()));
    }
    let raw = u32::from_str_radix(bits, 2).map_err(CommandError::Overflow)?;

    Ok(Some(Measurement {
        quantity,
        raw,
        micros: raw as u64 * quantity.lsb_micro(),
    }))
}
