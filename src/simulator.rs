//! # Adapter Card Firmware Simulator
//!
//! This module contains the logic for simulating the ATmega328P firmware that
//! sits between the PC and the INA209 power monitor. It keeps the state of the
//! power regulator and the INA209 registers and answers command lines exactly
//! like the real board does, so the sender can run without hardware.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use tracing::{debug, trace};

use crate::protocol::{self, Command, TERMINATOR};

/// Reply for a framed line that names no known command.
pub const FAIL_FEEDBACK: &str = "0xEEfailfb0xFFfrommicro";

// Values the firmware writes for setconfig / setcalib.
const CONFIG_WRITE: u16 = 0x299F; // +/-80 mV shunt range
const CALIB_WRITE: u16 = 0x4A12; // current LSB 80 uA, power LSB 1.6 mW

// Bus voltage register flag: conversion ready.
const BUS_CNVR: u16 = 0b010;

// Represents the INA209 register file as seen over TWI.
#[derive(Debug, Clone, PartialEq)]
pub struct Ina209 {
    pub configuration: u16,
    pub calibration: u16,
    // Raw shunt voltage in 10 uV steps.
    pub shunt_voltage: u16,
    // Raw bus voltage in 4 mV steps, before the register shift.
    pub bus_voltage: u16,
}

impl Default for Ina209 {
    fn default() -> Self {
        // Power-on defaults from the INA209 datasheet.
        Self {
            configuration: 0x399F,
            calibration: 0x0000,
            shunt_voltage: 0,
            bus_voltage: 0,
        }
    }
}

impl Ina209 {
    /// Bus voltage register: value in bits 15..3, status flags below.
    pub fn bus_voltage_register(&self) -> u16 {
        (self.bus_voltage << 3) | BUS_CNVR
    }

    /// Current register, derived from shunt voltage and calibration.
    pub fn current_register(&self) -> u16 {
        let current = self.shunt_voltage as u32 * self.calibration as u32 / 4096;
        current.min(u16::MAX as u32) as u16
    }

    /// Power register, derived from current and bus voltage.
    pub fn power_register(&self) -> u16 {
        let power = self.current_register() as u32 * self.bus_voltage as u32 / 5000;
        power.min(u16::MAX as u32) as u16
    }
}

// The main struct that holds the entire state of the simulated adapter card.
#[derive(Debug, Clone)]
pub struct Simulator {
    pub regulator_on: bool,
    pub ina209: Ina209,
    // Inputs the monitor sees while the regulator is on.
    load_shunt: u16,
    load_bus: u16,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Creates a board in its boot state: regulator driven on, no load.
    pub fn new() -> Self {
        Self {
            regulator_on: true,
            ina209: Ina209::default(),
            load_shunt: 0,
            load_bus: 0,
        }
    }

    /// Sets the raw shunt and bus readings the monitor reports while powered.
    pub fn with_load(mut self, shunt_voltage: u16, bus_voltage: u16) -> Self {
        self.load_shunt = shunt_voltage;
        self.load_bus = bus_voltage & 0x1FFF;
        self.apply_regulator();
        self
    }

    fn apply_regulator(&mut self) {
        if self.regulator_on {
            self.ina209.shunt_voltage = self.load_shunt;
            self.ina209.bus_voltage = self.load_bus;
        } else {
            self.ina209.shunt_voltage = 0;
            self.ina209.bus_voltage = 0;
        }
    }

    /// Matches a framed line against the command table by prefix, in the
    /// order the firmware checks them.
    fn parse_command(line: &str) -> Option<Command> {
        const FIRMWARE_ORDER: [Command; 10] = [
            Command::PowerOn,
            Command::TurnOff,
            Command::ReadConfig,
            Command::ReadCalib,
            Command::ShuntVolt,
            Command::BusVolt,
            Command::Power,
            Command::Current,
            Command::SetConfig,
            Command::SetCalib,
        ];
        FIRMWARE_ORDER
            .into_iter()
            .find(|cmd| line.starts_with(&cmd.token()))
    }

    /// Processes one received line and returns the reply, without terminator.
    ///
    /// Lines missing either marker are dropped without a reply.
    pub fn process_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        if !protocol::is_framed(line) {
            debug!(line, "simulator ignoring unframed line");
            return None;
        }

        let reply = match Self::parse_command(line) {
            Some(command) => self.execute_command(command),
            None => String::from(FAIL_FEEDBACK),
        };
        Some(reply)
    }

    /// Executes a parsed command and returns the reply string.
    fn execute_command(&mut self, command: Command) -> String {
        match command {
            Command::PowerOn => {
                self.regulator_on = true;
                self.apply_regulator();
                String::from("power regulator is on.")
            }
            Command::TurnOff => {
                self.regulator_on = false;
                self.apply_regulator();
                String::from("power regulator is off.")
            }
            Command::ReadConfig => register_bits(self.ina209.configuration),
            Command::ReadCalib => register_bits(self.ina209.calibration),
            Command::ShuntVolt => register_bits(self.ina209.shunt_voltage),
            Command::BusVolt => register_bits(self.ina209.bus_voltage_register()),
            Command::Power => register_bits(self.ina209.power_register()),
            Command::Current => register_bits(self.ina209.current_register()),
            Command::SetConfig => {
                self.ina209.configuration = CONFIG_WRITE;
                String::from("configuration register update is done.")
            }
            Command::SetCalib => {
                self.ina209.calibration = CALIB_WRITE;
                String::from("calibration register update is done.")
            }
        }
    }
}

/// A register sent MSB first as sixteen `0`/`1` characters.
fn register_bits(value: u16) -> String {
    format!("{value:016b}")
}

/// Byte port backed by a [`Simulator`], standing in for the serial device.
///
/// Writes are buffered until a newline, then processed; replies queue up for
/// reading. An empty read queue reports `TimedOut` like a polled serial port.
#[derive(Debug, Default)]
pub struct SimulatedPort {
    simulator: Simulator,
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
}

impl SimulatedPort {
    pub fn new(simulator: Simulator) -> Self {
        Self {
            simulator,
            inbox: Vec::new(),
            outbox: VecDeque::new(),
        }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }
}

impl Write for SimulatedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte != TERMINATOR {
                self.inbox.push(byte);
                continue;
            }
            let line = String::from_utf8_lossy(&self.inbox).into_owned();
            self.inbox.clear();
            if let Some(reply) = self.simulator.process_line(&line) {
                trace!(%line, %reply, "simulator reply");
                self.outbox.extend(reply.bytes());
                self.outbox.push_back(TERMINATOR);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outbox.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply pending"));
        }
        let n = buf.len().min(self.outbox.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}
