//! # Adapter Card Tools Library
//!
//! This library contains the logic behind two bench utilities for the adapter
//! card. `powerctl` drives the ATmega328P that switches the power regulator and
//! reads the INA209 power monitor over a serial link. `testlist` scans a
//! firmware tree for on-target unit-test suites and reports them as CSV.

pub mod error;
pub mod link;
pub mod protocol;
pub mod runner;
pub mod scanner;
pub mod sequence;
pub mod simulator;

pub use error::{Error, Result, FAIL_EXIT};
pub use protocol::{Command, Measurement};
pub use simulator::{SimulatedPort, Simulator};

use tracing_subscriber::EnvFilter;

/// Installs the stderr log subscriber for a binary.
///
/// `debug` forces debug level; otherwise `RUST_LOG` decides, defaulting to
/// warnings only.
pub fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
