use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use adapter_card::error::{Result, FAIL_EXIT};
use adapter_card::link::{self, CommandLink};
use adapter_card::protocol::{Command, DEFAULT_BAUD};
use adapter_card::runner::run_sequence;
use adapter_card::sequence::CommandSource;
use adapter_card::{SimulatedPort, Simulator};
use clap::Parser;
use tracing::info;

/// Sends power and measurement commands to the adapter card micro.
///
/// Commands come either from flags, run in a fixed order, or from a sequence
/// file with one framed command per line.
#[derive(Parser, Debug)]
#[command(name = "powerctl", version, about)]
struct Args {
    /// Serial port of the micro (/dev/ttyUSB1, \\.\COM6, /dev/ttyS5)
    #[arg(long, env = "POWERCTL_COMPORT", required_unless_present = "simulate")]
    comport: Option<String>,

    /// File with the command sequence, one command per line
    #[arg(long = "cmdsequencefile")]
    cmdsequencefile: Option<PathBuf>,

    /// Enable poweron command (0xEEpoweron0xFF) in command sequence
    #[arg(long = "poweron")]
    poweron: bool,
    /// Enable turnOFF command (0xEEturnOFF0xFF) in command sequence
    #[arg(long = "turnOFF")]
    turn_off: bool,
    /// Enable readconfig command (0xEEreadconfig0xFF) in command sequence
    #[arg(long = "readconfig")]
    readconfig: bool,
    /// Enable readcalib command (0xEEreadcalib0xFF) in command sequence
    #[arg(long = "readcalib")]
    readcalib: bool,
    /// Enable shuntvolt command (0xEEshuntvolt0xFF) in command sequence
    #[arg(long = "shuntvolt")]
    shuntvolt: bool,
    /// Enable busvolt command (0xEEbusvolt0xFF) in command sequence
    #[arg(long = "busvolt")]
    busvolt: bool,
    /// Enable power command (0xEEpower0xFF) in command sequence
    #[arg(long = "power")]
    power: bool,
    /// Enable current command (0xEEcurrent0xFF) in command sequence
    #[arg(long = "current")]
    current: bool,
    /// Enable setconfig command (0xEEsetconfig0xFF) in command sequence
    #[arg(long = "setconfig")]
    setconfig: bool,
    /// Enable setcalib command (0xEEsetcalib0xFF) in command sequence
    #[arg(long = "setcalib")]
    setcalib: bool,

    /// UART baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Delay after opening the port before the first command
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,

    /// Give up waiting for a reply after this long (default: wait forever)
    #[arg(long)]
    reply_timeout_ms: Option<u64>,

    /// Talk to a simulated board instead of a serial port
    #[arg(long, default_value_t = false)]
    simulate: bool,

    /// Raw shunt voltage the simulated board reports (10 uV steps)
    #[arg(long, default_value_t = 2500, requires = "simulate")]
    sim_shunt: u16,

    /// Raw bus voltage the simulated board reports (4 mV steps)
    #[arg(long, default_value_t = 3000, requires = "simulate")]
    sim_bus: u16,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    log: bool,
}

impl Args {
    fn selected(&self) -> Vec<Command> {
        [
            (self.poweron, Command::PowerOn),
            (self.turn_off, Command::TurnOff),
            (self.readconfig, Command::ReadConfig),
            (self.readcalib, Command::ReadCalib),
            (self.shuntvolt, Command::ShuntVolt),
            (self.busvolt, Command::BusVolt),
            (self.power, Command::Power),
            (self.current, Command::Current),
            (self.setconfig, Command::SetConfig),
            (self.setcalib, Command::SetCalib),
        ]
        .into_iter()
        .filter_map(|(on, cmd)| on.then_some(cmd))
        .collect()
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    adapter_card::init_tracing(args.log);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(FAIL_EXIT)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let source = CommandSource::select(&args.selected(), args.cmdsequencefile.clone())?;
    let entries = source.acquire()?;
    let reply_timeout = args.reply_timeout_ms.map(Duration::from_millis);
    let mut out = io::stdout().lock();

    // clap guarantees a port unless --simulate was given.
    let port_name = match args.comport.as_deref() {
        Some(port_name) if !args.simulate => port_name,
        _ => {
            info!("using simulated board");
            let board = Simulator::new().with_load(args.sim_shunt, args.sim_bus);
            let mut link =
                CommandLink::new(SimulatedPort::new(board)).with_reply_timeout(reply_timeout);
            run_sequence(&mut link, &entries, &mut out)?;
            return Ok(());
        }
    };
    let port = link::open_serial(port_name, args.baud)?;
    thread::sleep(Duration::from_millis(args.settle_ms));

    let mut link = CommandLink::new(port).with_reply_timeout(reply_timeout);
    let summary = run_sequence(&mut link, &entries, &mut out)?;
    info!(
        sent = summary.exchanges.len(),
        rejected = summary.rejected.len(),
        "sequence finished"
    );
    Ok(())
}
