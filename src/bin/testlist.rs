//! Scrapes on-target unit-test suites out of a firmware tree into a CSV list.

use std::path::PathBuf;
use std::process::ExitCode;

use adapter_card::error::{Result, FAIL_EXIT};
use adapter_card::scanner::{self, report};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "testlist", version, about = "List on-target unit tests found in C sources")]
struct Args {
    /// Directory to scan recursively
    #[arg(long)]
    path: PathBuf,

    /// Directory for the output file
    #[arg(long = "output_file_path", default_value = ".")]
    output_file_path: PathBuf,

    /// Name of the output file
    #[arg(long = "output_file_name", default_value = report::DEFAULT_OUTPUT_NAME)]
    output_file_name: String,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    log: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    adapter_card::init_tracing(args.log);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(FAIL_EXIT)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let list = scanner::scan(&args.path)?;
    let output = report::output_path(&args.output_file_path, &args.output_file_name);
    report::save_csv(&list, &output)?;
    println!("{}", report::to_json(&list)?);
    Ok(())
}
