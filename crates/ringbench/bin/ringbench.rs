//! # ringbench
//!
//! Runs one traffic pattern and prints its throughput.
//!
//! ```bash
//! cargo run --release --bin ringbench -- --mode sink
//! cargo run --release --bin ringbench -- --mode fw --batchsize 1 --msgs 100
//! cargo run --release --bin ringbench -- --mode fw-copy --idle backoff --no-pin
//! ```

use ringbench::cli::{self, Command, USAGE};
use ringbench::{init_tracing, run, BenchError, RunConfig};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    init_tracing();

    match cli::parse(std::env::args().skip(1)) {
        Ok(Command::Help) => {
            println!("{USAGE}");
            ExitCode::SUCCESS
        }
        Ok(Command::Run(config)) => execute(config),
        Err(err) => fail(&err.into()),
    }
}

fn execute(config: RunConfig) -> ExitCode {
    match run(config) {
        Ok(report) => {
            for line in report.lines() {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "run failed");
            fail(&err)
        }
    }
}

/// Prints the diagnostic (plus usage for bad arguments) regardless of
/// `RUST_LOG`, and maps the error to its exit code.
fn fail(err: &BenchError) -> ExitCode {
    if err.is_config() {
        eprintln!("error: {err}\n\n{USAGE}");
    } else {
        eprintln!("error: {err}");
    }
    ExitCode::from(err.exit_code())
}
