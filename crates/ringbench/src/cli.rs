//! Command-line parsing for the `ringbench` binary.
//!
//! Arguments before a standalone `--` belong to the runtime bootstrap and are
//! skipped. Flags take their value as the next argument or inline
//! (`--msgs=1000`).

use crate::config::{Placement, RunConfig};
use crate::error::ConfigError;
use crate::idle::IdleStrategy;
use crate::traffic::TrafficMode;
use std::str::FromStr;

/// Usage text printed for `--help` and on configuration errors.
pub const USAGE: &str = "\
usage: ringbench [bootstrap args --] --mode <sink|fw|fw-copy> [options]

options:
  --mode <sink|fw|fw-copy>   traffic pattern (required)
  --batchsize <n>            handles per bulk transfer, 1..=128 (default 32)
  --msgs <n>                 messages per run, >= batchsize (default 1000000)
  --ring-size <n>            ring capacity, power of two (default 128)
  --pool-size <n>            pool elements (default 1024)
  --elt-size <n>             pool element size in bytes (default 84)
  --idle <spin|yield|backoff>
                             retry policy on full/empty rings (default spin)
  --cores <a>,<b>            pin producer to core a, forwarder to core b
  --no-pin                   leave thread placement to the OS
  -h, --help                 print this help

RUST_LOG controls diagnostics on stderr (default ringbench=info).";

/// What the binary was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run one benchmark with a validated configuration.
    Run(RunConfig),
    /// Print usage and exit.
    Help,
}

/// Parses process arguments (without the program name) into a [`Command`].
///
/// The returned configuration has already passed [`RunConfig::validate`].
pub fn parse<I, S>(args: I) -> Result<Command, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let app_args = match args.iter().position(|a| a == "--") {
        Some(split) => &args[split + 1..],
        None => &args[..],
    };

    let mut mode = None;
    let mut config = RunConfig::new(TrafficMode::Sink);
    let mut it = app_args.iter().cloned();

    while let Some(arg) = it.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                (flag.to_string(), Some(value.to_string()))
            }
            _ => (arg, None),
        };

        match flag.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--no-pin" => config.placement = Placement::Unpinned,
            "--mode" => {
                let raw = take_value("--mode", inline, &mut it)?;
                mode = Some(raw.parse::<TrafficMode>()?);
            }
            "--batchsize" => config.batch_size = number("--batchsize", inline, &mut it)?,
            "--msgs" => config.msgs = number("--msgs", inline, &mut it)?,
            "--ring-size" => config.ring_size = number("--ring-size", inline, &mut it)?,
            "--pool-size" => config.pool_size = number("--pool-size", inline, &mut it)?,
            "--elt-size" => config.element_size = number("--elt-size", inline, &mut it)?,
            "--idle" => {
                let raw = take_value("--idle", inline, &mut it)?;
                config.idle = raw.parse::<IdleStrategy>().map_err(|value| {
                    ConfigError::InvalidValue {
                        flag: "--idle",
                        value,
                    }
                })?;
            }
            "--cores" => config.placement = cores(take_value("--cores", inline, &mut it)?)?,
            _ => return Err(ConfigError::UnknownArgument(flag)),
        }
    }

    config.mode = mode.ok_or(ConfigError::MissingMode)?;
    config.validate()?;
    Ok(Command::Run(config))
}

fn take_value(
    flag: &'static str,
    inline: Option<String>,
    rest: &mut impl Iterator<Item = String>,
) -> Result<String, ConfigError> {
    inline
        .or_else(|| rest.next())
        .ok_or(ConfigError::MissingValue(flag))
}

fn number<T: FromStr>(
    flag: &'static str,
    inline: Option<String>,
    rest: &mut impl Iterator<Item = String>,
) -> Result<T, ConfigError> {
    let raw = take_value(flag, inline, rest)?;
    raw.parse()
        .map_err(|_| ConfigError::InvalidValue { flag, value: raw })
}

fn cores(raw: String) -> Result<Placement, ConfigError> {
    let parsed = raw
        .split_once(',')
        .and_then(|(a, b)| Some((a.trim().parse().ok()?, b.trim().parse().ok()?)));
    match parsed {
        Some((producer, forwarder)) => Ok(Placement::Cores {
            producer,
            forwarder,
        }),
        None => Err(ConfigError::InvalidValue {
            flag: "--cores",
            value: raw,
        }),
    }
}
