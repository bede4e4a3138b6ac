use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod layout;
pub mod listen;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Subscribe to a publisher and print received records.
    Listen(ListenArgs),
    /// Decode a captured byte stream from a file.
    Decode(DecodeArgs),
    /// Show field offsets and width of a fixed record layout.
    Layout(LayoutArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Layout(args) => layout::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Record shape flags shared by `listen` and `decode`.
#[derive(Args, Debug, Default)]
pub struct ShapeArgs {
    /// Fixed record layout as `name:type,...`. Omit for object frames.
    #[arg(long, value_name = "SPEC", env = "STREAMSUB_LAYOUT")]
    pub layout: Option<String>,
    /// Place layout fields without padding.
    #[arg(long, requires = "layout")]
    pub packed: bool,
    /// Fail unless the layout is exactly this many bytes wide.
    #[arg(long, value_name = "BYTES", requires = "layout")]
    pub width: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Publisher address (`host:port` or `tcp://host:port`).
    #[arg(env = "STREAMSUB_ENDPOINT")]
    pub endpoint: Option<String>,
    /// Stream settings file (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub shape: ShapeArgs,
    /// Listener name used in log lines.
    #[arg(long)]
    pub name: Option<String>,
    /// Delivery queue capacity.
    #[arg(long)]
    pub capacity: Option<usize>,
    /// Reconnect after errors instead of exiting.
    #[arg(long)]
    pub retry: bool,
    /// Evict the oldest queued record when the queue is full.
    #[arg(long)]
    pub drop_oldest: bool,
    /// Poll timeout for each read (e.g. 1s, 250ms).
    #[arg(long)]
    pub poll_timeout: Option<String>,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Captured stream bytes.
    pub file: PathBuf,
    #[command(flatten)]
    pub shape: ShapeArgs,
    /// Feed the file to the reassembler in chunks of this size.
    #[arg(long, default_value = "4096")]
    pub chunk_size: usize,
    /// Largest object frame accepted.
    #[arg(long)]
    pub max_frame_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LayoutArgs {
    /// Layout as `name:type,...`.
    pub spec: String,
    /// Place fields without padding.
    #[arg(long)]
    pub packed: bool,
    /// Fail unless the layout is exactly this many bytes wide.
    #[arg(long, value_name = "BYTES")]
    pub width: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn parse_duration_rejects_bad_input() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0ms").is_err());
        assert!(parse_duration("soon").is_err());
    }
}
