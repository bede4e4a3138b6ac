mod cmd;
mod config;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "streamsub", version, about = "Broadcast stream subscriber CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "STREAMSUB_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listen_with_layout() {
        let cli = Cli::try_parse_from([
            "streamsub",
            "listen",
            "tcp://127.0.0.1:40020",
            "--layout",
            "timestamp:i64,streamNum:u32,value:f32",
            "--retry",
            "--drop-oldest",
            "--count",
            "10",
        ])
        .expect("listen args should parse");

        let Command::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert!(args.retry);
        assert!(args.drop_oldest);
        assert_eq!(args.count, Some(10));
    }

    #[test]
    fn packed_requires_layout() {
        let err = Cli::try_parse_from(["streamsub", "decode", "capture.bin", "--packed"])
            .expect_err("--packed alone should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_layout_subcommand() {
        let cli = Cli::try_parse_from(["streamsub", "--format", "json", "layout", "a:u8,b:f64"])
            .expect("layout args should parse");
        assert!(matches!(cli.command, Command::Layout(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
