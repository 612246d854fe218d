mod cmd;
mod exit;
mod json;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wirecall", version, about = "wirecall message codec CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
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
    fn parses_inspect_subcommand() {
        let cli = Cli::try_parse_from(["wirecall", "inspect", "msg.bin", "--kind", "call"])
            .expect("inspect args should parse");
        assert!(matches!(cli.command, Command::Inspect(_)));
    }

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "wirecall",
            "call",
            "echo",
            "--arg",
            "\"hi\"",
            "--header",
            "auth=\"token\"",
            "-o",
            "out.bin",
        ])
        .expect("call args should parse");
        assert!(matches!(cli.command, Command::Call(_)));
    }

    #[test]
    fn reply_rejects_value_and_fault_together() {
        let err = Cli::try_parse_from([
            "wirecall",
            "reply",
            "--value",
            "1",
            "--fault",
            "NoMethod",
            "--message",
            "missing",
        ])
        .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn fault_requires_message() {
        let err = Cli::try_parse_from(["wirecall", "reply", "--fault", "NoMethod"])
            .expect_err("fault without message should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}
