use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod envinfo;
pub mod inspect;
pub mod reply;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a message file and print its contents.
    Inspect(InspectArgs),
    /// Encode a call message.
    Call(CallArgs),
    /// Encode a reply or fault message.
    Reply(ReplyArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Inspect(args) => inspect::run(args, format),
        Command::Call(args) => call::run(args),
        Command::Reply(args) => reply::run(args),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum MessageKind {
    /// Decide from the first byte of the input.
    #[default]
    Auto,
    Call,
    Reply,
    Value,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Message file to decode, or `-` for stdin.
    pub input: PathBuf,
    /// What the input contains.
    #[arg(long, value_name = "KIND", default_value = "auto")]
    pub kind: MessageKind,
    /// Treat unknown wire type names as errors.
    #[arg(long)]
    pub strict_types: bool,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Method name.
    pub method: String,
    /// Argument as JSON (repeatable, in order).
    #[arg(long = "arg", value_name = "JSON")]
    pub args: Vec<String>,
    /// Header as KEY=JSON (repeatable).
    #[arg(long = "header", value_name = "KEY=JSON")]
    pub headers: Vec<String>,
    /// Write the message here instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReplyArgs {
    /// Result value as JSON.
    #[arg(long, value_name = "JSON", conflicts_with = "fault")]
    pub value: Option<String>,
    /// Fault code; produces a fault reply.
    #[arg(long, value_name = "CODE", requires = "message")]
    pub fault: Option<String>,
    /// Fault message.
    #[arg(long, value_name = "TEXT", requires = "fault")]
    pub message: Option<String>,
    /// Write the message here instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}
