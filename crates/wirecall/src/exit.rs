use std::fmt;
use std::io;

use wirecall_codec::CodecError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// A decoded remote fault. Distinct from local failure so scripts can tell
/// "the peer said no" from "the message was broken".
pub const REMOTE_FAULT: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    match err {
        CodecError::Io(source) => io_error(context, source),
        CodecError::Fault(fault) => CliError::new(REMOTE_FAULT, format!("{context}: {fault}")),
        CodecError::Protocol(_) | CodecError::Eof | CodecError::UnsupportedKind(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}
