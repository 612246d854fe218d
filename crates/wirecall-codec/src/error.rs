use wirecall_registry::RegistryError;
use wirecall_value::Fault;

/// Errors surfaced by the streaming codec.
///
/// The codec performs no local recovery: any of these is fatal for the
/// current stream, and the caller must rebuild decoder/encoder state on a
/// fresh connection rather than resynchronize mid-stream.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Malformed wire data: unexpected tag, bad chunk header, illegal UTF-8
    /// sequence, missing terminal marker, bad backreference. The message
    /// carries the current method name when one is known.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The byte source was exhausted mid-primitive or mid-chunk.
    #[error("unexpected end of stream")]
    Eof,

    /// The registry has no codec for a type name, or the content kind is
    /// explicitly unsupported (inline XML bodies).
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    /// A decoded remote fault, fields carried verbatim.
    #[error("remote fault: {0}")]
    Fault(#[from] Fault),

    /// An I/O error from the byte source or sink.
    #[error("codec I/O error: {0}")]
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            CodecError::Eof
        } else {
            CodecError::Io(err)
        }
    }
}

impl From<RegistryError> for CodecError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownType(name) => CodecError::UnsupportedKind(name),
            other => CodecError::Protocol(other.to_string()),
        }
    }
}
