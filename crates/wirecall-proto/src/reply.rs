use std::io::{Read, Write};

use tracing::debug;
use wirecall_codec::{CodecError, Decoder, Encoder, Result};
use wirecall_value::{Fault, Value};

/// A decoded (or to-be-encoded) reply.
///
/// A fault is a well-formed outcome of a call, distinct from a protocol
/// error: the stream stays healthy and the fault lands in `result`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub version: (u8, u8),
    pub result: std::result::Result<Value, Fault>,
}

impl Reply {
    pub fn ok(value: Value) -> Self {
        Self {
            version: wirecall_codec::PROTOCOL_VERSION,
            result: Ok(value),
        }
    }

    pub fn fault(fault: Fault) -> Self {
        Self {
            version: wirecall_codec::PROTOCOL_VERSION,
            result: Err(fault),
        }
    }
}

/// Encode a successful reply and flush it.
pub fn write_reply<W: Write>(encoder: &mut Encoder<W>, value: &Value) -> Result<()> {
    encoder.write_reply_begin()?;
    encoder.write_object(value)?;
    encoder.complete_reply()?;
    encoder.flush()
}

/// Encode a fault reply and flush it. The fault body supplies the reply's
/// terminal marker.
pub fn write_fault_reply<W: Write>(encoder: &mut Encoder<W>, fault: &Fault) -> Result<()> {
    debug!(code = %fault.code, "writing fault reply");
    encoder.write_reply_begin()?;
    encoder.write_fault(fault)?;
    encoder.flush()
}

/// Decode a full reply message. A fault body becomes `result: Err(fault)`;
/// only malformed data or I/O failures surface as `Err`.
pub fn read_reply<R: Read>(decoder: &mut Decoder<R>) -> Result<Reply> {
    match decoder.read_reply(None) {
        Ok(value) => Ok(Reply {
            version: wirecall_codec::PROTOCOL_VERSION,
            result: Ok(value),
        }),
        Err(CodecError::Fault(fault)) => Ok(Reply {
            version: wirecall_codec::PROTOCOL_VERSION,
            result: Err(fault),
        }),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn success_reply_round_trips() {
        let mut enc = Encoder::new(Vec::new());
        write_reply(&mut enc, &Value::from("done")).unwrap();

        let mut dec = Decoder::new(Cursor::new(enc.into_inner().unwrap()));
        let reply = read_reply(&mut dec).unwrap();
        assert_eq!(reply.result, Ok(Value::from("done")));
    }

    #[test]
    fn fault_reply_is_a_result_not_an_error() {
        let fault = Fault::new("NoSuchMethod", "no method 'frobnicate'");
        let mut enc = Encoder::new(Vec::new());
        write_fault_reply(&mut enc, &fault).unwrap();

        let mut dec = Decoder::new(Cursor::new(enc.into_inner().unwrap()));
        let reply = read_reply(&mut dec).unwrap();
        assert_eq!(reply.result, Err(fault));
    }

    #[test]
    fn garbage_reply_is_a_protocol_error() {
        let mut dec = Decoder::new(Cursor::new(vec![b'Q', 0, 0]));
        assert!(matches!(
            read_reply(&mut dec),
            Err(CodecError::Protocol(_))
        ));
    }
}
