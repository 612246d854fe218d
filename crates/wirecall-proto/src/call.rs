use std::io::{Read, Write};

use tracing::debug;
use wirecall_codec::{Decoder, Encoder, Result};
use wirecall_value::Value;

/// A decoded (or to-be-encoded) method call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Protocol version from the call prefix.
    pub version: (u8, u8),
    /// Transport headers in wire order. Keys may repeat.
    pub headers: Vec<(String, Value)>,
    pub method: String,
    pub args: Vec<Value>,
}

impl Call {
    /// A call with no headers at the current protocol version.
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            version: wirecall_codec::PROTOCOL_VERSION,
            headers: Vec::new(),
            method: method.into(),
            args,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: Value) -> Self {
        self.headers.push((key.into(), value));
        self
    }
}

/// Encode a full call message and flush it.
pub fn write_call<W: Write>(encoder: &mut Encoder<W>, call: &Call) -> Result<()> {
    debug!(method = %call.method, args = call.args.len(), "writing call");
    encoder.write_call_begin()?;
    for (key, value) in &call.headers {
        encoder.write_header(key)?;
        encoder.write_object(value)?;
    }
    encoder.write_method(&call.method)?;
    for arg in &call.args {
        encoder.write_object(arg)?;
    }
    encoder.complete_call()?;
    encoder.flush()
}

/// Decode a full call message, arguments through the terminal marker.
pub fn read_call<R: Read>(decoder: &mut Decoder<R>) -> Result<Call> {
    let version = decoder.read_call()?;

    let mut headers = Vec::new();
    while let Some(key) = decoder.read_header()? {
        let value = decoder.read_object()?;
        headers.push((key, value));
    }

    let method = decoder.read_method()?;
    debug!(method = %method, "reading call");

    let mut args = Vec::new();
    while !decoder.is_end()? {
        args.push(decoder.read_object()?);
    }
    decoder.complete_call()?;

    Ok(Call {
        version,
        headers,
        method,
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn call_round_trips_with_headers() {
        let call = Call::new("transfer", vec![Value::Int(100), Value::from("acct-7")])
            .with_header("auth", Value::from("token"));

        let mut enc = Encoder::new(Vec::new());
        write_call(&mut enc, &call).unwrap();
        let bytes = enc.into_inner().unwrap();

        let mut dec = Decoder::new(Cursor::new(bytes));
        let decoded = read_call(&mut dec).unwrap();

        assert_eq!(decoded, call);
        assert_eq!(decoded.version, (1, 0));
    }

    #[test]
    fn zero_argument_call() {
        let call = Call::new("ping", vec![]);

        let mut enc = Encoder::new(Vec::new());
        write_call(&mut enc, &call).unwrap();

        let mut dec = Decoder::new(Cursor::new(enc.into_inner().unwrap()));
        let decoded = read_call(&mut dec).unwrap();
        assert_eq!(decoded.method, "ping");
        assert!(decoded.args.is_empty());
    }
}
