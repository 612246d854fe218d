use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;
use wirecall_codec::Decoder;
use wirecall_proto::{read_call, read_reply, Call, Reply};
use wirecall_registry::{RegistryConfig, TypeRegistry};

use crate::cmd::{InspectArgs, MessageKind};
use crate::exit::{codec_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::json::to_json;
use crate::output::{print_value, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = read_input(&args.input)?;
    if bytes.is_empty() {
        return Err(CliError::new(DATA_INVALID, "inspect: empty input"));
    }

    let registry = Arc::new(
        TypeRegistry::builder()
            .with_config(RegistryConfig {
                strict_types: args.strict_types,
            })
            .build(),
    );

    // A file may hold several messages back to back; each gets a fresh
    // reference table, as on a persistent connection.
    let len = bytes.len() as u64;
    let mut cursor = Cursor::new(bytes);
    while cursor.position() < len {
        let first = first_byte(&cursor);
        let kind = match args.kind {
            MessageKind::Auto => sniff(first),
            other => other,
        };
        debug!(offset = cursor.position(), ?kind, "inspecting message");

        let mut decoder = Decoder::with_registry(cursor, Arc::clone(&registry));
        match kind {
            MessageKind::Call => {
                let call = read_call(&mut decoder).map_err(|e| codec_error("inspect", e))?;
                print_call(&call, format);
            }
            MessageKind::Reply => {
                let reply = read_reply(&mut decoder).map_err(|e| codec_error("inspect", e))?;
                print_reply(&reply, format);
            }
            MessageKind::Value | MessageKind::Auto => {
                let value = decoder
                    .read_object()
                    .map_err(|e| codec_error("inspect", e))?;
                print_value(&value, format);
            }
        }
        cursor = decoder.into_inner();
    }

    Ok(SUCCESS)
}

fn print_call(call: &Call, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let headers: Vec<_> = call
                .headers
                .iter()
                .map(|(k, v)| json!([k, to_json(v)]))
                .collect();
            let args: Vec<_> = call.args.iter().map(to_json).collect();
            let out = json!({
                "kind": "call",
                "version": format!("{}.{}", call.version.0, call.version.1),
                "headers": headers,
                "method": call.method,
                "args": args,
            });
            println!("{out}");
        }
        _ => {
            println!(
                "call {}.{} method={}",
                call.version.0, call.version.1, call.method
            );
            for (key, value) in &call.headers {
                println!("header {key} = {value}");
            }
            for arg in &call.args {
                print_value(arg, format);
            }
        }
    }
}

fn print_reply(reply: &Reply, format: OutputFormat) {
    match &reply.result {
        Ok(value) => match format {
            OutputFormat::Json => {
                println!("{}", json!({ "kind": "reply", "value": to_json(value) }));
            }
            _ => print_value(value, format),
        },
        Err(fault) => match format {
            OutputFormat::Json => {
                let detail = fault.detail.as_ref().map(to_json);
                println!(
                    "{}",
                    json!({
                        "kind": "fault",
                        "code": fault.code,
                        "message": fault.message,
                        "detail": detail,
                    })
                );
            }
            _ => println!("fault {fault}"),
        },
    }
}

fn first_byte(cursor: &Cursor<Vec<u8>>) -> u8 {
    cursor.get_ref()[cursor.position() as usize]
}

fn sniff(first: u8) -> MessageKind {
    match first {
        b'c' => MessageKind::Call,
        b'r' => MessageKind::Reply,
        _ => MessageKind::Value,
    }
}

fn read_input(path: &Path) -> CliResult<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .map_err(|e| io_error("inspect: reading stdin", e))?;
        return Ok(bytes);
    }
    std::fs::read(path).map_err(|e| io_error("inspect: reading input", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirecall_codec::Encoder;
    use wirecall_proto::write_call;
    use wirecall_value::Value;

    #[test]
    fn sniff_recognizes_envelopes() {
        assert!(matches!(sniff(b'c'), MessageKind::Call));
        assert!(matches!(sniff(b'r'), MessageKind::Reply));
        assert!(matches!(sniff(b'M'), MessageKind::Value));
        assert!(matches!(sniff(0x13), MessageKind::Value));
    }

    #[test]
    fn back_to_back_messages_decode_separately() {
        let mut enc = Encoder::new(Vec::new());
        write_call(&mut enc, &Call::new("a", vec![Value::Int(1)])).unwrap();
        enc.reset_references();
        write_call(&mut enc, &Call::new("b", vec![])).unwrap();
        let bytes = enc.into_inner().unwrap();

        let len = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes);
        let mut methods = Vec::new();
        while cursor.position() < len {
            let mut dec = Decoder::new(cursor);
            methods.push(read_call(&mut dec).unwrap().method);
            cursor = dec.into_inner();
        }
        assert_eq!(methods, vec!["a", "b"]);
    }
}
