use std::path::Path;

use wirecall_codec::Encoder;
use wirecall_proto::{write_call, Call};
use wirecall_value::Value;

use crate::cmd::CallArgs;
use crate::exit::{codec_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::json::from_json;
use crate::output::print_raw;

pub fn run(args: CallArgs) -> CliResult<i32> {
    let mut call = Call::new(&args.method, parse_args(&args.args)?);
    for header in &args.headers {
        let (key, value) = parse_header(header)?;
        call = call.with_header(key, value);
    }

    let mut encoder = Encoder::new(Vec::new());
    write_call(&mut encoder, &call).map_err(|e| codec_error("call", e))?;
    let bytes = encoder.into_inner().map_err(|e| codec_error("call", e))?;

    emit(&bytes, args.output.as_deref())?;
    Ok(SUCCESS)
}

pub(crate) fn parse_args(raw: &[String]) -> CliResult<Vec<Value>> {
    raw.iter()
        .map(|text| {
            serde_json::from_str(text)
                .map(|json| from_json(&json))
                .map_err(|e| CliError::new(USAGE, format!("invalid JSON argument {text:?}: {e}")))
        })
        .collect()
}

fn parse_header(raw: &str) -> CliResult<(String, Value)> {
    let (key, json_text) = raw
        .split_once('=')
        .ok_or_else(|| CliError::new(USAGE, format!("header {raw:?} is not KEY=JSON")))?;
    let json = serde_json::from_str(json_text)
        .map_err(|e| CliError::new(USAGE, format!("invalid JSON in header {raw:?}: {e}")))?;
    Ok((key.to_string(), from_json(&json)))
}

pub(crate) fn emit(bytes: &[u8], output: Option<&Path>) -> CliResult<()> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes).map_err(|e| io_error("writing output", e))?;
        }
        None => print_raw(bytes),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_in_order() {
        let values =
            parse_args(&["1".to_string(), "\"two\"".to_string(), "null".to_string()]).unwrap();
        assert_eq!(
            values,
            vec![Value::Int(1), Value::from("two"), Value::Null]
        );
    }

    #[test]
    fn bad_json_argument_is_a_usage_error() {
        let err = parse_args(&["{not json".to_string()]).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn header_needs_key_value_shape() {
        assert!(parse_header("auth=\"token\"").is_ok());
        assert_eq!(parse_header("auth").unwrap_err().code, USAGE);
    }
}
