use wirecall_codec::Encoder;
use wirecall_proto::{write_fault_reply, write_reply};
use wirecall_value::Fault;

use crate::cmd::call::emit;
use crate::cmd::ReplyArgs;
use crate::exit::{codec_error, CliError, CliResult, SUCCESS, USAGE};
use crate::json::from_json;

pub fn run(args: ReplyArgs) -> CliResult<i32> {
    let mut encoder = Encoder::new(Vec::new());

    match (&args.value, &args.fault) {
        (Some(text), None) => {
            let json = serde_json::from_str(text)
                .map_err(|e| CliError::new(USAGE, format!("invalid JSON value: {e}")))?;
            write_reply(&mut encoder, &from_json(&json))
                .map_err(|e| codec_error("reply", e))?;
        }
        (None, Some(code)) => {
            // clap enforces --message alongside --fault.
            let message = args.message.as_deref().unwrap_or_default();
            write_fault_reply(&mut encoder, &Fault::new(code, message))
                .map_err(|e| codec_error("reply", e))?;
        }
        _ => {
            return Err(CliError::new(
                USAGE,
                "reply needs exactly one of --value or --fault",
            ))
        }
    }

    let bytes = encoder.into_inner().map_err(|e| codec_error("reply", e))?;
    emit(&bytes, args.output.as_deref())?;
    Ok(SUCCESS)
}
