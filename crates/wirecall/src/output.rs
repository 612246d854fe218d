use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use wirecall_value::Value;

use crate::json::to_json;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&to_json(value)).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "VALUE"]);
            add_value_rows(&mut table, value);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{} {}", value.type_kind().wire_name(), value);
        }
        OutputFormat::Raw => match value {
            Value::Bytes(b) => print_raw(b),
            Value::String(s) => print_raw(s.as_bytes()),
            other => println!("{other}"),
        },
    }
}

fn add_value_rows(table: &mut Table, value: &Value) {
    match value {
        Value::List(rc) => {
            for item in &rc.borrow().items {
                table.add_row(vec![
                    item.type_kind().wire_name().to_string(),
                    item.to_string(),
                ]);
            }
        }
        Value::Map(rc) => {
            table.set_header(vec!["KEY", "VALUE"]);
            for (k, v) in &rc.borrow().entries {
                table.add_row(vec![k.to_string(), v.to_string()]);
            }
        }
        other => {
            table.add_row(vec![
                other.type_kind().wire_name().to_string(),
                other.to_string(),
            ]);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}
