//! Lossy JSON projection of wire values for CLI input and output.
//!
//! JSON has no aliasing, so shared composites render as `{"$ref": n}` after
//! their first occurrence; that also keeps cyclic graphs finite. Kinds JSON
//! cannot carry natively use `$`-keyed wrappers.

use std::collections::HashMap;

use serde_json::{json, Number};
use wirecall_value::{ArrayData, Value};

/// Render a value graph as JSON.
pub fn to_json(value: &Value) -> serde_json::Value {
    let mut seen = HashMap::new();
    render(value, &mut seen)
}

fn render(value: &Value, seen: &mut HashMap<usize, usize>) -> serde_json::Value {
    if let Some(id) = value.composite_id() {
        let next = seen.len();
        if let Some(&index) = seen.get(&id) {
            return json!({ "$ref": index });
        }
        seen.insert(id, next);
    }

    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(n) => json!(n),
        Value::Long(n) => json!(n),
        Value::Double(n) => match Number::from_f64(*n) {
            Some(num) => serde_json::Value::Number(num),
            None => json!(n.to_string()),
        },
        Value::Char(c) => json!(c.to_string()),
        Value::Date(ms) => json!({ "$date": ms }),
        Value::String(s) => json!(s),
        Value::Bytes(b) => json!({ "$bytes": hex(b) }),
        Value::Remote(r) => json!({ "$remote": { "type": r.type_name, "url": r.url } }),
        Value::List(rc) => {
            let list = rc.borrow();
            let items: Vec<_> = list.items.iter().map(|v| render(v, seen)).collect();
            match &list.type_name {
                Some(name) => json!({ "$type": name, "items": items }),
                None => serde_json::Value::Array(items),
            }
        }
        Value::Map(rc) => {
            let map = rc.borrow();
            let all_string_keys = map
                .entries
                .iter()
                .all(|(k, _)| matches!(k, Value::String(_)));
            if all_string_keys {
                let mut obj = serde_json::Map::new();
                if let Some(name) = &map.type_name {
                    obj.insert("$type".to_string(), json!(name));
                }
                for (k, v) in &map.entries {
                    if let Value::String(key) = k {
                        obj.insert(key.clone(), render(v, seen));
                    }
                }
                serde_json::Value::Object(obj)
            } else {
                let entries: Vec<_> = map
                    .entries
                    .iter()
                    .map(|(k, v)| json!([render(k, seen), render(v, seen)]))
                    .collect();
                json!({ "$entries": entries })
            }
        }
        Value::Array(rc) => match &*rc.borrow() {
            ArrayData::Bool(items) => json!(items),
            ArrayData::Int(items) => json!(items),
            ArrayData::Long(items) => json!(items),
            ArrayData::Double(items) => json!(items),
            ArrayData::String(items) => json!(items),
            ArrayData::Object(items) => {
                serde_json::Value::Array(items.iter().map(|v| render(v, seen)).collect())
            }
        },
    }
}

/// Build a wire value from JSON input.
///
/// Integers in `i32` range become ints, larger ones longs; objects become
/// maps with a `$type` key lifted into the type name.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(num) => {
            if let Some(n) = num.as_i64() {
                if let Ok(small) = i32::try_from(n) {
                    Value::Int(small)
                } else {
                    Value::Long(n)
                }
            } else {
                Value::Double(num.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            Value::list(items.iter().map(from_json).collect())
        }
        serde_json::Value::Object(obj) => {
            if obj.len() == 1 {
                if let Some(ms) = obj.get("$date").and_then(|v| v.as_i64()) {
                    return Value::Date(ms);
                }
                if let Some(hex_str) = obj.get("$bytes").and_then(|v| v.as_str()) {
                    if let Some(bytes) = unhex(hex_str) {
                        return Value::Bytes(bytes);
                    }
                }
            }

            let type_name = obj.get("$type").and_then(|v| v.as_str()).map(String::from);
            let entries: Vec<(Value, Value)> = obj
                .iter()
                .filter(|(k, _)| k.as_str() != "$type")
                .map(|(k, v)| (Value::from(k.as_str()), from_json(v)))
                .collect();
            match type_name {
                Some(name) => Value::typed_map(name, entries),
                None => Value::map(entries),
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn unhex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_project_directly() {
        assert_eq!(to_json(&Value::Null), serde_json::Value::Null);
        assert_eq!(to_json(&Value::Int(5)), json!(5));
        assert_eq!(to_json(&Value::from("hi")), json!("hi"));
        assert_eq!(to_json(&Value::Date(1000)), json!({ "$date": 1000 }));
    }

    #[test]
    fn bytes_project_as_hex() {
        assert_eq!(
            to_json(&Value::Bytes(vec![0x0a, 0xff])),
            json!({ "$bytes": "0aff" })
        );
        assert_eq!(
            from_json(&json!({ "$bytes": "0aff" })),
            Value::Bytes(vec![0x0a, 0xff])
        );
    }

    #[test]
    fn shared_composite_projects_as_ref() {
        let shared = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![shared.clone(), shared]);

        let json = to_json(&outer);
        assert_eq!(json[0], json!([1]));
        assert_eq!(json[1], json!({ "$ref": 1 }));
    }

    #[test]
    fn cycle_stays_finite() {
        let list = Value::list(vec![]);
        if let Value::List(rc) = &list {
            rc.borrow_mut().items.push(list.clone());
        }

        assert_eq!(to_json(&list), json!([{ "$ref": 0 }]));
    }

    #[test]
    fn json_object_becomes_map() {
        let value = from_json(&json!({ "$type": "geo.Point", "x": 1, "y": 2.5 }));
        let Value::Map(rc) = &value else {
            panic!("expected map");
        };
        let map = rc.borrow();
        assert_eq!(map.type_name.as_deref(), Some("geo.Point"));
        assert_eq!(map.get_str("x"), Some(&Value::Int(1)));
        assert_eq!(map.get_str("y"), Some(&Value::Double(2.5)));
    }

    #[test]
    fn large_integers_become_longs() {
        assert_eq!(from_json(&json!(5)), Value::Int(5));
        assert_eq!(
            from_json(&json!(5_000_000_000i64)),
            Value::Long(5_000_000_000)
        );
    }
}
