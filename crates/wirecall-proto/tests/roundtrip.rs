//! End-to-end message round trips through a byte buffer.

use std::io::Cursor;
use std::sync::Arc;

use wirecall_codec::{CodecError, Decoder, Encoder};
use wirecall_proto::{read_call, read_reply, write_call, write_fault_reply, write_reply, Call};
use wirecall_registry::{CustomType, RegistryError, TypeRegistry};
use wirecall_value::{ArrayData, Fault, Map, Value};

fn roundtrip(value: &Value) -> Value {
    let mut enc = Encoder::new(Vec::new());
    enc.write_object(value).unwrap();
    let bytes = enc.into_inner().unwrap();

    let mut dec = Decoder::new(Cursor::new(bytes));
    dec.read_object().unwrap()
}

#[test]
fn scalars_round_trip() {
    for value in [
        Value::Null,
        Value::Bool(true),
        Value::Int(i32::MIN),
        Value::Long(i64::MAX),
        Value::Double(-0.25),
        Value::Date(1_724_544_000_000),
        Value::from("héllo wörld"),
        Value::Bytes(vec![0, 1, 2, 255]),
    ] {
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn nested_composites_round_trip() {
    let value = Value::map(vec![
        (Value::from("items"), Value::list(vec![Value::Int(1), Value::Null])),
        (
            Value::from("tags"),
            Value::array(ArrayData::String(vec!["a".into(), "b".into()])),
        ),
    ]);

    assert_eq!(roundtrip(&value), value);
}

#[test]
fn shared_subgraph_keeps_identity_and_encodes_once() {
    let shared = Value::list(vec![Value::from("payload")]);
    let outer = Value::list(vec![shared.clone(), shared.clone(), shared]);

    let mut enc = Encoder::new(Vec::new());
    enc.write_object(&outer).unwrap();
    let bytes = enc.into_inner().unwrap();

    // One list body for the shared child, two backreferences.
    let payloads = bytes.windows(7).filter(|w| *w == b"payload").count();
    assert_eq!(payloads, 1);
    assert_eq!(bytes.iter().filter(|b| **b == b'R').count(), 2);

    let mut dec = Decoder::new(Cursor::new(bytes));
    let decoded = dec.read_object().unwrap();
    let Value::List(rc) = &decoded else {
        panic!("expected list");
    };
    let items = &rc.borrow().items;
    assert!(items[0].same_identity(&items[1]));
    assert!(items[1].same_identity(&items[2]));
}

#[test]
fn cyclic_graph_round_trips() {
    let list = Value::list(vec![Value::from("head")]);
    if let Value::List(rc) = &list {
        let cycle = list.clone();
        rc.borrow_mut().items.push(cycle);
    }

    let decoded = roundtrip(&list);
    let Value::List(rc) = &decoded else {
        panic!("expected list");
    };
    let inner = rc.borrow();
    assert_eq!(inner.items[0], Value::from("head"));
    assert!(decoded.same_identity(&inner.items[1]));
}

#[test]
fn multi_chunk_string_round_trips() {
    let text = "чанк".repeat(20_000); // far past one chunk of UTF-16 units
    let value = Value::from(text.clone());

    let mut enc = Encoder::new(Vec::new());
    enc.write_object(&value).unwrap();
    let bytes = enc.into_inner().unwrap();
    assert!(bytes.iter().any(|b| *b == b's'));

    let mut dec = Decoder::new(Cursor::new(bytes));
    assert_eq!(dec.read_object().unwrap(), Value::from(text));
}

#[test]
fn multi_chunk_bytes_round_trip() {
    let payload: Vec<u8> = (0..100_000u32).map(|n| n as u8).collect();
    assert_eq!(roundtrip(&Value::Bytes(payload.clone())), Value::Bytes(payload));
}

#[test]
fn both_array_forms_decode_to_the_same_value() {
    let short = Value::array(ArrayData::Int(vec![1, 2, 3, 4, 5]));
    let long = Value::array(ArrayData::Int((0..40).collect()));

    let mut enc = Encoder::new(Vec::new());
    enc.write_object(&short).unwrap();
    let short_bytes = enc.into_inner().unwrap();
    assert_eq!(short_bytes[0], 0x15); // compact form, length 5

    let mut enc = Encoder::new(Vec::new());
    enc.write_object(&long).unwrap();
    let long_bytes = enc.into_inner().unwrap();
    assert_eq!(long_bytes[0], b'V');

    assert_eq!(roundtrip(&short), short);
    assert_eq!(roundtrip(&long), long);
}

#[test]
fn missing_terminal_marker_is_a_protocol_error() {
    let mut enc = Encoder::new(Vec::new());
    enc.write_object(&Value::list(vec![Value::Int(1)])).unwrap();
    let mut bytes = enc.into_inner().unwrap();
    assert_eq!(bytes.pop(), Some(b'z'));

    let mut dec = Decoder::new(Cursor::new(bytes));
    assert!(matches!(dec.read_object(), Err(CodecError::Protocol(_))));
}

#[test]
fn call_round_trips_end_to_end() {
    let call = Call::new("echo", vec![Value::from("hi")]);

    let mut enc = Encoder::new(Vec::new());
    write_call(&mut enc, &call).unwrap();

    let mut dec = Decoder::new(Cursor::new(enc.into_inner().unwrap()));
    let decoded = read_call(&mut dec).unwrap();
    assert_eq!(decoded.version, (1, 0));
    assert!(decoded.headers.is_empty());
    assert_eq!(decoded.method, "echo");
    assert_eq!(decoded.args, vec![Value::from("hi")]);
}

#[test]
fn reply_and_fault_round_trip() {
    let mut enc = Encoder::new(Vec::new());
    write_reply(&mut enc, &Value::Int(41)).unwrap();
    let mut dec = Decoder::new(Cursor::new(enc.into_inner().unwrap()));
    assert_eq!(read_reply(&mut dec).unwrap().result, Ok(Value::Int(41)));

    let fault = Fault::new("NoMethod", "missing");
    let mut enc = Encoder::new(Vec::new());
    write_fault_reply(&mut enc, &fault).unwrap();
    let mut dec = Decoder::new(Cursor::new(enc.into_inner().unwrap()));
    assert_eq!(read_reply(&mut dec).unwrap().result, Err(fault));
}

#[test]
fn persistent_connection_resets_references_between_messages() {
    let shared = Value::list(vec![Value::Int(1)]);

    let mut enc = Encoder::new(Vec::new());
    write_call(&mut enc, &Call::new("first", vec![shared.clone()])).unwrap();
    enc.reset_references();
    write_call(&mut enc, &Call::new("second", vec![shared])).unwrap();
    let bytes = enc.into_inner().unwrap();

    let mut dec = Decoder::new(Cursor::new(bytes));
    let first = read_call(&mut dec).unwrap();
    dec.reset_references();
    let second = read_call(&mut dec).unwrap();

    assert_eq!(first.args, second.args);
    assert!(!first.args[0].same_identity(&second.args[0]));
}

struct Point;

impl CustomType for Point {
    fn type_name(&self) -> &str {
        "geo.Point"
    }

    fn revive(&self, map: Map) -> Result<Value, RegistryError> {
        match (map.get_str("x").cloned(), map.get_str("y").cloned()) {
            (Some(x), Some(y)) => Ok(Value::typed_map(
                "geo.Point",
                vec![(Value::from("x"), x), (Value::from("y"), y)],
            )),
            _ => Err(RegistryError::ReviveFailed {
                type_name: "geo.Point".to_string(),
                message: "missing coordinate".to_string(),
            }),
        }
    }

    fn lower(&self, value: &Value) -> Option<Map> {
        match value {
            Value::Map(m) if m.borrow().type_name.as_deref() == Some("geo.Point") => {
                Some(m.borrow().clone())
            }
            _ => None,
        }
    }
}

#[test]
fn custom_typed_map_revives_through_the_registry() {
    let registry = Arc::new(
        TypeRegistry::builder()
            .register(Arc::new(Point))
            .unwrap()
            .build(),
    );

    let point = Value::typed_map(
        "geo.Point",
        vec![
            (Value::from("x"), Value::Double(1.5)),
            (Value::from("y"), Value::Double(-2.0)),
        ],
    );

    let mut enc = Encoder::with_registry(Vec::new(), Arc::clone(&registry));
    enc.write_object(&point).unwrap();

    let mut dec = Decoder::with_registry(Cursor::new(enc.into_inner().unwrap()), registry);
    let decoded = dec.read_object().unwrap();
    assert_eq!(decoded, point);
}
