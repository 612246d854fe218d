use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::kind::TypeKind;

/// Shared handle to a list under construction or fully decoded.
pub type ListRef = Rc<RefCell<List>>;
/// Shared handle to a map.
pub type MapRef = Rc<RefCell<Map>>;
/// Shared handle to a typed array.
pub type ArrayRef = Rc<RefCell<ArrayData>>;

/// An open-ended list with an optional wire type name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct List {
    pub type_name: Option<String>,
    pub items: Vec<Value>,
}

/// An ordered map with an optional wire type name.
///
/// Entries stay in wire order and keys may be any value; fault bodies and
/// most application maps use string keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Map {
    pub type_name: Option<String>,
    pub entries: Vec<(Value, Value)>,
}

impl Map {
    /// Look up the value for a string key.
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find_map(|(k, v)| match k {
            Value::String(s) if s == key => Some(v),
            _ => None,
        })
    }
}

/// Fixed-element-type array payloads.
///
/// These are the kinds eligible for the compact fixed-length wire form;
/// `Object` arrays always use the streaming form.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Double(Vec<f64>),
    String(Vec<String>),
    Object(Vec<Value>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::Long(v) => v.len(),
            ArrayData::Double(v) => v.len(),
            ArrayData::String(v) => v.len(),
            ArrayData::Object(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registry kind of this array.
    pub fn kind(&self) -> TypeKind {
        match self {
            ArrayData::Bool(_) => TypeKind::BoolArray,
            ArrayData::Int(_) => TypeKind::IntArray,
            ArrayData::Long(_) => TypeKind::LongArray,
            ArrayData::Double(_) => TypeKind::DoubleArray,
            ArrayData::String(_) => TypeKind::StringArray,
            ArrayData::Object(_) => TypeKind::ObjectArray,
        }
    }
}

/// An unresolved reference to an object living on a remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub type_name: String,
    pub url: String,
}

/// A single wire value. Exactly one variant is active at a time.
///
/// Composite variants (`List`, `Map`, `Array`) are shared handles: cloning a
/// `Value` clones the handle, not the contents, so decoded graphs preserve
/// sharing and may legally contain cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    /// A single character. Travels as a length-1 string on the wire; only
    /// produced by typed reads expecting a char.
    Char(char),
    /// Millisecond UTC epoch timestamp.
    Date(i64),
    String(String),
    Bytes(Vec<u8>),
    List(ListRef),
    Map(MapRef),
    Array(ArrayRef),
    Remote(Remote),
}

impl Value {
    /// Build a list value from plain items (no type name).
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(List {
            type_name: None,
            items,
        })))
    }

    /// Build a typed list value.
    pub fn typed_list(type_name: impl Into<String>, items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(List {
            type_name: Some(type_name.into()),
            items,
        })))
    }

    /// Build a map value from entries (no type name).
    pub fn map(entries: Vec<(Value, Value)>) -> Value {
        Value::Map(Rc::new(RefCell::new(Map {
            type_name: None,
            entries,
        })))
    }

    /// Build a typed map value.
    pub fn typed_map(type_name: impl Into<String>, entries: Vec<(Value, Value)>) -> Value {
        Value::Map(Rc::new(RefCell::new(Map {
            type_name: Some(type_name.into()),
            entries,
        })))
    }

    /// Build an array value from typed payload data.
    pub fn array(data: ArrayData) -> Value {
        Value::Array(Rc::new(RefCell::new(data)))
    }

    /// Build a string value.
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    /// The registry kind of this value.
    pub fn type_kind(&self) -> TypeKind {
        match self {
            Value::Null => TypeKind::Null,
            Value::Bool(_) => TypeKind::Bool,
            Value::Int(_) => TypeKind::Int,
            Value::Long(_) => TypeKind::Long,
            Value::Double(_) => TypeKind::Double,
            Value::Char(_) => TypeKind::Char,
            Value::Date(_) => TypeKind::Date,
            Value::String(_) => TypeKind::String,
            Value::Bytes(_) => TypeKind::Bytes,
            Value::List(_) => TypeKind::List,
            Value::Map(_) => TypeKind::Map,
            Value::Array(a) => a.borrow().kind(),
            Value::Remote(_) => TypeKind::Object,
        }
    }

    /// True for variants that participate in the reference table.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_) | Value::Array(_))
    }

    /// Stable identity of a composite handle, for encoder-side deduplication.
    ///
    /// Two values answer the same id iff they are the *same* shared handle;
    /// equal-but-distinct composites get distinct ids.
    pub fn composite_id(&self) -> Option<usize> {
        match self {
            Value::List(rc) => Some(Rc::as_ptr(rc) as usize),
            Value::Map(rc) => Some(Rc::as_ptr(rc) as usize),
            Value::Array(rc) => Some(Rc::as_ptr(rc) as usize),
            _ => None,
        }
    }

    /// True if `other` is the identical shared handle (not merely equal).
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self.composite_id(), other.composite_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Long(n) => write!(f, "{n}L"),
            Value::Double(n) => write!(f, "{n}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Date(ms) => write!(f, "date({ms})"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Value::List(l) => write!(f, "list[{}]", l.borrow().items.len()),
            Value::Map(m) => write!(f, "map[{}]", m.borrow().entries.len()),
            Value::Array(a) => write!(f, "array[{}]", a.borrow().len()),
            Value::Remote(r) => write!(f, "remote({}, {})", r.type_name, r.url),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
