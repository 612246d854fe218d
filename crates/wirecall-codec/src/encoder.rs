use std::io::Write;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tracing::debug;
use wirecall_registry::TypeRegistry;
use wirecall_value::{ArrayData, Fault, TypeKind, Value};

use crate::error::{CodecError, Result};
use crate::refs::EncodeRefs;
use crate::tags;

/// Stateful, single-pass streaming encoder.
///
/// Output accumulates in an internal buffer; call [`Encoder::flush`] at a
/// message boundary. One encoder (with its own reference table) serves one
/// message stream; call [`Encoder::reset_references`] between independent
/// messages on a persistent connection.
pub struct Encoder<W: Write> {
    sink: W,
    buf: BytesMut,
    refs: EncodeRefs,
    registry: Arc<TypeRegistry>,
}

impl<W: Write> Encoder<W> {
    /// Create an encoder over a byte sink with the built-in type registry.
    pub fn new(sink: W) -> Self {
        Self::with_registry(sink, Arc::new(TypeRegistry::builtin()))
    }

    /// Create an encoder sharing a process-wide registry.
    pub fn with_registry(sink: W, registry: Arc<TypeRegistry>) -> Self {
        Self {
            sink,
            buf: BytesMut::with_capacity(4096),
            refs: EncodeRefs::new(),
            registry,
        }
    }

    /// Clear the reference table at a message boundary.
    pub fn reset_references(&mut self) {
        self.refs.reset();
    }

    /// Number of composite handles interned so far.
    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    /// Drain the internal buffer to the sink.
    pub fn flush(&mut self) -> Result<()> {
        while !self.buf.is_empty() {
            match self.sink.write(&self.buf) {
                Ok(0) => {
                    return Err(CodecError::Io(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "sink accepted no bytes",
                    )))
                }
                Ok(n) => {
                    let _ = self.buf.split_to(n);
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
                    ) =>
                {
                    continue
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.sink.flush()?;
        Ok(())
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.sink)
    }

    // ---- call/reply framing -------------------------------------------

    /// Write the call prefix: `c major minor`.
    pub fn write_call_begin(&mut self) -> Result<()> {
        let (major, minor) = tags::PROTOCOL_VERSION;
        debug!(major, minor, "writing call");
        self.buf.put_u8(tags::CALL);
        self.buf.put_u8(major);
        self.buf.put_u8(minor);
        Ok(())
    }

    /// Write a header key: `H b16 b8 key`. The caller writes the value next.
    pub fn write_header(&mut self, key: &str) -> Result<()> {
        self.put_name(tags::HEADER, key)
    }

    /// Write the method name: `m b16 b8 name`.
    pub fn write_method(&mut self, name: &str) -> Result<()> {
        self.put_name(tags::METHOD, name)
    }

    /// Close the call with its terminal marker.
    pub fn complete_call(&mut self) -> Result<()> {
        self.buf.put_u8(tags::END);
        Ok(())
    }

    /// Write the reply prefix: `r major minor`.
    pub fn write_reply_begin(&mut self) -> Result<()> {
        let (major, minor) = tags::PROTOCOL_VERSION;
        self.buf.put_u8(tags::REPLY);
        self.buf.put_u8(major);
        self.buf.put_u8(minor);
        Ok(())
    }

    /// Close the reply with its terminal marker.
    pub fn complete_reply(&mut self) -> Result<()> {
        self.buf.put_u8(tags::END);
        Ok(())
    }

    /// Write a fault body: `f` plus code/message/detail pairs.
    ///
    /// The fault's closing `z` is also the reply's terminal marker, so the
    /// caller must not call [`Encoder::complete_reply`] after this.
    pub fn write_fault(&mut self, fault: &Fault) -> Result<()> {
        self.buf.put_u8(tags::FAULT);
        self.write_string("code")?;
        self.write_string(&fault.code)?;
        self.write_string("message")?;
        self.write_string(&fault.message)?;
        if let Some(detail) = &fault.detail {
            self.write_string("detail")?;
            self.write_object(detail)?;
        }
        self.buf.put_u8(tags::END);
        Ok(())
    }

    // ---- typed primitive writes ---------------------------------------

    pub fn write_null(&mut self) -> Result<()> {
        self.buf.put_u8(tags::NULL);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.buf
            .put_u8(if value { tags::TRUE } else { tags::FALSE });
        Ok(())
    }

    pub fn write_int(&mut self, value: i32) -> Result<()> {
        self.buf.put_u8(tags::INT);
        self.buf.put_i32(value);
        Ok(())
    }

    /// Shorts widen to the int representation on the wire.
    pub fn write_short(&mut self, value: i16) -> Result<()> {
        self.write_int(i32::from(value))
    }

    pub fn write_long(&mut self, value: i64) -> Result<()> {
        self.buf.put_u8(tags::LONG);
        self.buf.put_i64(value);
        Ok(())
    }

    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.buf.put_u8(tags::DOUBLE);
        self.buf.put_u64(value.to_bits());
        Ok(())
    }

    /// Floats widen to the double representation on the wire.
    pub fn write_float(&mut self, value: f32) -> Result<()> {
        self.write_double(f64::from(value))
    }

    /// Write a millisecond-epoch date: `d b64..b8`.
    pub fn write_date(&mut self, millis: i64) -> Result<()> {
        self.buf.put_u8(tags::DATE);
        self.buf.put_i64(millis);
        Ok(())
    }

    /// Write a string value, splitting into chunks of at most
    /// [`tags::CHUNK_LIMIT`] UTF-16 code units. Supplementary characters
    /// travel as surrogate pairs of 3-byte sequences.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let units: Vec<u16> = value.encode_utf16().collect();
        let mut rest = units.as_slice();
        while rest.len() > tags::CHUNK_LIMIT {
            let (chunk, tail) = rest.split_at(tags::CHUNK_LIMIT);
            self.put_string_chunk(tags::STRING_CHUNK, chunk);
            rest = tail;
        }
        self.put_string_chunk(tags::STRING_FINAL, rest);
        Ok(())
    }

    /// Write an optional string; `None` encodes as null.
    pub fn write_opt_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(s) => self.write_string(s),
            None => self.write_null(),
        }
    }

    /// Write a single character as a length-1 string value.
    pub fn write_char(&mut self, value: char) -> Result<()> {
        let mut buf = [0u16; 2];
        let units = value.encode_utf16(&mut buf);
        self.put_string_chunk(tags::STRING_FINAL, units);
        Ok(())
    }

    /// Write a byte array, splitting into chunks of at most
    /// [`tags::CHUNK_LIMIT`] bytes.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        let mut rest = value;
        while rest.len() > tags::CHUNK_LIMIT {
            let (chunk, tail) = rest.split_at(tags::CHUNK_LIMIT);
            self.buf.put_u8(tags::BYTES_CHUNK);
            self.buf.put_u16(chunk.len() as u16);
            self.buf.put_slice(chunk);
            rest = tail;
        }
        self.buf.put_u8(tags::BYTES_FINAL);
        self.buf.put_u16(rest.len() as u16);
        self.buf.put_slice(rest);
        Ok(())
    }

    /// Write an optional byte array; `None` encodes as null.
    pub fn write_opt_bytes(&mut self, value: Option<&[u8]>) -> Result<()> {
        match value {
            Some(b) => self.write_bytes(b),
            None => self.write_null(),
        }
    }

    // ---- composite headers --------------------------------------------

    /// Intern a composite handle in the reference table.
    ///
    /// Returns `true` (and writes the backreference) when the identical
    /// handle was already encoded in this message; the caller must then skip
    /// the value body. Non-composites return `false` without interning.
    pub fn add_ref(&mut self, value: &Value) -> Result<bool> {
        match self.refs.intern(value) {
            Some(Err(index)) => {
                self.write_ref(index as u32)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Write a backreference: `R b32..b8`.
    pub fn write_ref(&mut self, index: u32) -> Result<()> {
        self.buf.put_u8(tags::REF);
        self.buf.put_u32(index);
        Ok(())
    }

    /// Write a remote reference: `r` type url.
    pub fn write_remote(&mut self, type_name: &str, url: &str) -> Result<()> {
        self.buf.put_u8(tags::REMOTE);
        self.put_type(type_name)?;
        self.write_string(url)
    }

    /// Open a list: `V` with optional type name and declared length.
    ///
    /// Returns `true`: this form always takes a closing terminal marker.
    pub fn write_list_begin(
        &mut self,
        length: Option<usize>,
        type_name: Option<&str>,
    ) -> Result<bool> {
        self.buf.put_u8(tags::LIST);
        if let Some(name) = type_name {
            self.put_type(name)?;
        }
        if let Some(len) = length {
            self.buf.put_u8(tags::LENGTH);
            self.buf.put_i32(len as i32);
        }
        Ok(true)
    }

    /// Close a list or array opened in the `V` form.
    pub fn write_list_end(&mut self) -> Result<()> {
        self.write_end()
    }

    /// Close a map opened in the `M` form.
    pub fn write_map_end(&mut self) -> Result<()> {
        self.write_end()
    }

    fn write_end(&mut self) -> Result<()> {
        self.buf.put_u8(tags::END);
        Ok(())
    }

    /// Open a fixed-element array.
    ///
    /// Short primitive arrays use the compact code (no terminal marker,
    /// returns `false`); everything else falls back to the `V` form with the
    /// array's wire type name (returns `true`).
    pub fn write_array_begin(&mut self, kind: TypeKind, length: usize) -> Result<bool> {
        if length <= tags::COMPACT_ARRAY_MAX_LEN {
            if let Some(elem) = tags::element_tag(kind) {
                self.buf
                    .put_u8(tags::COMPACT_ARRAY_BASE + length as u8);
                self.buf.put_u8(elem);
                return Ok(false);
            }
        }
        self.write_list_begin(Some(length), Some(kind.wire_name()))
    }

    /// Open a map: `M` with optional type name.
    pub fn write_map_begin(&mut self, type_name: Option<&str>) -> Result<()> {
        self.buf.put_u8(tags::MAP);
        if let Some(name) = type_name {
            self.put_type(name)?;
        }
        Ok(())
    }

    // ---- generic object writes ----------------------------------------

    /// Write any value, dispatching on its kind.
    ///
    /// Composite handles are interned first; a repeat of the identical
    /// handle encodes as a backreference, which is what keeps shared and
    /// cyclic graphs finite on the wire.
    pub fn write_object(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write_null(),
            Value::Bool(b) => self.write_bool(*b),
            Value::Int(n) => self.write_int(*n),
            Value::Long(n) => self.write_long(*n),
            Value::Double(n) => self.write_double(*n),
            Value::Char(c) => self.write_char(*c),
            Value::Date(ms) => self.write_date(*ms),
            Value::String(s) => self.write_string(s),
            Value::Bytes(b) => self.write_bytes(b),
            Value::Remote(r) => self.write_remote(&r.type_name, &r.url),
            Value::List(rc) => {
                if self.add_ref(value)? {
                    return Ok(());
                }
                let (type_name, items) = {
                    let list = rc.borrow();
                    (list.type_name.clone(), list.items.clone())
                };
                self.write_list_begin(Some(items.len()), type_name.as_deref())?;
                for item in &items {
                    self.write_object(item)?;
                }
                self.write_end()
            }
            Value::Map(rc) => {
                if self.add_ref(value)? {
                    return Ok(());
                }
                let registry = Arc::clone(&self.registry);
                if let Some((_, codec)) = registry.custom_for_value(value) {
                    if let Some(lowered) = codec.lower(value) {
                        self.write_map_begin(lowered.type_name.as_deref())?;
                        for (k, v) in &lowered.entries {
                            self.write_object(k)?;
                            self.write_object(v)?;
                        }
                        return self.write_end();
                    }
                }
                let (type_name, entries) = {
                    let map = rc.borrow();
                    (map.type_name.clone(), map.entries.clone())
                };
                self.write_map_begin(type_name.as_deref())?;
                for (k, v) in &entries {
                    self.write_object(k)?;
                    self.write_object(v)?;
                }
                self.write_end()
            }
            Value::Array(rc) => {
                if self.add_ref(value)? {
                    return Ok(());
                }
                let data = rc.borrow().clone();
                self.write_array_body(&data)
            }
        }
    }

    fn write_array_body(&mut self, data: &ArrayData) -> Result<()> {
        let has_end = self.write_array_begin(data.kind(), data.len())?;
        match data {
            ArrayData::Bool(items) => {
                for b in items {
                    self.write_bool(*b)?;
                }
            }
            ArrayData::Int(items) => {
                for n in items {
                    self.write_int(*n)?;
                }
            }
            ArrayData::Long(items) => {
                for n in items {
                    self.write_long(*n)?;
                }
            }
            ArrayData::Double(items) => {
                for n in items {
                    self.write_double(*n)?;
                }
            }
            ArrayData::String(items) => {
                for s in items {
                    self.write_string(s)?;
                }
            }
            ArrayData::Object(items) => {
                for item in items {
                    self.write_object(item)?;
                }
            }
        }
        if has_end {
            self.write_end()?;
        }
        Ok(())
    }

    // ---- low-level emit -----------------------------------------------

    fn put_string_chunk(&mut self, tag: u8, units: &[u16]) {
        self.buf.put_u8(tag);
        self.buf.put_u16(units.len() as u16);
        for &unit in units {
            self.put_utf16_unit(unit);
        }
    }

    /// Emit one UTF-16 code unit as a 1-3 byte modified-UTF8 sequence.
    /// Surrogate halves go out as ordinary 3-byte sequences.
    fn put_utf16_unit(&mut self, unit: u16) {
        let u = u32::from(unit);
        if u < 0x80 {
            self.buf.put_u8(u as u8);
        } else if u < 0x800 {
            self.buf.put_u8(0xc0 + ((u >> 6) as u8));
            self.buf.put_u8(0x80 + ((u & 0x3f) as u8));
        } else {
            self.buf.put_u8(0xe0 + ((u >> 12) as u8));
            self.buf.put_u8(0x80 + (((u >> 6) & 0x3f) as u8));
            self.buf.put_u8(0x80 + ((u & 0x3f) as u8));
        }
    }

    /// Emit a single-chunk name field (type, header key, method).
    ///
    /// Name fields carry a b16 length and never chunk, so a name longer
    /// than 65535 UTF-16 units cannot be represented on the wire.
    fn put_name(&mut self, tag: u8, name: &str) -> Result<()> {
        let units: Vec<u16> = name.encode_utf16().collect();
        if units.len() > usize::from(u16::MAX) {
            return Err(CodecError::Protocol(format!(
                "name field of {} UTF-16 units exceeds the b16 limit",
                units.len()
            )));
        }
        self.buf.put_u8(tag);
        self.buf.put_u16(units.len() as u16);
        for unit in units {
            self.put_utf16_unit(unit);
        }
        Ok(())
    }

    fn put_type(&mut self, name: &str) -> Result<()> {
        self.put_name(tags::TYPE, name)
    }
}
