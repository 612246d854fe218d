use std::io::Read;
use std::sync::Arc;

use tracing::{debug, trace};
use wirecall_registry::{ListResolution, MapResolution, TypeRegistry};
use wirecall_value::{ArrayData, Fault, Map, Remote, TypeKind, Value};

use crate::error::{CodecError, Result};
use crate::refs::RefTable;
use crate::tags;
use crate::tags::code_name;

/// Resolves a remote reference (`type`, `url`) to a live value.
///
/// Returning `None` falls back to an opaque [`Value::Remote`] handle.
pub trait RemoteResolver {
    fn lookup(&self, type_name: &str, url: &str) -> Option<Value>;
}

/// Per-value chunk-continuation state.
///
/// `remaining` counts UTF-16 code units for string chunks and raw bytes for
/// byte chunks. `EndOfData` is a dedicated sentinel, distinct from "no chunk
/// in progress": it makes the incremental readers report end-of-value exactly
/// once instead of re-entering the stream as a fresh tag read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// No chunk in progress; the next read starts with a tag.
    Idle,
    /// Mid-chunk. `remaining == 0 && !is_last` means a continuation tag is
    /// due; `remaining == 0 && is_last` means the value is exhausted.
    Active { remaining: usize, is_last: bool },
    /// The final chunk was fully consumed by an incremental reader.
    EndOfData,
}

/// Stateful, single-pass streaming decoder.
///
/// One decoder (with its own reference table) serves exactly one message
/// stream. Any error is fatal for the stream: discard the decoder and its
/// connection rather than attempt to resynchronize. Between independent
/// messages on a persistent connection, call [`Decoder::reset_references`].
pub struct Decoder<R: Read> {
    source: R,
    /// One-byte pushback buffer, so the source need not support peeking.
    peek: Option<u8>,
    chunk: ChunkState,
    sbuf: String,
    refs: RefTable,
    registry: Arc<TypeRegistry>,
    method: Option<String>,
    resolver: Option<Box<dyn RemoteResolver>>,
}

impl<R: Read> Decoder<R> {
    /// Create a decoder over a byte source with the built-in type registry.
    pub fn new(source: R) -> Self {
        Self::with_registry(source, Arc::new(TypeRegistry::builtin()))
    }

    /// Create a decoder sharing a process-wide registry.
    pub fn with_registry(source: R, registry: Arc<TypeRegistry>) -> Self {
        Self {
            source,
            peek: None,
            chunk: ChunkState::Idle,
            sbuf: String::new(),
            refs: RefTable::new(),
            registry,
            method: None,
            resolver: None,
        }
    }

    /// Install a remote-reference resolver.
    pub fn set_remote_resolver(&mut self, resolver: Box<dyn RemoteResolver>) {
        self.resolver = Some(resolver);
    }

    /// The method name of the call being decoded, once known.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Number of reference-table entries registered so far.
    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    /// Clear the reference table at a message boundary, keeping the decoder
    /// (and its source) for the next message on the same stream.
    pub fn reset_references(&mut self) {
        self.refs.reset();
    }

    /// Consume the decoder and return the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }

    // ---- call/reply framing -------------------------------------------

    /// Read the call prefix: `c major minor`.
    pub fn read_call(&mut self) -> Result<(u8, u8)> {
        let tag = self.next()?;
        if tag != Some(tags::CALL) {
            return Err(self.expect_err("rpc call ('c')", tag));
        }
        let major = self.next_or_eof()?;
        let minor = self.next_or_eof()?;
        debug!(major, minor, "reading call");
        Ok((major, minor))
    }

    /// Consume a call prefix if one is present; legacy peers may omit it.
    pub fn skip_optional_call(&mut self) -> Result<()> {
        let tag = self.next()?;
        if tag == Some(tags::CALL) {
            self.next_or_eof()?;
            self.next_or_eof()?;
        } else {
            self.push_back(tag);
        }
        Ok(())
    }

    /// Read one header key, or `None` when the header run is over.
    ///
    /// The absent case pushes the peeked tag back so the next real read sees
    /// it; the caller must then read the header's value with
    /// [`Decoder::read_object`] before calling this again.
    pub fn read_header(&mut self) -> Result<Option<String>> {
        let tag = self.next()?;
        if tag != Some(tags::HEADER) {
            self.push_back(tag);
            return Ok(None);
        }
        let len = self.parse_u16()? as usize;
        self.chunk = ChunkState::Active {
            remaining: len,
            is_last: true,
        };
        Ok(Some(self.read_string_body()?))
    }

    /// Read the method name: `m b16 b8 name`.
    ///
    /// The name is recorded and attached to subsequent error messages.
    pub fn read_method(&mut self) -> Result<String> {
        let tag = self.next()?;
        if tag != Some(tags::METHOD) {
            return Err(self.expect_err("rpc method ('m')", tag));
        }
        let len = self.parse_u16()? as usize;
        self.chunk = ChunkState::Active {
            remaining: len,
            is_last: true,
        };
        let name = self.read_string_body()?;
        self.method = Some(name.clone());
        Ok(name)
    }

    /// Read the call prefix, drain headers, and read the method name.
    ///
    /// Header values are decoded and discarded; callers that care about
    /// headers should drive [`Decoder::read_header`] themselves.
    pub fn start_call(&mut self) -> Result<String> {
        self.read_call()?;
        while self.read_header()?.is_some() {
            self.read_object()?;
        }
        self.read_method()
    }

    /// Consume the call's terminal marker.
    pub fn complete_call(&mut self) -> Result<()> {
        let tag = self.next()?;
        if tag != Some(tags::END) {
            return Err(self.expect_err("end of call ('z')", tag));
        }
        Ok(())
    }

    /// Read a full reply. A fault body surfaces as [`CodecError::Fault`].
    pub fn read_reply(&mut self, expected: Option<TypeKind>) -> Result<Value> {
        let version = self.read_reply_prefix()?;
        debug!(major = version.0, minor = version.1, "reading reply");

        let tag = self.next()?;
        if tag == Some(tags::FAULT) {
            return Err(CodecError::Fault(self.read_fault()?));
        }
        self.push_back(tag);

        let value = match expected {
            Some(kind) => self.read_object_as(kind)?,
            None => self.read_object()?,
        };

        let tag = self.next()?;
        if tag != Some(tags::END) {
            return Err(self.expect_err("end of reply ('z')", tag));
        }
        Ok(value)
    }

    /// Read the reply prefix and raise any fault, leaving the result value
    /// unread on success.
    pub fn start_reply(&mut self) -> Result<(u8, u8)> {
        let version = self.read_reply_prefix()?;
        let tag = self.next()?;
        if tag == Some(tags::FAULT) {
            return Err(CodecError::Fault(self.read_fault()?));
        }
        self.push_back(tag);
        Ok(version)
    }

    /// Consume the reply's terminal marker.
    pub fn complete_reply(&mut self) -> Result<()> {
        let tag = self.next()?;
        if tag != Some(tags::END) {
            return Err(self.expect_err("end of reply ('z')", tag));
        }
        Ok(())
    }

    fn read_reply_prefix(&mut self) -> Result<(u8, u8)> {
        let tag = self.next()?;
        if tag != Some(tags::REPLY) {
            return Err(self.expect_err("rpc reply ('r')", tag));
        }
        let major = self.next_or_eof()?;
        let minor = self.next_or_eof()?;
        Ok((major, minor))
    }

    /// Read a fault body: key/value pairs through the terminal marker.
    ///
    /// A `detail` entry is carried verbatim; the fault is otherwise
    /// synthesized from the `code` and `message` entries.
    fn read_fault(&mut self) -> Result<Fault> {
        let mut entries: Vec<(Value, Value)> = Vec::new();
        while !self.is_end()? {
            let key = self.read_object()?;
            let value = self.read_object()?;
            entries.push((key, value));
        }
        self.read_end()?;

        let map = Map {
            type_name: None,
            entries,
        };
        let code = match map.get_str("code") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let message = match map.get_str("message") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let detail = map.get_str("detail").cloned();

        Ok(Fault {
            code,
            message,
            detail,
        })
    }

    // ---- typed primitive reads ----------------------------------------

    /// Read a null: `N`.
    pub fn read_null(&mut self) -> Result<()> {
        let tag = self.next()?;
        if tag != Some(tags::NULL) {
            return Err(self.expect_err("null", tag));
        }
        Ok(())
    }

    /// Read a boolean, coercing numeric tags (nonzero is true, null false).
    pub fn read_bool(&mut self) -> Result<bool> {
        let tag = self.next()?;
        match tag {
            Some(tags::TRUE) => Ok(true),
            Some(tags::FALSE) => Ok(false),
            Some(tags::INT) => Ok(self.parse_i32()? != 0),
            Some(tags::LONG) => Ok(self.parse_i64()? != 0),
            Some(tags::DOUBLE) => Ok(self.parse_f64()? != 0.0),
            Some(tags::NULL) => Ok(false),
            other => Err(self.expect_err("boolean", other)),
        }
    }

    /// Read an int, coercing bool/long/double tags.
    pub fn read_int(&mut self) -> Result<i32> {
        let tag = self.next()?;
        match tag {
            Some(tags::TRUE) => Ok(1),
            Some(tags::FALSE) => Ok(0),
            Some(tags::INT) => self.parse_i32(),
            Some(tags::LONG) => Ok(self.parse_i64()? as i32),
            Some(tags::DOUBLE) => Ok(self.parse_f64()? as i32),
            other => Err(self.expect_err("int", other)),
        }
    }

    /// Read a short through the int path.
    pub fn read_short(&mut self) -> Result<i16> {
        Ok(self.read_int()? as i16)
    }

    /// Read a long, coercing bool/int/double tags.
    pub fn read_long(&mut self) -> Result<i64> {
        let tag = self.next()?;
        match tag {
            Some(tags::TRUE) => Ok(1),
            Some(tags::FALSE) => Ok(0),
            Some(tags::INT) => Ok(i64::from(self.parse_i32()?)),
            Some(tags::LONG) => self.parse_i64(),
            Some(tags::DOUBLE) => Ok(self.parse_f64()? as i64),
            other => Err(self.expect_err("long", other)),
        }
    }

    /// Read a double, coercing bool/int/long tags.
    pub fn read_double(&mut self) -> Result<f64> {
        let tag = self.next()?;
        match tag {
            Some(tags::TRUE) => Ok(1.0),
            Some(tags::FALSE) => Ok(0.0),
            Some(tags::INT) => Ok(f64::from(self.parse_i32()?)),
            Some(tags::LONG) => Ok(self.parse_i64()? as f64),
            Some(tags::DOUBLE) => self.parse_f64(),
            other => Err(self.expect_err("double", other)),
        }
    }

    /// Read a float through the double path.
    pub fn read_float(&mut self) -> Result<f32> {
        Ok(self.read_double()? as f32)
    }

    /// Read a millisecond-epoch date: `d b64..b8`.
    pub fn read_date(&mut self) -> Result<i64> {
        let tag = self.next()?;
        if tag != Some(tags::DATE) {
            return Err(self.expect_err("date", tag));
        }
        self.parse_i64()
    }

    /// Read a string value, spanning chunks; `N` yields `None` and numeric
    /// tags stringify.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let tag = self.next()?;
        match tag {
            Some(tags::NULL) => Ok(None),
            Some(tags::INT) => Ok(Some(self.parse_i32()?.to_string())),
            Some(tags::LONG) => Ok(Some(self.parse_i64()?.to_string())),
            Some(tags::DOUBLE) => Ok(Some(self.parse_f64()?.to_string())),
            Some(
                tags::STRING_FINAL | tags::STRING_CHUNK | tags::XML_FINAL | tags::XML_CHUNK,
            ) => {
                self.begin_string_chunk(tag)?;
                Ok(Some(self.read_string_body()?))
            }
            other => Err(self.expect_err("string", other)),
        }
    }

    /// Read a byte array, spanning chunks; `N` yields `None`.
    pub fn read_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let tag = self.next()?;
        match tag {
            Some(tags::NULL) => Ok(None),
            Some(tags::BYTES_FINAL | tags::BYTES_CHUNK) => {
                self.begin_bytes_chunk(tag)?;
                let mut out = Vec::new();
                while let Some(b) = self.parse_chunk_byte()? {
                    out.push(b);
                }
                self.chunk = ChunkState::Idle;
                Ok(Some(out))
            }
            other => Err(self.expect_err("bytes", other)),
        }
    }

    // ---- incremental reads --------------------------------------------

    /// Read one character of a string value without buffering the whole
    /// value. Returns `None` exactly once at end-of-value; the next call
    /// starts a fresh tag read. Chunk state survives between calls, so a
    /// readiness-driven loop can re-enter mid-value.
    pub fn read_char(&mut self) -> Result<Option<char>> {
        let Some(unit) = self.next_unit_incremental()? else {
            return Ok(None);
        };
        self.combine_unit(unit, Self::next_unit_required_incremental)
            .map(Some)
    }

    /// Read one byte of a byte-array value; same contract as
    /// [`Decoder::read_char`].
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.chunk {
                ChunkState::Active { remaining, is_last } if remaining > 0 => {
                    let rem = remaining - 1;
                    self.chunk = if rem == 0 && is_last {
                        ChunkState::EndOfData
                    } else {
                        ChunkState::Active {
                            remaining: rem,
                            is_last,
                        }
                    };
                    return Ok(Some(self.next_or_eof()?));
                }
                ChunkState::EndOfData => {
                    self.chunk = ChunkState::Idle;
                    return Ok(None);
                }
                _ => {
                    let tag = self.next()?;
                    match tag {
                        Some(tags::NULL) => return Ok(None),
                        Some(tags::BYTES_FINAL | tags::BYTES_CHUNK) => {
                            self.begin_bytes_chunk(tag)?;
                            if self.chunk == ChunkState::Idle {
                                return Ok(None); // empty final chunk
                            }
                        }
                        other => return Err(self.expect_err("byte chunk ('B')", other)),
                    }
                }
            }
        }
    }

    /// Bulk incremental read of a byte-array value into `buf`.
    ///
    /// Returns `None` exactly once at end-of-value, otherwise the number of
    /// bytes written (at least one).
    pub fn read_bytes_into(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.chunk {
            ChunkState::EndOfData => {
                self.chunk = ChunkState::Idle;
                return Ok(None);
            }
            ChunkState::Idle => {
                let tag = self.next()?;
                match tag {
                    Some(tags::NULL) => return Ok(None),
                    Some(tags::BYTES_FINAL | tags::BYTES_CHUNK) => {
                        self.begin_bytes_chunk(tag)?;
                        if self.chunk == ChunkState::Idle {
                            return Ok(None); // empty final chunk
                        }
                    }
                    other => return Err(self.expect_err("byte chunk ('B')", other)),
                }
            }
            ChunkState::Active { .. } => {}
        }

        let mut filled = 0usize;
        while filled < buf.len() {
            match self.chunk {
                ChunkState::Active { remaining, is_last } if remaining > 0 => {
                    let take = remaining.min(buf.len() - filled);
                    self.read_exact_into(&mut buf[filled..filled + take])?;
                    filled += take;
                    let rem = remaining - take;
                    self.chunk = ChunkState::Active {
                        remaining: rem,
                        is_last,
                    };
                }
                ChunkState::Active {
                    remaining: 0,
                    is_last: true,
                } => {
                    if filled == 0 {
                        self.chunk = ChunkState::Idle;
                        return Ok(None);
                    }
                    self.chunk = ChunkState::EndOfData;
                    return Ok(Some(filled));
                }
                _ => {
                    let tag = self.next()?;
                    match tag {
                        Some(tags::BYTES_FINAL | tags::BYTES_CHUNK) => {
                            self.begin_bytes_chunk(tag)?;
                        }
                        other => return Err(self.expect_err("byte chunk ('B')", other)),
                    }
                }
            }
        }

        if let ChunkState::Active {
            remaining: 0,
            is_last: true,
        } = self.chunk
        {
            self.chunk = ChunkState::EndOfData;
        }
        Ok(Some(filled))
    }

    /// An `io::Read` adapter draining one chunked byte value.
    ///
    /// `None` if the value is null. The adapter must be read to completion
    /// (or the decoder discarded) before any other read.
    pub fn bytes_reader(&mut self) -> Result<Option<BytesReader<'_, R>>> {
        let tag = self.next()?;
        match tag {
            Some(tags::NULL) => Ok(None),
            Some(tags::BYTES_FINAL | tags::BYTES_CHUNK) => {
                self.begin_bytes_chunk(tag)?;
                let done = self.chunk == ChunkState::Idle;
                Ok(Some(BytesReader {
                    decoder: self,
                    done,
                }))
            }
            other => Err(self.expect_err("byte stream ('B')", other)),
        }
    }

    // ---- generic object reads -----------------------------------------

    /// Read one value of unknown type, dispatching purely on the tag.
    pub fn read_object(&mut self) -> Result<Value> {
        let tag = self.next()?;
        trace!(tag = %code_name(tag), "dispatching value");
        match tag {
            Some(tags::NULL) => Ok(Value::Null),
            Some(tags::TRUE) => Ok(Value::Bool(true)),
            Some(tags::FALSE) => Ok(Value::Bool(false)),
            Some(tags::INT) => Ok(Value::Int(self.parse_i32()?)),
            Some(tags::LONG) => Ok(Value::Long(self.parse_i64()?)),
            Some(tags::DOUBLE) => Ok(Value::Double(self.parse_f64()?)),
            Some(tags::DATE) => Ok(Value::Date(self.parse_i64()?)),
            Some(tags::XML_FINAL | tags::XML_CHUNK) => {
                // Header decodes so the error is precise; content is not
                // supported.
                self.parse_u16()?;
                Err(CodecError::UnsupportedKind("inline XML".to_string()))
            }
            Some(tags::STRING_FINAL | tags::STRING_CHUNK) => {
                self.begin_string_chunk(tag)?;
                Ok(Value::String(self.read_string_body()?))
            }
            Some(tags::BYTES_FINAL | tags::BYTES_CHUNK) => {
                self.push_back(tag);
                // read_bytes re-reads the tag and never sees N here.
                Ok(Value::Bytes(self.read_bytes()?.unwrap_or_default()))
            }
            Some(tags::LIST) => {
                let type_name = self.read_type()?;
                let declared = self.read_length()?;
                match self.registry.clone().resolve_list(type_name.as_deref())? {
                    ListResolution::Array(kind) => self.read_array(kind, declared),
                    ListResolution::Generic => self.read_list_body(type_name),
                }
            }
            Some(tags::MAP) => {
                let type_name = self.read_type()?;
                self.read_map_resolved(type_name)
            }
            Some(tags::REF) => {
                let index = self.parse_i32()?;
                if index < 0 {
                    return Err(self.error(format!("negative backreference {index}")));
                }
                self.refs.lookup(index as usize)
            }
            Some(tags::REMOTE) => self.read_remote_body(),
            Some(code @ tags::COMPACT_ARRAY_BASE..=tags::COMPACT_ARRAY_END) => {
                self.read_compact_array(code)
            }
            other => Err(self.error(format!(
                "unknown code for read_object at {}",
                code_name(other)
            ))),
        }
    }

    /// Read one value with an expected kind.
    ///
    /// Prefers the wire's own type when it is compatible with `expected`,
    /// falls back to `expected`'s codec, and finally to the generic path.
    pub fn read_object_as(&mut self, expected: TypeKind) -> Result<Value> {
        if expected == TypeKind::Object {
            return self.read_object();
        }

        let tag = self.next()?;
        match tag {
            Some(tags::NULL) => Ok(Value::Null),
            Some(tags::MAP) => {
                let type_name = self.read_type()?;
                self.read_map_resolved(type_name)
            }
            Some(tags::LIST) => {
                let type_name = self.read_type()?;
                let declared = self.read_length()?;
                match self.registry.clone().resolve_list(type_name.as_deref())? {
                    ListResolution::Array(kind) if array_compatible(expected, kind) => {
                        self.read_array(kind, declared)
                    }
                    _ if expected.is_array() => self.read_array(expected, declared),
                    _ => self.read_list_body(type_name),
                }
            }
            Some(tags::REF) => {
                let index = self.parse_i32()?;
                if index < 0 {
                    return Err(self.error(format!("negative backreference {index}")));
                }
                self.refs.lookup(index as usize)
            }
            Some(tags::REMOTE) => self.read_remote_body(),
            Some(code @ tags::COMPACT_ARRAY_BASE..=tags::COMPACT_ARRAY_END) => {
                self.read_compact_array(code)
            }
            other => {
                self.push_back(other);
                match expected {
                    TypeKind::Null => {
                        self.read_object()?;
                        Ok(Value::Null)
                    }
                    TypeKind::Bool => Ok(Value::Bool(self.read_bool()?)),
                    TypeKind::Int => Ok(Value::Int(self.read_int()?)),
                    TypeKind::Long => Ok(Value::Long(self.read_long()?)),
                    TypeKind::Double => Ok(Value::Double(self.read_double()?)),
                    TypeKind::Char => match self.read_string()? {
                        Some(s) => match s.chars().next() {
                            Some(c) => Ok(Value::Char(c)),
                            None => Ok(Value::Null),
                        },
                        None => Ok(Value::Null),
                    },
                    TypeKind::String => Ok(self
                        .read_string()?
                        .map(Value::String)
                        .unwrap_or(Value::Null)),
                    TypeKind::Date => Ok(Value::Date(self.read_date()?)),
                    TypeKind::Bytes => Ok(self
                        .read_bytes()?
                        .map(Value::Bytes)
                        .unwrap_or(Value::Null)),
                    other_kind => Err(self.expect_err(other_kind.wire_name(), tag)),
                }
            }
        }
    }

    /// Read a remote reference value: type + url.
    pub fn read_remote(&mut self) -> Result<Value> {
        self.read_remote_body()
    }

    // ---- composite headers and bodies ---------------------------------

    /// Read an optional type-name header: `t b16 b8 name`.
    ///
    /// Any other tag pushes back and yields `None`; the wire's "no type"
    /// is kept explicit instead of overloading an empty name.
    pub fn read_type(&mut self) -> Result<Option<String>> {
        let tag = self.next()?;
        if tag != Some(tags::TYPE) {
            self.push_back(tag);
            return Ok(None);
        }
        let len = self.parse_u16()? as usize;
        self.chunk = ChunkState::Active {
            remaining: len,
            is_last: true,
        };
        Ok(Some(self.read_string_body()?))
    }

    /// Read an optional declared length: `l b32..b8`.
    pub fn read_length(&mut self) -> Result<Option<u32>> {
        let tag = self.next()?;
        if tag != Some(tags::LENGTH) {
            self.push_back(tag);
            return Ok(None);
        }
        let len = self.parse_i32()?;
        if len < 0 {
            return Err(self.error(format!("negative declared length {len}")));
        }
        Ok(Some(len as u32))
    }

    /// Consume a list header, returning its declared type and length.
    ///
    /// Lower-level than [`Decoder::read_object`]: no reference slot is
    /// registered, so a caller streaming elements itself should
    /// [`Decoder::add_ref`] its own container first.
    pub fn read_list_start(&mut self) -> Result<(Option<String>, Option<u32>)> {
        let tag = self.next()?;
        if tag != Some(tags::LIST) {
            return Err(self.expect_err("list ('V')", tag));
        }
        let type_name = self.read_type()?;
        let length = self.read_length()?;
        Ok((type_name, length))
    }

    /// Consume a map header, returning its declared type.
    pub fn read_map_start(&mut self) -> Result<Option<String>> {
        let tag = self.next()?;
        if tag != Some(tags::MAP) {
            return Err(self.expect_err("map ('M')", tag));
        }
        self.read_type()
    }

    /// Register a caller-built composite in the reference table.
    pub fn add_ref(&mut self, value: Value) -> usize {
        self.refs.add_ready(value)
    }

    /// Resolve a backreference index against the reference table.
    pub fn resolve_ref(&mut self, index: usize) -> Result<Value> {
        self.refs.lookup(index)
    }

    /// Peek whether the next tag closes the current list/map/fault.
    pub fn is_end(&mut self) -> Result<bool> {
        let tag = self.next()?;
        self.push_back(tag);
        Ok(matches!(tag, None | Some(tags::END)))
    }

    /// Consume a terminal marker.
    pub fn read_end(&mut self) -> Result<()> {
        let tag = self.next()?;
        if tag != Some(tags::END) {
            return Err(self.expect_err("terminal marker ('z')", tag));
        }
        Ok(())
    }

    fn read_list_body(&mut self, type_name: Option<String>) -> Result<Value> {
        let value = Value::List(Default::default());
        if let Value::List(rc) = &value {
            rc.borrow_mut().type_name = type_name;
        }
        // Registered before any element decodes, so elements may reference
        // their own container.
        self.refs.add_ready(value.clone());

        while !self.is_end()? {
            let item = self.read_object()?;
            if let Value::List(rc) = &value {
                rc.borrow_mut().items.push(item);
            }
        }
        self.read_end()?;
        Ok(value)
    }

    fn read_map_resolved(&mut self, type_name: Option<String>) -> Result<Value> {
        match self.registry.clone().resolve_map(type_name.as_deref())? {
            MapResolution::Generic => Ok(self.read_map_body(type_name)?.0),
            MapResolution::Custom(codec) => {
                let (raw, index) = self.read_map_body(type_name)?;
                let body = match &raw {
                    Value::Map(m) => m.borrow().clone(),
                    _ => Map::default(),
                };
                let revived = codec.revive(body)?;
                // Later backreferences resolve to the revived value.
                self.refs.resolve(index, revived.clone());
                Ok(revived)
            }
        }
    }

    fn read_map_body(&mut self, type_name: Option<String>) -> Result<(Value, usize)> {
        let value = Value::Map(Default::default());
        if let Value::Map(rc) = &value {
            rc.borrow_mut().type_name = type_name;
        }
        let index = self.refs.add_ready(value.clone());

        while !self.is_end()? {
            let key = self.read_object()?;
            let val = self.read_object()?;
            if let Value::Map(rc) = &value {
                rc.borrow_mut().entries.push((key, val));
            }
        }
        self.read_end()?;
        Ok((value, index))
    }

    fn read_array(&mut self, kind: TypeKind, declared: Option<u32>) -> Result<Value> {
        if kind == TypeKind::ObjectArray {
            return self.read_object_array(declared);
        }

        // Primitive elements cannot hold object references, so the slot stays
        // pending until the array is materialized.
        let index = self.refs.add_pending(kind);
        let data = match declared {
            Some(n) => {
                let data = self.read_fixed_elements(kind, n as usize)?;
                self.read_end()?;
                data
            }
            None => {
                let data = self.read_streamed_elements(kind)?;
                self.read_end()?;
                data
            }
        };
        let value = Value::array(data);
        self.refs.resolve(index, value.clone());
        Ok(value)
    }

    fn read_object_array(&mut self, declared: Option<u32>) -> Result<Value> {
        let value = Value::array(ArrayData::Object(Vec::new()));
        self.refs.add_ready(value.clone());

        match declared {
            Some(n) => {
                for _ in 0..n {
                    let item = self.read_object()?;
                    if let Value::Array(rc) = &value {
                        if let ArrayData::Object(items) = &mut *rc.borrow_mut() {
                            items.push(item);
                        }
                    }
                }
            }
            None => {
                while !self.is_end()? {
                    let item = self.read_object()?;
                    if let Value::Array(rc) = &value {
                        if let ArrayData::Object(items) = &mut *rc.borrow_mut() {
                            items.push(item);
                        }
                    }
                }
            }
        }
        self.read_end()?;
        Ok(value)
    }

    fn read_compact_array(&mut self, code: u8) -> Result<Value> {
        let len = (code - tags::COMPACT_ARRAY_BASE) as usize;
        let elem = self.next()?;
        let kind = elem
            .and_then(tags::array_kind_for_element_tag)
            .ok_or_else(|| self.expect_err("compact array element kind", elem))?;

        let index = self.refs.add_pending(kind);
        let data = self.read_fixed_elements(kind, len)?;
        // No terminal marker in the compact form.
        let value = Value::array(data);
        self.refs.resolve(index, value.clone());
        Ok(value)
    }

    fn read_fixed_elements(&mut self, kind: TypeKind, len: usize) -> Result<ArrayData> {
        Ok(match kind {
            TypeKind::BoolArray => {
                let mut data = Vec::with_capacity(len);
                for _ in 0..len {
                    data.push(self.read_bool()?);
                }
                ArrayData::Bool(data)
            }
            TypeKind::IntArray => {
                let mut data = Vec::with_capacity(len);
                for _ in 0..len {
                    data.push(self.read_int()?);
                }
                ArrayData::Int(data)
            }
            TypeKind::LongArray => {
                let mut data = Vec::with_capacity(len);
                for _ in 0..len {
                    data.push(self.read_long()?);
                }
                ArrayData::Long(data)
            }
            TypeKind::DoubleArray => {
                let mut data = Vec::with_capacity(len);
                for _ in 0..len {
                    data.push(self.read_double()?);
                }
                ArrayData::Double(data)
            }
            TypeKind::StringArray => {
                let mut data = Vec::with_capacity(len);
                for _ in 0..len {
                    data.push(self.read_string()?.unwrap_or_default());
                }
                ArrayData::String(data)
            }
            other => {
                return Err(self.error(format!(
                    "{} is not a fixed-element array kind",
                    other.wire_name()
                )))
            }
        })
    }

    fn read_streamed_elements(&mut self, kind: TypeKind) -> Result<ArrayData> {
        Ok(match kind {
            TypeKind::BoolArray => {
                let mut data = Vec::new();
                while !self.is_end()? {
                    data.push(self.read_bool()?);
                }
                ArrayData::Bool(data)
            }
            TypeKind::IntArray => {
                let mut data = Vec::new();
                while !self.is_end()? {
                    data.push(self.read_int()?);
                }
                ArrayData::Int(data)
            }
            TypeKind::LongArray => {
                let mut data = Vec::new();
                while !self.is_end()? {
                    data.push(self.read_long()?);
                }
                ArrayData::Long(data)
            }
            TypeKind::DoubleArray => {
                let mut data = Vec::new();
                while !self.is_end()? {
                    data.push(self.read_double()?);
                }
                ArrayData::Double(data)
            }
            TypeKind::StringArray => {
                let mut data = Vec::new();
                while !self.is_end()? {
                    data.push(self.read_string()?.unwrap_or_default());
                }
                ArrayData::String(data)
            }
            other => {
                return Err(self.error(format!(
                    "{} is not a fixed-element array kind",
                    other.wire_name()
                )))
            }
        })
    }

    fn read_remote_body(&mut self) -> Result<Value> {
        let type_name = self.read_type()?.unwrap_or_default();
        let url = self
            .read_string()?
            .ok_or_else(|| self.error("remote reference missing url"))?;

        if let Some(resolver) = &self.resolver {
            if let Some(value) = resolver.lookup(&type_name, &url) {
                return Ok(value);
            }
        }
        Ok(Value::Remote(Remote { type_name, url }))
    }

    // ---- chunk machinery ----------------------------------------------

    fn begin_string_chunk(&mut self, tag: Option<u8>) -> Result<()> {
        let is_last = matches!(tag, Some(tags::STRING_FINAL | tags::XML_FINAL));
        let remaining = self.parse_u16()? as usize;
        self.chunk = ChunkState::Active { remaining, is_last };
        Ok(())
    }

    fn begin_bytes_chunk(&mut self, tag: Option<u8>) -> Result<()> {
        let is_last = tag == Some(tags::BYTES_FINAL);
        let remaining = self.parse_u16()? as usize;
        self.chunk = if remaining == 0 && is_last {
            ChunkState::Idle
        } else {
            ChunkState::Active { remaining, is_last }
        };
        Ok(())
    }

    /// Accumulate the current string chunk run into one `String`.
    fn read_string_body(&mut self) -> Result<String> {
        let mut out = std::mem::take(&mut self.sbuf);
        out.clear();
        let result = self.fill_string(&mut out);
        match result {
            Ok(()) => {
                self.chunk = ChunkState::Idle;
                let body = out.clone();
                self.sbuf = out;
                Ok(body)
            }
            Err(err) => {
                self.sbuf = out;
                Err(err)
            }
        }
    }

    fn fill_string(&mut self, out: &mut String) -> Result<()> {
        while let Some(unit) = self.parse_chunk_unit()? {
            let ch = self.combine_unit(unit, Self::parse_chunk_unit_required)?;
            out.push(ch);
        }
        Ok(())
    }

    /// Next UTF-16 code unit from the current chunk run, consuming
    /// continuation tags as chunks exhaust. `None` at end of the run.
    fn parse_chunk_unit(&mut self) -> Result<Option<u32>> {
        loop {
            match self.chunk {
                ChunkState::Active { remaining, is_last } => {
                    if remaining > 0 {
                        self.chunk = ChunkState::Active {
                            remaining: remaining - 1,
                            is_last,
                        };
                        return Ok(Some(self.parse_utf8_unit()?));
                    }
                    if is_last {
                        return Ok(None);
                    }
                    let tag = self.next()?;
                    match tag {
                        Some(tags::STRING_CHUNK | tags::XML_CHUNK) => {
                            let remaining = self.parse_u16()? as usize;
                            self.chunk = ChunkState::Active {
                                remaining,
                                is_last: false,
                            };
                        }
                        Some(tags::STRING_FINAL | tags::XML_FINAL) => {
                            let remaining = self.parse_u16()? as usize;
                            self.chunk = ChunkState::Active {
                                remaining,
                                is_last: true,
                            };
                        }
                        other => return Err(self.expect_err("string chunk ('S')", other)),
                    }
                }
                _ => return Ok(None),
            }
        }
    }

    fn parse_chunk_unit_required(&mut self) -> Result<u32> {
        match self.parse_chunk_unit()? {
            Some(unit) => Ok(unit),
            None => Err(self.error("unpaired surrogate at end of string")),
        }
    }

    /// Next byte of the current byte-chunk run; `None` at end of the run.
    fn parse_chunk_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.chunk {
                ChunkState::Active { remaining, is_last } => {
                    if remaining > 0 {
                        self.chunk = ChunkState::Active {
                            remaining: remaining - 1,
                            is_last,
                        };
                        return Ok(Some(self.next_or_eof()?));
                    }
                    if is_last {
                        return Ok(None);
                    }
                    let tag = self.next()?;
                    match tag {
                        Some(tags::BYTES_CHUNK) => {
                            let remaining = self.parse_u16()? as usize;
                            self.chunk = ChunkState::Active {
                                remaining,
                                is_last: false,
                            };
                        }
                        Some(tags::BYTES_FINAL) => {
                            let remaining = self.parse_u16()? as usize;
                            self.chunk = ChunkState::Active {
                                remaining,
                                is_last: true,
                            };
                        }
                        other => return Err(self.expect_err("byte chunk ('B')", other)),
                    }
                }
                _ => return Ok(None),
            }
        }
    }

    /// Incremental variant of [`Decoder::parse_chunk_unit`] that starts a
    /// chunk run from a fresh tag and reports end-of-value through the
    /// `EndOfData` sentinel exactly once.
    fn next_unit_incremental(&mut self) -> Result<Option<u32>> {
        loop {
            match self.chunk {
                ChunkState::Active { remaining, is_last } if remaining > 0 => {
                    let rem = remaining - 1;
                    self.chunk = if rem == 0 && is_last {
                        ChunkState::EndOfData
                    } else {
                        ChunkState::Active {
                            remaining: rem,
                            is_last,
                        }
                    };
                    return Ok(Some(self.parse_utf8_unit()?));
                }
                ChunkState::EndOfData => {
                    self.chunk = ChunkState::Idle;
                    return Ok(None);
                }
                _ => {
                    let tag = self.next()?;
                    match tag {
                        Some(tags::NULL) => return Ok(None),
                        Some(
                            tags::STRING_FINAL
                            | tags::STRING_CHUNK
                            | tags::XML_FINAL
                            | tags::XML_CHUNK,
                        ) => {
                            let is_last =
                                matches!(tag, Some(tags::STRING_FINAL | tags::XML_FINAL));
                            let remaining = self.parse_u16()? as usize;
                            if remaining == 0 && is_last {
                                self.chunk = ChunkState::Idle;
                                return Ok(None);
                            }
                            self.chunk = ChunkState::Active { remaining, is_last };
                        }
                        other => return Err(self.expect_err("string chunk ('S')", other)),
                    }
                }
            }
        }
    }

    fn next_unit_required_incremental(&mut self) -> Result<u32> {
        match self.next_unit_incremental()? {
            Some(unit) => Ok(unit),
            None => Err(self.error("unpaired surrogate at end of string")),
        }
    }

    /// Combine a UTF-16 code unit (and, for a high surrogate, its required
    /// low half fetched through `next_unit`) into a character.
    fn combine_unit(
        &mut self,
        unit: u32,
        next_unit: fn(&mut Self) -> Result<u32>,
    ) -> Result<char> {
        if (0xd800..0xdc00).contains(&unit) {
            let low = next_unit(self)?;
            if !(0xdc00..0xe000).contains(&low) {
                return Err(self.error("unpaired high surrogate in string"));
            }
            let cp = 0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00);
            char::from_u32(cp).ok_or_else(|| self.error("invalid surrogate pair in string"))
        } else if (0xdc00..0xe000).contains(&unit) {
            Err(self.error("unpaired low surrogate in string"))
        } else {
            char::from_u32(unit)
                .ok_or_else(|| self.error(format!("invalid character 0x{unit:04x}")))
        }
    }

    /// Parse one modified-UTF8 character as a UTF-16 code unit.
    ///
    /// Only 1-3 byte sequences are legal; a 4-byte lead is a hard protocol
    /// error. Supplementary characters travel as surrogate pairs of 3-byte
    /// sequences.
    fn parse_utf8_unit(&mut self) -> Result<u32> {
        let ch = u32::from(self.next_or_eof()?);
        if ch < 0x80 {
            Ok(ch)
        } else if (ch & 0xe0) == 0xc0 {
            let c1 = u32::from(self.next_or_eof()?);
            Ok(((ch & 0x1f) << 6) + (c1 & 0x3f))
        } else if (ch & 0xf0) == 0xe0 {
            let c1 = u32::from(self.next_or_eof()?);
            let c2 = u32::from(self.next_or_eof()?);
            Ok(((ch & 0x0f) << 12) + ((c1 & 0x3f) << 6) + (c2 & 0x3f))
        } else {
            Err(self.error(format!(
                "bad utf-8 encoding at {}",
                code_name(Some(ch as u8))
            )))
        }
    }

    // ---- fixed-width parses -------------------------------------------

    fn parse_u16(&mut self) -> Result<u16> {
        let hi = self.next_or_eof()?;
        let lo = self.next_or_eof()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn parse_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact_into(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn parse_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact_into(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    fn parse_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.parse_i64()? as u64))
    }

    // ---- byte source --------------------------------------------------

    /// Next byte, honoring the pushback buffer. `None` at end of stream.
    fn next(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.peek.take() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.source.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn next_or_eof(&mut self) -> Result<u8> {
        self.next()?.ok_or(CodecError::Eof)
    }

    fn push_back(&mut self, tag: Option<u8>) {
        self.peek = tag;
    }

    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut offset = 0usize;
        if let Some(b) = self.peek.take() {
            if buf.is_empty() {
                self.peek = Some(b);
                return Ok(());
            }
            buf[0] = b;
            offset = 1;
        }
        self.source.read_exact(&mut buf[offset..]).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                CodecError::Eof
            } else {
                CodecError::from(err)
            }
        })
    }

    // ---- errors -------------------------------------------------------

    fn error(&self, message: impl Into<String>) -> CodecError {
        match &self.method {
            Some(method) => CodecError::Protocol(format!("{method}: {}", message.into())),
            None => CodecError::Protocol(message.into()),
        }
    }

    fn expect_err(&self, expected: &str, found: Option<u8>) -> CodecError {
        self.error(format!("expected {expected} at {}", code_name(found)))
    }
}

fn array_compatible(expected: TypeKind, wire: TypeKind) -> bool {
    expected == wire || expected == TypeKind::ObjectArray || expected == TypeKind::List
}

/// `io::Read` over one chunked byte value; see [`Decoder::bytes_reader`].
pub struct BytesReader<'a, R: Read> {
    decoder: &'a mut Decoder<R>,
    done: bool,
}

impl<R: Read> Read for BytesReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        match self.decoder.read_bytes_into(buf) {
            Ok(Some(n)) => Ok(n),
            Ok(None) => {
                self.done = true;
                Ok(0)
            }
            Err(err) => Err(std::io::Error::other(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use std::io::Cursor;

    fn decoder(bytes: Vec<u8>) -> Decoder<Cursor<Vec<u8>>> {
        Decoder::new(Cursor::new(bytes))
    }

    fn encode(f: impl FnOnce(&mut Encoder<Vec<u8>>)) -> Vec<u8> {
        let mut enc = Encoder::new(Vec::new());
        f(&mut enc);
        enc.into_inner().unwrap()
    }

    #[test]
    fn numeric_coercions() {
        let mut dec = decoder(vec![b'I', 0, 0, 0, 5]);
        assert!(dec.read_bool().unwrap());

        let mut dec = decoder(vec![b'I', 0, 0, 0, 0]);
        assert!(!dec.read_bool().unwrap());

        let mut dec = decoder(encode(|e| e.write_double(3.9).unwrap()));
        assert_eq!(dec.read_int().unwrap(), 3);

        let mut dec = decoder(vec![b'T']);
        assert_eq!(dec.read_long().unwrap(), 1);

        let mut dec = decoder(vec![b'I', 0, 0, 0, 7]);
        assert_eq!(dec.read_string().unwrap().as_deref(), Some("7"));

        let mut dec = decoder(vec![b'N']);
        assert_eq!(dec.read_string().unwrap(), None);
    }

    #[test]
    fn chunked_string_spans_continuations() {
        let mut bytes = vec![b's', 0, 2, b'h', b'e'];
        bytes.extend_from_slice(&[b'S', 0, 3, b'l', b'l', b'o']);

        let mut dec = decoder(bytes);
        assert_eq!(dec.read_string().unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn supplementary_character_round_trips() {
        let text = "ok \u{1f600} done";
        let mut dec = decoder(encode(|e| e.write_string(text).unwrap()));
        assert_eq!(dec.read_string().unwrap().as_deref(), Some(text));
    }

    #[test]
    fn lone_surrogate_is_protocol_error() {
        // One code unit holding a raw high surrogate (0xd800 as 3-byte seq).
        let bytes = vec![b'S', 0, 1, 0xed, 0xa0, 0x80];
        let mut dec = decoder(bytes);
        assert!(matches!(
            dec.read_string(),
            Err(CodecError::Protocol(_))
        ));
    }

    #[test]
    fn four_byte_utf8_lead_is_rejected() {
        let bytes = vec![b'S', 0, 1, 0xf0, 0x9f, 0x98, 0x80];
        let mut dec = decoder(bytes);
        let err = dec.read_string().unwrap_err();
        assert!(err.to_string().contains("utf-8"));
    }

    #[test]
    fn incremental_char_reader_reports_end_once() {
        let mut dec = decoder(encode(|e| {
            e.write_string("ab").unwrap();
            e.write_int(9).unwrap();
        }));

        assert_eq!(dec.read_char().unwrap(), Some('a'));
        assert_eq!(dec.read_char().unwrap(), Some('b'));
        assert_eq!(dec.read_char().unwrap(), None);
        assert_eq!(dec.read_int().unwrap(), 9);
    }

    #[test]
    fn incremental_byte_reader_crosses_chunks() {
        let payload = vec![1u8, 2, 3];
        let mut bytes = vec![b'b', 0, 2, 1, 2];
        bytes.extend_from_slice(&[b'B', 0, 1, 3]);

        let mut dec = decoder(bytes);
        let mut out = Vec::new();
        while let Some(b) = dec.read_byte().unwrap() {
            out.push(b);
        }
        assert_eq!(out, payload);
        assert_eq!(dec.read_byte().unwrap(), None);
    }

    #[test]
    fn bytes_reader_drains_value() {
        let payload: Vec<u8> = (0..200).collect();
        let mut dec = decoder(encode(|e| e.write_bytes(&payload).unwrap()));

        let mut reader = dec.bytes_reader().unwrap().unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn compact_array_decodes_without_terminal_marker() {
        let mut bytes = vec![0x13, b'I'];
        for n in [1i32, 2, 3] {
            bytes.push(b'I');
            bytes.extend_from_slice(&n.to_be_bytes());
        }
        bytes.push(b'z'); // next token, not part of the array

        let mut dec = decoder(bytes);
        let value = dec.read_object().unwrap();
        match value {
            Value::Array(rc) => assert_eq!(*rc.borrow(), ArrayData::Int(vec![1, 2, 3])),
            other => panic!("unexpected {other}"),
        }
        dec.read_end().unwrap();
    }

    #[test]
    fn typed_list_form_decodes_as_array() {
        let mut dec = decoder(encode(|e| {
            e.write_list_begin(Some(2), Some("[string")).unwrap();
            e.write_string("a").unwrap();
            e.write_string("b").unwrap();
            e.write_list_end().unwrap();
        }));

        let decoded = dec.read_object().unwrap();
        assert_eq!(
            decoded,
            Value::array(ArrayData::String(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn self_referential_list_decodes_with_identity() {
        let bytes = vec![b'V', b'R', 0, 0, 0, 0, b'z'];
        let mut dec = decoder(bytes);

        let value = dec.read_object().unwrap();
        let Value::List(rc) = &value else {
            panic!("expected list");
        };
        let inner = rc.borrow();
        assert_eq!(inner.items.len(), 1);
        assert!(value.same_identity(&inner.items[0]));
    }

    #[test]
    fn shared_map_decodes_to_one_handle() {
        let shared = Value::map(vec![(Value::from("k"), Value::Int(1))]);
        let outer = Value::list(vec![shared.clone(), shared]);
        let mut dec = decoder(encode(|e| e.write_object(&outer).unwrap()));

        let decoded = dec.read_object().unwrap();
        let Value::List(rc) = &decoded else {
            panic!("expected list");
        };
        let items = &rc.borrow().items;
        assert!(items[0].same_identity(&items[1]));
        assert_eq!(dec.ref_count(), 2);
    }

    #[test]
    fn backreference_out_of_range_fails() {
        let bytes = vec![b'R', 0, 0, 0, 9];
        let mut dec = decoder(bytes);
        assert!(matches!(
            dec.read_object(),
            Err(CodecError::Protocol(_))
        ));
    }

    #[test]
    fn call_envelope_decodes() {
        let mut dec = decoder(encode(|e| {
            e.write_call_begin().unwrap();
            e.write_header("auth").unwrap();
            e.write_string("token").unwrap();
            e.write_method("echo").unwrap();
            e.write_string("hi").unwrap();
            e.complete_call().unwrap();
        }));

        assert_eq!(dec.start_call().unwrap(), "echo");
        assert_eq!(dec.method(), Some("echo"));
        assert_eq!(dec.read_string().unwrap().as_deref(), Some("hi"));
        dec.complete_call().unwrap();
    }

    #[test]
    fn errors_after_method_carry_its_name() {
        let mut dec = decoder(encode(|e| {
            e.write_call_begin().unwrap();
            e.write_method("getUser").unwrap();
            e.write_null().unwrap();
        }));

        dec.start_call().unwrap();
        let err = dec.read_int().unwrap_err();
        assert!(err.to_string().contains("getUser"));
    }

    #[test]
    fn reply_fault_surfaces_as_error() {
        let fault = Fault::new("ServiceException", "boom").with_detail(Value::Int(3));
        let mut dec = decoder(encode(|e| {
            e.write_reply_begin().unwrap();
            e.write_fault(&fault).unwrap();
        }));

        match dec.read_reply(None) {
            Err(CodecError::Fault(f)) => {
                assert_eq!(f.code, "ServiceException");
                assert_eq!(f.message, "boom");
                assert_eq!(f.detail, Some(Value::Int(3)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reply_value_decodes() {
        let mut dec = decoder(encode(|e| {
            e.write_reply_begin().unwrap();
            e.write_string("done").unwrap();
            e.complete_reply().unwrap();
        }));

        assert_eq!(
            dec.read_reply(None).unwrap(),
            Value::String("done".to_string())
        );
    }

    #[test]
    fn truncated_stream_is_eof_not_panic() {
        let mut dec = decoder(vec![b'I', 0, 0]);
        assert!(matches!(dec.read_int(), Err(CodecError::Eof)));

        let mut dec = decoder(vec![b'V', b'I', 0, 0, 0]);
        assert!(matches!(dec.read_object(), Err(CodecError::Eof)));
    }

    #[test]
    fn remote_falls_back_to_opaque_handle() {
        let mut dec = decoder(encode(|e| {
            e.write_remote("ex.Service", "wire://host/svc").unwrap();
        }));

        match dec.read_object().unwrap() {
            Value::Remote(r) => {
                assert_eq!(r.type_name, "ex.Service");
                assert_eq!(r.url, "wire://host/svc");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn remote_resolver_takes_precedence() {
        struct Stub;
        impl RemoteResolver for Stub {
            fn lookup(&self, _type_name: &str, url: &str) -> Option<Value> {
                Some(Value::String(format!("stub:{url}")))
            }
        }

        let mut dec = decoder(encode(|e| {
            e.write_remote("ex.Service", "wire://host/svc").unwrap();
        }));
        dec.set_remote_resolver(Box::new(Stub));

        assert_eq!(
            dec.read_object().unwrap(),
            Value::String("stub:wire://host/svc".to_string())
        );
    }

    #[test]
    fn expected_kind_prefers_wire_type() {
        let mut dec = decoder(encode(|e| e.write_int(5).unwrap()));
        assert_eq!(
            dec.read_object_as(TypeKind::Long).unwrap(),
            Value::Long(5)
        );

        let mut dec = decoder(encode(|e| e.write_string("x").unwrap()));
        assert_eq!(
            dec.read_object_as(TypeKind::Char).unwrap(),
            Value::Char('x')
        );
    }

    #[test]
    fn inline_xml_is_unsupported() {
        let bytes = vec![b'X', 0, 3, b'<', b'a', b'>'];
        let mut dec = decoder(bytes);
        assert!(matches!(
            dec.read_object(),
            Err(CodecError::UnsupportedKind(_))
        ));
        // The typed string path still accepts the chunk.
        let bytes = vec![b'X', 0, 3, b'<', b'a', b'>'];
        let mut dec = decoder(bytes);
        assert_eq!(dec.read_string().unwrap().as_deref(), Some("<a>"));
    }

    #[test]
    fn reset_references_clears_table_between_messages() {
        let list = Value::list(vec![Value::Int(1)]);
        let mut dec = decoder(encode(|e| {
            e.write_object(&list).unwrap();
            e.reset_references();
            e.write_object(&list).unwrap();
        }));

        dec.read_object().unwrap();
        assert_eq!(dec.ref_count(), 1);
        dec.reset_references();
        dec.read_object().unwrap();
        assert_eq!(dec.ref_count(), 1);
    }
}
