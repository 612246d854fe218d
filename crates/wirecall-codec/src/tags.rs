//! The wire tag vocabulary.
//!
//! Every value begins with one of these single-byte discriminators. The set
//! and byte assignments are fixed by the protocol and must not change.

use wirecall_value::TypeKind;

pub const NULL: u8 = b'N';
pub const TRUE: u8 = b'T';
pub const FALSE: u8 = b'F';
/// int32, 4 bytes big-endian.
pub const INT: u8 = b'I';
/// int64, 8 bytes big-endian.
pub const LONG: u8 = b'L';
/// float64, 8-byte big-endian IEEE-754 bits.
pub const DOUBLE: u8 = b'D';
/// Millisecond epoch date, 8 bytes big-endian.
pub const DATE: u8 = b'd';

/// Final string chunk: u16 BE length in UTF-16 code units, then that many
/// modified-UTF8 characters (1-3 byte sequences only).
pub const STRING_FINAL: u8 = b'S';
/// Non-final string chunk; a continuation must follow.
pub const STRING_CHUNK: u8 = b's';
/// Final inline-XML chunk. The header decodes; the content is unsupported.
pub const XML_FINAL: u8 = b'X';
pub const XML_CHUNK: u8 = b'x';
/// Final byte chunk: u16 BE length in bytes, then raw bytes.
pub const BYTES_FINAL: u8 = b'B';
pub const BYTES_CHUNK: u8 = b'b';

/// Map with optional type name.
pub const MAP: u8 = b'M';
/// List/array with optional type name and optional declared length.
pub const LIST: u8 = b'V';
/// Backreference: 4-byte big-endian index into the reference table.
pub const REF: u8 = b'R';
/// At value position: remote reference (type + url). At message start: reply.
pub const REMOTE: u8 = b'r';
pub const REPLY: u8 = b'r';

/// Call header: string key, then one value.
pub const HEADER: u8 = b'H';
/// Call start, followed by major/minor version bytes.
pub const CALL: u8 = b'c';
/// Method-name chunk: u16 BE length, then characters.
pub const METHOD: u8 = b'm';
/// Terminal marker closing lists, maps, calls, replies, and faults.
pub const END: u8 = b'z';
/// Fault start inside a reply body.
pub const FAULT: u8 = b'f';
/// Type-name chunk inside an `M`/`V` header.
pub const TYPE: u8 = b't';
/// Declared length inside a `V` header, 4 bytes big-endian.
pub const LENGTH: u8 = b'l';

/// First compact fixed-length array code; `COMPACT_ARRAY_BASE + n` encodes
/// an array of length `n` (0-15), followed by one element-kind byte.
pub const COMPACT_ARRAY_BASE: u8 = 0x10;
pub const COMPACT_ARRAY_END: u8 = 0x1f;
/// Largest length the compact array form can carry.
pub const COMPACT_ARRAY_MAX_LEN: usize = 15;

/// Chunk payload limit in UTF-16 code units (strings) or bytes (binaries).
pub const CHUNK_LIMIT: usize = 0x8000;

/// Protocol version written in call and reply prefixes.
pub const PROTOCOL_VERSION: (u8, u8) = (1, 0);

/// Human-readable rendering of a tag byte for error messages.
///
/// `None` means the byte source was exhausted.
pub fn code_name(tag: Option<u8>) -> String {
    match tag {
        None => "end of file".to_string(),
        Some(b) if b.is_ascii_graphic() => format!("0x{b:02x} ({})", b as char),
        Some(b) => format!("0x{b:02x}"),
    }
}

/// The element-kind byte carried by a compact array header.
pub fn element_tag(kind: TypeKind) -> Option<u8> {
    Some(match kind {
        TypeKind::BoolArray | TypeKind::Bool => TRUE,
        TypeKind::IntArray | TypeKind::Int => INT,
        TypeKind::LongArray | TypeKind::Long => LONG,
        TypeKind::DoubleArray | TypeKind::Double => DOUBLE,
        TypeKind::StringArray | TypeKind::String => STRING_FINAL,
        _ => return None,
    })
}

/// Resolve a compact array header's element-kind byte to the array kind.
pub fn array_kind_for_element_tag(tag: u8) -> Option<TypeKind> {
    Some(match tag {
        TRUE => TypeKind::BoolArray,
        INT => TypeKind::IntArray,
        LONG => TypeKind::LongArray,
        DOUBLE => TypeKind::DoubleArray,
        STRING_FINAL => TypeKind::StringArray,
        _ => return None,
    })
}
