//! Tag-driven streaming codec for the wirecall wire protocol.
//!
//! This is the core value-add layer of wirecall. Every value on the wire
//! starts with a single-byte tag; strings and byte arrays span length-prefixed
//! chunks; composite values register in an append-only reference table the
//! moment their header is parsed, so shared and cyclic graphs survive the
//! round trip with identity intact.
//!
//! One [`Decoder`] and one [`Encoder`] (each with its own reference table)
//! serve one in-flight message on one connection. Neither is thread-safe;
//! blocking happens only at the byte-source boundary.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod refs;
pub mod tags;

pub use decoder::{BytesReader, Decoder, RemoteResolver};
pub use encoder::Encoder;
pub use error::{CodecError, Result};
pub use refs::{EncodeRefs, RefSlot, RefTable};
pub use tags::{code_name, CHUNK_LIMIT, COMPACT_ARRAY_MAX_LEN, PROTOCOL_VERSION};
