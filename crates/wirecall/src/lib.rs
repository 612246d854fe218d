//! Self-describing binary RPC wire format with graph-preserving references.
//!
//! wirecall encodes method calls, replies, and arbitrary value graphs in a
//! compact tag-driven binary form. Every value announces its own type on the
//! wire, strings and byte arrays travel in bounded chunks, and composite
//! values share one reference table so aliased and cyclic graphs survive a
//! round trip with identity intact.
//!
//! # Crate Structure
//!
//! - [`value`] - the in-memory value model and fault type
//! - [`registry`] - wire type name resolution and custom map types
//! - [`codec`] - the streaming [`codec::Decoder`] and [`codec::Encoder`]
//! - [`proto`] - call and reply message envelopes

/// Re-export value types.
pub mod value {
    pub use wirecall_value::*;
}

/// Re-export registry types.
pub mod registry {
    pub use wirecall_registry::*;
}

/// Re-export codec types.
pub mod codec {
    pub use wirecall_codec::*;
}

/// Re-export envelope types.
pub mod proto {
    pub use wirecall_proto::*;
}
