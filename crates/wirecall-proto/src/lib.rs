//! Message envelopes over the streaming codec.
//!
//! A connection carries whole messages: a call (`c` version, headers, method,
//! arguments, `z`) travels one way and a reply (`r` version, result or fault,
//! `z`) comes back. This crate owns the envelope structs and the read/write
//! helpers that drive [`wirecall_codec::Decoder`] and
//! [`wirecall_codec::Encoder`] through a full message.

pub mod call;
pub mod reply;

pub use call::{read_call, write_call, Call};
pub use reply::{read_reply, write_fault_reply, write_reply, Reply};

pub use wirecall_codec::{CodecError, Result};
