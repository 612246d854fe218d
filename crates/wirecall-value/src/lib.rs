//! Value model for the wirecall wire protocol.
//!
//! A decoded message is a tree (or graph: backreferences allow sharing and
//! cycles) of [`Value`] nodes. Composite variants hold shared handles so that
//! a graph decoded from the wire keeps the same identity structure it had on
//! the encoding side.
//!
//! This crate is the dependency root of the workspace: it knows nothing about
//! tags, chunks, or framing.

pub mod fault;
pub mod kind;
pub mod value;

pub use fault::Fault;
pub use kind::TypeKind;
pub use value::{ArrayData, ArrayRef, List, ListRef, Map, MapRef, Remote, Value};
