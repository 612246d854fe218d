//! Reference tables for graph sharing.
//!
//! Both directions keep one table per message. Decode-side slots are
//! inserted the instant a composite header is parsed, strictly before the
//! children decode. That ordering is what lets an element backreference its
//! own still-being-built container. Encode-side lookup is by handle identity,
//! never equality: equal-but-distinct composites each encode in full once.

use std::collections::HashMap;

use wirecall_value::{TypeKind, Value};

use crate::error::{CodecError, Result};

/// One decode-side reference slot.
#[derive(Debug, Clone)]
pub enum RefSlot {
    /// A registered composite handle. Backreferencing it is always legal,
    /// even while its contents are still being filled (recursive lists/maps).
    Ready(Value),
    /// A fixed-element array still being materialized. Primitive elements
    /// cannot semantically contain object references, so a backreference to
    /// a pending slot is a protocol error, not a convention.
    Pending(TypeKind),
}

/// Append-only decode-side reference table, indexed by insertion order.
///
/// Entries are never removed individually; the whole table resets at a
/// message boundary.
#[derive(Debug, Default)]
pub struct RefTable {
    slots: Vec<RefSlot>,
}

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a composite handle; returns its reference index.
    pub fn add_ready(&mut self, value: Value) -> usize {
        self.slots.push(RefSlot::Ready(value));
        self.slots.len() - 1
    }

    /// Reserve a slot for a fixed-element array under construction.
    pub fn add_pending(&mut self, kind: TypeKind) -> usize {
        self.slots.push(RefSlot::Pending(kind));
        self.slots.len() - 1
    }

    /// Rebind a slot to its finished value.
    pub fn resolve(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = RefSlot::Ready(value);
        }
    }

    /// Resolve a backreference index to the registered handle.
    pub fn lookup(&self, index: usize) -> Result<Value> {
        match self.slots.get(index) {
            Some(RefSlot::Ready(value)) => Ok(value.clone()),
            Some(RefSlot::Pending(kind)) => Err(CodecError::Protocol(format!(
                "backreference {index} targets a {} array still being decoded",
                kind.wire_name()
            ))),
            None => Err(CodecError::Protocol(format!(
                "backreference {index} out of range ({} entries)",
                self.slots.len()
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Clear all slots at a message boundary.
    pub fn reset(&mut self) {
        self.slots.clear();
    }
}

/// Encode-side mirror: first-sight interning of composite handles.
///
/// Interned handles are held alive for the message's lifetime. Identity is
/// the allocation address, so letting an interned allocation free would let
/// a later, never-encoded composite land on the same address and go out as
/// a bogus backreference.
#[derive(Debug, Default)]
pub struct EncodeRefs {
    seen: HashMap<usize, usize>,
    handles: Vec<Value>,
}

impl EncodeRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record first sight of a composite. `Ok(index)` on first sight,
    /// `Err(index)` when the identical handle was already interned.
    pub fn intern(&mut self, value: &Value) -> Option<std::result::Result<usize, usize>> {
        let id = value.composite_id()?;
        match self.seen.get(&id) {
            Some(&index) => Some(Err(index)),
            None => {
                let index = self.handles.len();
                self.seen.insert(id, index);
                self.handles.push(value.clone());
                Some(Ok(index))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
        self.handles.clear();
    }
}
