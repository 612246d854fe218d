//! Wire type resolution for the wirecall codec.
//!
//! Both decode directions consult a [`TypeRegistry`]: forward (a wire type
//! name arriving in a `M`/`V` header resolves to a codec) and reverse (a
//! runtime value shape resolves to the codec that writes it). The registry is
//! built once before traffic starts and is immutable afterwards; share it
//! as an `Arc` across sessions, no locking required.

pub mod config;
pub mod error;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use registry::{CustomType, ListResolution, MapResolution, RegistryBuilder, TypeRegistry};
