/// Errors that can occur during type registration and resolution.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No codec is registered for the given wire type name.
    #[error("no codec registered for type {0:?}")]
    UnknownType(String),

    /// A custom type name collided with an existing registration.
    #[error("type {0:?} is already registered")]
    DuplicateType(String),

    /// A custom type name shadowed a built-in wire name.
    #[error("type {0:?} is a reserved built-in name")]
    ReservedName(String),

    /// A custom codec rejected a decoded body.
    #[error("custom codec for {type_name:?} failed: {message}")]
    ReviveFailed { type_name: String, message: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
