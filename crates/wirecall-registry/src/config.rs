/// Controls type resolution behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// When true, a composite header naming an unregistered type is an error
    /// instead of falling back to the generic list/map codec.
    pub strict_types: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_types: false,
        }
    }
}
