use std::collections::HashMap;
use std::sync::Arc;

use wirecall_value::{Map, TypeKind, Value};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

/// A caller-registered codec for a named map type.
///
/// The decoder reads the raw typed-map body first, then hands it to the
/// custom codec to revive into whatever canonical value the application
/// wants. The reverse direction lowers a value back into a map body, or
/// declines (`None`) when the value is not of this type.
pub trait CustomType: Send + Sync {
    /// The wire type name this codec owns.
    fn type_name(&self) -> &str;

    /// Revive a decoded map body into the canonical value.
    fn revive(&self, map: Map) -> Result<Value>;

    /// Lower a value into a map body for encoding, if it is of this type.
    fn lower(&self, value: &Value) -> Option<Map>;
}

/// Outcome of resolving a `V` (list/array) header type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListResolution {
    /// A fixed-element array kind (`[int`, `[string`, ...).
    Array(TypeKind),
    /// The generic open-ended list codec; the name (if any) rides along on
    /// the decoded value.
    Generic,
}

/// Outcome of resolving an `M` (map) header type name.
#[derive(Clone)]
pub enum MapResolution {
    /// A caller-registered custom codec.
    Custom(Arc<dyn CustomType>),
    /// The generic map codec; the name (if any) rides along.
    Generic,
}

/// Process-wide, read-only registry mapping wire type names to codecs.
///
/// Built once at startup from the static enumeration of built-in kinds plus
/// any custom registrations, then frozen. Safe for concurrent reads.
pub struct TypeRegistry {
    custom: HashMap<String, Arc<dyn CustomType>>,
    config: RegistryConfig,
}

impl TypeRegistry {
    /// A registry with only the built-in kinds.
    pub fn builtin() -> Self {
        RegistryBuilder::new().build()
    }

    /// Start building a registry with custom types.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Forward lookup of a built-in wire name.
    pub fn builtin_kind(&self, name: &str) -> Option<TypeKind> {
        TypeKind::from_wire_name(name)
    }

    /// Resolve a `V` header's type name to a list codec.
    ///
    /// Absent and unknown names both resolve to the generic list codec;
    /// unknown names error instead under `strict_types`.
    pub fn resolve_list(&self, type_name: Option<&str>) -> Result<ListResolution> {
        let Some(name) = type_name else {
            return Ok(ListResolution::Generic);
        };

        match TypeKind::from_wire_name(name) {
            Some(kind) if kind.is_array() => Ok(ListResolution::Array(kind)),
            Some(_) => Ok(ListResolution::Generic),
            None if self.config.strict_types => Err(RegistryError::UnknownType(name.to_string())),
            None => Ok(ListResolution::Generic),
        }
    }

    /// Resolve an `M` header's type name to a map codec.
    pub fn resolve_map(&self, type_name: Option<&str>) -> Result<MapResolution> {
        let Some(name) = type_name else {
            return Ok(MapResolution::Generic);
        };

        if let Some(custom) = self.custom.get(name) {
            return Ok(MapResolution::Custom(Arc::clone(custom)));
        }
        if TypeKind::from_wire_name(name).is_some() {
            return Ok(MapResolution::Generic);
        }
        if self.config.strict_types {
            return Err(RegistryError::UnknownType(name.to_string()));
        }
        Ok(MapResolution::Generic)
    }

    /// Reverse lookup: the codec kind that writes `value`.
    ///
    /// Walks most-specific to least-specific: exact array kind, then the
    /// object-array codec for arrays, then the generic composite codec.
    pub fn kind_for_value(&self, value: &Value) -> TypeKind {
        match value.type_kind() {
            kind if kind.is_primitive_array() => kind,
            TypeKind::ObjectArray => TypeKind::ObjectArray,
            kind => kind,
        }
    }

    /// Reverse lookup of a custom codec able to lower `value`.
    pub fn custom_for_value(&self, value: &Value) -> Option<(&str, Arc<dyn CustomType>)> {
        let type_name = match value {
            Value::Map(m) => m.borrow().type_name.clone()?,
            _ => return None,
        };
        let custom = self.custom.get(&type_name)?;
        Some((custom.type_name(), Arc::clone(custom)))
    }

    /// Names of all registered custom types, for diagnostics.
    pub fn custom_type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.custom.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Builder for [`TypeRegistry`]. Registration must complete before the first
/// decode/encode; the built registry is immutable.
pub struct RegistryBuilder {
    custom: HashMap<String, Arc<dyn CustomType>>,
    config: RegistryConfig,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            custom: HashMap::new(),
            config: RegistryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a custom map type codec.
    pub fn register(mut self, codec: Arc<dyn CustomType>) -> Result<Self> {
        let name = codec.type_name().to_string();
        if TypeKind::from_wire_name(&name).is_some() {
            return Err(RegistryError::ReservedName(name));
        }
        if self.custom.contains_key(&name) {
            return Err(RegistryError::DuplicateType(name));
        }
        self.custom.insert(name, codec);
        Ok(self)
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            custom: self.custom,
            config: self.config,
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point;

    impl CustomType for Point {
        fn type_name(&self) -> &str {
            "geo.Point"
        }

        fn revive(&self, map: Map) -> Result<Value> {
            let x = map.get_str("x").cloned();
            let y = map.get_str("y").cloned();
            match (x, y) {
                (Some(x), Some(y)) => Ok(Value::typed_map(
                    "geo.Point",
                    vec![(Value::from("x"), x), (Value::from("y"), y)],
                )),
                _ => Err(RegistryError::ReviveFailed {
                    type_name: "geo.Point".to_string(),
                    message: "missing coordinate".to_string(),
                }),
            }
        }

        fn lower(&self, value: &Value) -> Option<Map> {
            match value {
                Value::Map(m) if m.borrow().type_name.as_deref() == Some("geo.Point") => {
                    Some(m.borrow().clone())
                }
                _ => None,
            }
        }
    }

    #[test]
    fn builtin_array_names_resolve_to_array_codecs() {
        let registry = TypeRegistry::builtin();

        assert_eq!(
            registry.resolve_list(Some("[int")).unwrap(),
            ListResolution::Array(TypeKind::IntArray)
        );
        assert_eq!(
            registry.resolve_list(Some("[string")).unwrap(),
            ListResolution::Array(TypeKind::StringArray)
        );
        assert_eq!(
            registry.resolve_list(Some("[object")).unwrap(),
            ListResolution::Array(TypeKind::ObjectArray)
        );
    }

    #[test]
    fn absent_type_resolves_to_generic() {
        let registry = TypeRegistry::builtin();

        assert_eq!(registry.resolve_list(None).unwrap(), ListResolution::Generic);
        assert!(matches!(
            registry.resolve_map(None).unwrap(),
            MapResolution::Generic
        ));
    }

    #[test]
    fn unknown_name_falls_back_unless_strict() {
        let lenient = TypeRegistry::builtin();
        assert_eq!(
            lenient.resolve_list(Some("com.example.Widget")).unwrap(),
            ListResolution::Generic
        );

        let strict = TypeRegistry::builder()
            .with_config(RegistryConfig { strict_types: true })
            .build();
        assert!(matches!(
            strict.resolve_list(Some("com.example.Widget")),
            Err(RegistryError::UnknownType(_))
        ));
        assert!(matches!(
            strict.resolve_map(Some("com.example.Widget")),
            Err(RegistryError::UnknownType(_))
        ));
    }

    #[test]
    fn custom_type_resolution() {
        let registry = TypeRegistry::builder()
            .register(Arc::new(Point))
            .unwrap()
            .build();

        assert!(matches!(
            registry.resolve_map(Some("geo.Point")).unwrap(),
            MapResolution::Custom(_)
        ));
        assert_eq!(registry.custom_type_names(), vec!["geo.Point"]);

        let value = Value::typed_map(
            "geo.Point",
            vec![
                (Value::from("x"), Value::Int(1)),
                (Value::from("y"), Value::Int(2)),
            ],
        );
        let (name, codec) = registry.custom_for_value(&value).unwrap();
        assert_eq!(name, "geo.Point");
        assert!(codec.lower(&value).is_some());
    }

    #[test]
    fn builtin_names_are_reserved() {
        struct Shadow;
        impl CustomType for Shadow {
            fn type_name(&self) -> &str {
                "int"
            }
            fn revive(&self, _map: Map) -> Result<Value> {
                Ok(Value::Null)
            }
            fn lower(&self, _value: &Value) -> Option<Map> {
                None
            }
        }

        assert!(matches!(
            TypeRegistry::builder().register(Arc::new(Shadow)),
            Err(RegistryError::ReservedName(_))
        ));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let builder = TypeRegistry::builder().register(Arc::new(Point)).unwrap();
        assert!(matches!(
            builder.register(Arc::new(Point)),
            Err(RegistryError::DuplicateType(_))
        ));
    }
}
