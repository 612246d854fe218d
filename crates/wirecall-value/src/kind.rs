/// The closed set of built-in wire kinds.
///
/// Every built-in codec is addressed by one of these variants; custom map
/// types extend the set through the registry by name only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Null,
    Bool,
    Int,
    Long,
    Double,
    Char,
    String,
    Date,
    Bytes,
    List,
    Map,
    Object,
    BoolArray,
    IntArray,
    LongArray,
    DoubleArray,
    StringArray,
    ObjectArray,
}

impl TypeKind {
    /// The name this kind carries in a wire type header.
    pub fn wire_name(self) -> &'static str {
        match self {
            TypeKind::Null => "null",
            TypeKind::Bool => "boolean",
            TypeKind::Int => "int",
            TypeKind::Long => "long",
            TypeKind::Double => "double",
            TypeKind::Char => "char",
            TypeKind::String => "string",
            TypeKind::Date => "date",
            TypeKind::Bytes => "binary",
            TypeKind::List => "list",
            TypeKind::Map => "map",
            TypeKind::Object => "object",
            TypeKind::BoolArray => "[boolean",
            TypeKind::IntArray => "[int",
            TypeKind::LongArray => "[long",
            TypeKind::DoubleArray => "[double",
            TypeKind::StringArray => "[string",
            TypeKind::ObjectArray => "[object",
        }
    }

    /// Resolve a wire type name to a built-in kind.
    pub fn from_wire_name(name: &str) -> Option<TypeKind> {
        Some(match name {
            "null" => TypeKind::Null,
            "boolean" => TypeKind::Bool,
            "int" => TypeKind::Int,
            "long" => TypeKind::Long,
            "double" => TypeKind::Double,
            "char" => TypeKind::Char,
            "string" => TypeKind::String,
            "date" => TypeKind::Date,
            "binary" => TypeKind::Bytes,
            "list" => TypeKind::List,
            "map" => TypeKind::Map,
            "object" => TypeKind::Object,
            "[boolean" => TypeKind::BoolArray,
            "[int" => TypeKind::IntArray,
            "[long" => TypeKind::LongArray,
            "[double" => TypeKind::DoubleArray,
            "[string" => TypeKind::StringArray,
            "[object" => TypeKind::ObjectArray,
            _ => return None,
        })
    }

    /// True for the fixed-element array kinds (compact-form eligible,
    /// excluding `ObjectArray`).
    pub fn is_primitive_array(self) -> bool {
        matches!(
            self,
            TypeKind::BoolArray
                | TypeKind::IntArray
                | TypeKind::LongArray
                | TypeKind::DoubleArray
                | TypeKind::StringArray
        )
    }

    /// True for any array kind.
    pub fn is_array(self) -> bool {
        self.is_primitive_array() || self == TypeKind::ObjectArray
    }

    /// The element kind of an array kind.
    pub fn element_kind(self) -> Option<TypeKind> {
        Some(match self {
            TypeKind::BoolArray => TypeKind::Bool,
            TypeKind::IntArray => TypeKind::Int,
            TypeKind::LongArray => TypeKind::Long,
            TypeKind::DoubleArray => TypeKind::Double,
            TypeKind::StringArray => TypeKind::String,
            TypeKind::ObjectArray => TypeKind::Object,
            _ => return None,
        })
    }

    /// The array kind whose elements are `self`, if one exists.
    pub fn array_of(self) -> Option<TypeKind> {
        Some(match self {
            TypeKind::Bool => TypeKind::BoolArray,
            TypeKind::Int => TypeKind::IntArray,
            TypeKind::Long => TypeKind::LongArray,
            TypeKind::Double => TypeKind::DoubleArray,
            TypeKind::String => TypeKind::StringArray,
            TypeKind::Object => TypeKind::ObjectArray,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in [
            TypeKind::Null,
            TypeKind::Bool,
            TypeKind::Int,
            TypeKind::Long,
            TypeKind::Double,
            TypeKind::Char,
            TypeKind::String,
            TypeKind::Date,
            TypeKind::Bytes,
            TypeKind::List,
            TypeKind::Map,
            TypeKind::Object,
            TypeKind::BoolArray,
            TypeKind::IntArray,
            TypeKind::LongArray,
            TypeKind::DoubleArray,
            TypeKind::StringArray,
            TypeKind::ObjectArray,
        ] {
            assert_eq!(TypeKind::from_wire_name(kind.wire_name()), Some(kind));
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(TypeKind::from_wire_name("com.example.Custom"), None);
        assert_eq!(TypeKind::from_wire_name(""), None);
    }

    #[test]
    fn array_element_relationships() {
        assert_eq!(TypeKind::IntArray.element_kind(), Some(TypeKind::Int));
        assert_eq!(TypeKind::Int.array_of(), Some(TypeKind::IntArray));
        assert!(TypeKind::StringArray.is_primitive_array());
        assert!(!TypeKind::ObjectArray.is_primitive_array());
        assert!(TypeKind::ObjectArray.is_array());
    }
}
