//! Type-string vocabulary used by node definitions.
//!
//! A node definition names its value type with a short string: a scalar
//! (`string`, `uint`, ...), an array (`float32[]`) or a matrix
//! (`uint8[,]`). Strings outside the fixed vocabulary are offered to the
//! registered [`TypeExtension`]s in order before the definition fails.

use std::sync::Arc;

use phf::phf_map;

use crate::error::{Error, Result};
use crate::value::{ElementType, PrimitiveType};

static SCALAR_TYPES: phf::Map<&'static str, PrimitiveType> = phf_map! {
    "boolean" => PrimitiveType::Boolean,
    "bool" => PrimitiveType::Boolean,
    "int" => PrimitiveType::Int,
    "integer" => PrimitiveType::Int,
    "sint" => PrimitiveType::Int,
    "uint" => PrimitiveType::UInt,
    "unsigned" => PrimitiveType::UInt,
    "float" => PrimitiveType::Float,
    "single" => PrimitiveType::Float,
    "double" => PrimitiveType::Double,
    "datetime" => PrimitiveType::DateTime,
    "timestamp" => PrimitiveType::DateTime,
    "string" => PrimitiveType::String,
    "text" => PrimitiveType::String,
};

static ELEMENT_TYPES: phf::Map<&'static str, ElementType> = phf_map! {
    "int8" => ElementType::I8,
    "sbyte" => ElementType::I8,
    "uint8" => ElementType::U8,
    "byte" => ElementType::U8,
    "int16" => ElementType::I16,
    "uint16" => ElementType::U16,
    "int32" => ElementType::I32,
    "uint32" => ElementType::U32,
    "int64" => ElementType::I64,
    "uint64" => ElementType::U64,
    "float32" => ElementType::F32,
    "float64" => ElementType::F64,
};

/// Pluggable fallback for type strings the built-in vocabulary lacks.
pub trait TypeExtension: Send + Sync {
    /// Map `type_name` (already lower-cased and trimmed) to a primitive type,
    /// or decline with `None`.
    fn resolve(&self, type_name: &str) -> Option<PrimitiveType>;
}

/// A single name-to-type mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAlias {
    name: String,
    ty: PrimitiveType,
}

impl TypeAlias {
    pub fn new(name: impl Into<String>, ty: PrimitiveType) -> Self {
        TypeAlias {
            name: name.into().to_ascii_lowercase(),
            ty,
        }
    }
}

impl TypeExtension for TypeAlias {
    fn resolve(&self, type_name: &str) -> Option<PrimitiveType> {
        (self.name == type_name).then_some(self.ty)
    }
}

/// Parse a type string against the fixed vocabulary only.
pub fn builtin_type(type_name: &str) -> Option<PrimitiveType> {
    let name = type_name.trim().to_ascii_lowercase();
    lookup(&name)
}

fn lookup(name: &str) -> Option<PrimitiveType> {
    if let Some(ty) = SCALAR_TYPES.get(name) {
        return Some(*ty);
    }
    if let Some(element) = name.strip_suffix("[,]") {
        return ELEMENT_TYPES.get(element.trim_end()).map(|e| PrimitiveType::Matrix(*e));
    }
    if let Some(element) = name.strip_suffix("[]") {
        return ELEMENT_TYPES.get(element.trim_end()).map(|e| PrimitiveType::Array(*e));
    }
    None
}

/// Parse a type string, consulting `extensions` in order when the built-in
/// vocabulary has no match.
pub fn parse_type(type_name: &str, extensions: &[Arc<dyn TypeExtension>]) -> Result<PrimitiveType> {
    let name = type_name.trim().to_ascii_lowercase();
    if let Some(ty) = lookup(&name) {
        return Ok(ty);
    }
    extensions
        .iter()
        .find_map(|ext| ext.resolve(&name))
        .ok_or_else(|| Error::format(format!("unrecognized type string {type_name:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_vocabulary() {
        assert_eq!(builtin_type("string"), Some(PrimitiveType::String));
        assert_eq!(builtin_type("  UInt "), Some(PrimitiveType::UInt));
        assert_eq!(builtin_type("bool"), Some(PrimitiveType::Boolean));
        assert_eq!(builtin_type("timestamp"), Some(PrimitiveType::DateTime));
    }

    #[test]
    fn test_array_and_matrix_suffixes() {
        assert_eq!(builtin_type("float32[]"), Some(PrimitiveType::Array(ElementType::F32)));
        assert_eq!(builtin_type("byte[,]"), Some(PrimitiveType::Matrix(ElementType::U8)));
        assert_eq!(builtin_type("string[]"), None);
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for ty in [
            PrimitiveType::Boolean,
            PrimitiveType::Int,
            PrimitiveType::UInt,
            PrimitiveType::Float,
            PrimitiveType::Double,
            PrimitiveType::DateTime,
            PrimitiveType::String,
            PrimitiveType::Array(ElementType::I64),
            PrimitiveType::Matrix(ElementType::U16),
        ] {
            assert_eq!(builtin_type(&ty.to_string()), Some(ty));
        }
    }

    #[test]
    fn test_extensions_consulted_in_order() {
        let extensions: Vec<Arc<dyn TypeExtension>> = vec![
            Arc::new(TypeAlias::new("Money", PrimitiveType::Int)),
            Arc::new(TypeAlias::new("money", PrimitiveType::Double)),
        ];
        assert_eq!(parse_type("money", &extensions).unwrap(), PrimitiveType::Int);
        // Built-ins win over extensions.
        let shadow: Vec<Arc<dyn TypeExtension>> =
            vec![Arc::new(TypeAlias::new("string", PrimitiveType::Int))];
        assert_eq!(parse_type("string", &shadow).unwrap(), PrimitiveType::String);
    }

    #[test]
    fn test_unknown_type_is_format_error() {
        let err = parse_type("quaternion", &[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
    }
}
