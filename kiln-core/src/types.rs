//! Source-level types carried by the IR.
//!
//! These are the types the front end resolved; code generation never
//! inspects them directly but goes through a [`crate::type_mapper::TypeMapper`].

use serde::{Deserialize, Serialize};

/// Represents the types of values and expressions in the IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    // Built-in primitive types
    I32,
    I64,
    F32,
    F64,
    Bool,
    Unit,
    /// Bottom type used for expressions that never return
    /// (return, break, continue, etc.).
    Never,

    /// User-defined class types, referenced by fully qualified name.
    Named(String),

    /// Function types: (T1, ..., Tn) -> R.
    Function { params: Vec<Type>, result: Box<Type> },
}

impl Type {
    /// Returns true if this type is the Never type.
    pub fn is_never(&self) -> bool {
        matches!(self, Type::Never)
    }

    /// Returns true if this type is the Unit type.
    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Unit)
    }

    /// Returns true for the primitive numeric and boolean types.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::I32 | Type::I64 | Type::F32 | Type::F64 | Type::Bool
        )
    }

    pub fn named(name: impl Into<String>) -> Type {
        Type::Named(name.into())
    }

    pub fn function(params: Vec<Type>, result: Type) -> Type {
        Type::Function {
            params,
            result: Box::new(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_primitive_types() {
        assert!(Type::I32.is_primitive());
        assert!(Type::Bool.is_primitive());
        assert!(!Type::Unit.is_primitive());
        assert!(!Type::named("demo.Box").is_primitive());
        assert!(Type::Never.is_never());
        assert!(Type::Unit.is_unit());
    }

    #[test]
    fn deserializes_function_type_from_json() {
        let ty: Type = serde_json::from_str(r#"{"Function":{"params":["I32"],"result":"Unit"}}"#)
            .expect("decode");
        assert_eq!(ty, Type::function(vec![Type::I32], Type::Unit));
    }
}
