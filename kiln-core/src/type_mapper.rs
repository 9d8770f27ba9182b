//! Mapping from source types to target value types.

use crate::module::ValueType;
use crate::types::Type;

/// Converts source types into target value types.
pub trait TypeMapper {
    /// Type of a value slot (parameter, local, global). Total over [`Type`].
    fn transform_type(&self, ty: &Type) -> ValueType;

    /// Type in return position; `None` when the function yields nothing.
    fn result_type(&self, ty: &Type) -> Option<ValueType>;

    /// Whether an expression of type `ty` leaves a value on the stack.
    fn produces_value(&self, ty: &Type) -> bool {
        self.result_type(ty).is_some()
    }
}

/// Default mapping for the WebAssembly target.
///
/// Booleans are `i32`. Unit, Never, classes and function values are host
/// references when stored, and Unit/Never produce no value when returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasmTypeMapper;

impl TypeMapper for WasmTypeMapper {
    fn transform_type(&self, ty: &Type) -> ValueType {
        match ty {
            Type::I32 | Type::Bool => ValueType::I32,
            Type::I64 => ValueType::I64,
            Type::F32 => ValueType::F32,
            Type::F64 => ValueType::F64,
            Type::Unit | Type::Never | Type::Named(_) | Type::Function { .. } => ValueType::Ref,
        }
    }

    fn result_type(&self, ty: &Type) -> Option<ValueType> {
        match ty {
            Type::Unit | Type::Never => None,
            other => Some(self.transform_type(other)),
        }
    }
}
