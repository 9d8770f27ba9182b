//! Target instructions addressable from source code.
//!
//! A function annotated with `WasmOp("<NAME>")` has no body of its own: every
//! call to it is replaced by the instruction registered here under `<NAME>`.
//! The back end never emits such functions.

use crate::module::ValueType;

/// Numeric instruction that can be inlined at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericOp {
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32RemS,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LeS,
    I32GtS,
    I32GeS,
    I32Eqz,
    I32WrapI64,
    I64Add,
    I64Sub,
    I64Mul,
    I64Eq,
    I64LtS,
    I64ExtendI32S,
    F32Add,
    F32Mul,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Lt,
    F64ConvertI32S,
}

/// Metadata about a single intrinsic instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrinsicDescriptor {
    /// Spelling used in the `WasmOp` annotation.
    pub name: &'static str,
    pub op: NumericOp,
    /// Operand types, in stack order.
    pub params: &'static [ValueType],
    pub result: ValueType,
}

use ValueType::{F32, F64, I32, I64};

const fn op(
    name: &'static str,
    op: NumericOp,
    params: &'static [ValueType],
    result: ValueType,
) -> IntrinsicDescriptor {
    IntrinsicDescriptor {
        name,
        op,
        params,
        result,
    }
}

/// The complete list of intrinsics known to the back end.
pub const INTRINSICS: &[IntrinsicDescriptor] = &[
    op("I32_ADD", NumericOp::I32Add, &[I32, I32], I32),
    op("I32_SUB", NumericOp::I32Sub, &[I32, I32], I32),
    op("I32_MUL", NumericOp::I32Mul, &[I32, I32], I32),
    op("I32_DIV_S", NumericOp::I32DivS, &[I32, I32], I32),
    op("I32_REM_S", NumericOp::I32RemS, &[I32, I32], I32),
    op("I32_AND", NumericOp::I32And, &[I32, I32], I32),
    op("I32_OR", NumericOp::I32Or, &[I32, I32], I32),
    op("I32_XOR", NumericOp::I32Xor, &[I32, I32], I32),
    op("I32_SHL", NumericOp::I32Shl, &[I32, I32], I32),
    op("I32_SHR_S", NumericOp::I32ShrS, &[I32, I32], I32),
    op("I32_EQ", NumericOp::I32Eq, &[I32, I32], I32),
    op("I32_NE", NumericOp::I32Ne, &[I32, I32], I32),
    op("I32_LT_S", NumericOp::I32LtS, &[I32, I32], I32),
    op("I32_LE_S", NumericOp::I32LeS, &[I32, I32], I32),
    op("I32_GT_S", NumericOp::I32GtS, &[I32, I32], I32),
    op("I32_GE_S", NumericOp::I32GeS, &[I32, I32], I32),
    op("I32_EQZ", NumericOp::I32Eqz, &[I32], I32),
    op("I32_WRAP_I64", NumericOp::I32WrapI64, &[I64], I32),
    op("I64_ADD", NumericOp::I64Add, &[I64, I64], I64),
    op("I64_SUB", NumericOp::I64Sub, &[I64, I64], I64),
    op("I64_MUL", NumericOp::I64Mul, &[I64, I64], I64),
    op("I64_EQ", NumericOp::I64Eq, &[I64, I64], I32),
    op("I64_LT_S", NumericOp::I64LtS, &[I64, I64], I32),
    op("I64_EXTEND_I32_S", NumericOp::I64ExtendI32S, &[I32], I64),
    op("F32_ADD", NumericOp::F32Add, &[F32, F32], F32),
    op("F32_MUL", NumericOp::F32Mul, &[F32, F32], F32),
    op("F64_ADD", NumericOp::F64Add, &[F64, F64], F64),
    op("F64_SUB", NumericOp::F64Sub, &[F64, F64], F64),
    op("F64_MUL", NumericOp::F64Mul, &[F64, F64], F64),
    op("F64_DIV", NumericOp::F64Div, &[F64, F64], F64),
    op("F64_LT", NumericOp::F64Lt, &[F64, F64], I32),
    op("F64_CONVERT_I32_S", NumericOp::F64ConvertI32S, &[I32], F64),
];

/// Look up an intrinsic by its annotation spelling.
///
/// The search is linear over `INTRINSICS` because the table is small.
pub fn find_intrinsic(name: &str) -> Option<&'static IntrinsicDescriptor> {
    INTRINSICS.iter().find(|d| d.name == name)
}
