//! WASM backend.
//!
//! Encodes a lowered [`WasmModule`] into a binary module with the
//! `wasm-encoder` crate. Lowering hands over symbolic instructions; this is
//! where names become indices:
//!
//! - functions: imports first, then defined functions, in module order;
//! - globals: module order;
//! - locals: parameters first, then declared locals;
//! - labels: relative depth of the enclosing block, loop or if that
//!   carries the label.
//!
//! Function signatures are deduplicated in the type section.

use std::collections::HashMap;

use tracing::debug;
use wasm_encoder::{
    AbstractHeapType, BlockType, CodeSection, ConstExpr, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, HeapType, ImportSection, Instruction,
    Module, RefType, StartSection, TypeSection, ValType,
};

use crate::error::CoreError;
use crate::intrinsics::NumericOp;
use crate::module::{Instr, ValueType, WasmFunction, WasmGlobal, WasmModule};

pub fn encode_module(module: &WasmModule) -> Result<Vec<u8>, CoreError> {
    let mut types = TypeSection::new();
    let mut signatures: HashMap<(Vec<ValueType>, Option<ValueType>), u32> = HashMap::new();
    let mut type_of = |function: &WasmFunction| -> u32 {
        let params: Vec<ValueType> = function.params.iter().map(|p| p.ty).collect();
        let key = (params, function.result);
        if let Some(index) = signatures.get(&key) {
            return *index;
        }
        let index = types.len();
        types.ty().function(
            key.0.iter().map(|ty| val_type(*ty)),
            key.1.iter().map(|ty| val_type(*ty)),
        );
        signatures.insert(key, index);
        index
    };

    let mut function_indices = HashMap::new();
    let mut import_types = Vec::with_capacity(module.imports.len());
    for (index, import) in module.imports.iter().enumerate() {
        function_indices.insert(import.name.as_str(), index as u32);
        import_types.push(type_of(import));
    }
    let mut defined_types = Vec::with_capacity(module.functions.len());
    for (offset, function) in module.functions.iter().enumerate() {
        let index = (module.imports.len() + offset) as u32;
        function_indices.insert(function.name.as_str(), index);
        defined_types.push(type_of(function));
    }
    let global_indices: HashMap<&str, u32> = module
        .globals
        .iter()
        .enumerate()
        .map(|(index, global)| (global.name.as_str(), index as u32))
        .collect();

    let mut wasm = Module::new();
    wasm.section(&types);

    if !module.imports.is_empty() {
        let mut imports = ImportSection::new();
        for (import, type_index) in module.imports.iter().zip(&import_types) {
            let binding = import
                .import
                .as_ref()
                .ok_or_else(|| CoreError::unsupported("import stub without a host binding", import))?;
            imports.import(&binding.module, &binding.name, EntityType::Function(*type_index));
        }
        wasm.section(&imports);
    }

    let mut functions = FunctionSection::new();
    for type_index in &defined_types {
        functions.function(*type_index);
    }
    wasm.section(&functions);

    if !module.globals.is_empty() {
        let mut globals = GlobalSection::new();
        for global in &module.globals {
            globals.global(
                GlobalType {
                    val_type: val_type(global.ty),
                    mutable: global.mutable,
                    shared: false,
                },
                &const_expr(global)?,
            );
        }
        wasm.section(&globals);
    }

    let mut exports = ExportSection::new();
    for function in module.functions.iter().filter(|f| f.exported) {
        exports.export(&function.name, ExportKind::Func, function_indices[function.name.as_str()]);
    }
    if !exports.is_empty() {
        wasm.section(&exports);
    }

    if let Some(start) = &module.start {
        let function_index = *function_indices
            .get(start.as_str())
            .ok_or_else(|| CoreError::unresolved("start function", start))?;
        wasm.section(&StartSection { function_index });
    }

    let mut code = CodeSection::new();
    for function in &module.functions {
        debug!(function = %function.name, instructions = function.instructions.len(), "encoding function body");
        let body = FunctionEncoder {
            function_indices: &function_indices,
            global_indices: &global_indices,
            locals: function
                .params
                .iter()
                .chain(&function.locals)
                .enumerate()
                .map(|(index, local)| (local.name.as_str(), index as u32))
                .collect(),
            labels: Vec::new(),
        }
        .encode(function)?;
        code.function(&body);
    }
    wasm.section(&code);

    Ok(wasm.finish())
}

fn val_type(ty: ValueType) -> ValType {
    match ty {
        ValueType::I32 => ValType::I32,
        ValueType::I64 => ValType::I64,
        ValueType::F32 => ValType::F32,
        ValueType::F64 => ValType::F64,
        ValueType::Ref => ValType::Ref(RefType::EXTERNREF),
    }
}

const EXTERN_HEAP: HeapType = HeapType::Abstract {
    shared: false,
    ty: AbstractHeapType::Extern,
};

fn const_expr(global: &WasmGlobal) -> Result<ConstExpr, CoreError> {
    Ok(match &global.init {
        Instr::I32Const(v) => ConstExpr::i32_const(*v),
        Instr::I64Const(v) => ConstExpr::i64_const(*v),
        Instr::F32Const(v) => ConstExpr::f32_const((*v).into()),
        Instr::F64Const(v) => ConstExpr::f64_const((*v).into()),
        Instr::RefNull => ConstExpr::ref_null(EXTERN_HEAP),
        other => {
            return Err(CoreError::unsupported(
                format!("global `{}` has a non-constant initializer {other:?}", global.name),
                global,
            ));
        }
    })
}

struct FunctionEncoder<'m> {
    function_indices: &'m HashMap<&'m str, u32>,
    global_indices: &'m HashMap<&'m str, u32>,
    locals: HashMap<&'m str, u32>,
    /// Labels of the currently open structured instructions, innermost last.
    labels: Vec<Option<String>>,
}

impl FunctionEncoder<'_> {
    fn encode(mut self, function: &WasmFunction) -> Result<Function, CoreError> {
        let mut body =
            Function::new_with_locals_types(function.locals.iter().map(|local| val_type(local.ty)));
        for instr in &function.instructions {
            let encoded = self.instruction(instr)?;
            body.instruction(&encoded);
        }
        if !self.labels.is_empty() {
            return Err(CoreError::unsupported(
                format!("function `{}` leaves {} block(s) open", function.name, self.labels.len()),
                &function.instructions,
            ));
        }
        body.instruction(&Instruction::End);
        Ok(body)
    }

    fn instruction(&mut self, instr: &Instr) -> Result<Instruction<'static>, CoreError> {
        Ok(match instr {
            Instr::I32Const(v) => Instruction::I32Const(*v),
            Instr::I64Const(v) => Instruction::I64Const(*v),
            Instr::F32Const(v) => Instruction::F32Const((*v).into()),
            Instr::F64Const(v) => Instruction::F64Const((*v).into()),
            Instr::RefNull => Instruction::RefNull(EXTERN_HEAP),
            Instr::LocalGet(name) => Instruction::LocalGet(self.local(name)?),
            Instr::LocalSet(name) => Instruction::LocalSet(self.local(name)?),
            Instr::GlobalGet(name) => Instruction::GlobalGet(self.global(name)?),
            Instr::GlobalSet(name) => Instruction::GlobalSet(self.global(name)?),
            Instr::Call(name) => Instruction::Call(
                *self
                    .function_indices
                    .get(name.as_str())
                    .ok_or_else(|| CoreError::unresolved("function", name))?,
            ),
            Instr::Numeric(op) => numeric(*op),
            Instr::Block(label) => {
                self.labels.push(label.clone());
                Instruction::Block(BlockType::Empty)
            }
            Instr::Loop(label) => {
                self.labels.push(label.clone());
                Instruction::Loop(BlockType::Empty)
            }
            Instr::If(result) => {
                self.labels.push(None);
                Instruction::If(match result {
                    Some(ty) => BlockType::Result(val_type(*ty)),
                    None => BlockType::Empty,
                })
            }
            Instr::Else => Instruction::Else,
            Instr::End => {
                if self.labels.pop().is_none() {
                    return Err(CoreError::unsupported("`end` without an open block", instr));
                }
                Instruction::End
            }
            Instr::Br(label) => Instruction::Br(self.depth(label)?),
            Instr::BrIf(label) => Instruction::BrIf(self.depth(label)?),
            Instr::Return => Instruction::Return,
            Instr::Drop => Instruction::Drop,
            Instr::Unreachable => Instruction::Unreachable,
        })
    }

    fn local(&self, name: &str) -> Result<u32, CoreError> {
        self.locals
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::unresolved("local", name))
    }

    fn global(&self, name: &str) -> Result<u32, CoreError> {
        self.global_indices
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::unresolved("global", name))
    }

    fn depth(&self, label: &str) -> Result<u32, CoreError> {
        self.labels
            .iter()
            .rev()
            .position(|open| open.as_deref() == Some(label))
            .map(|depth| depth as u32)
            .ok_or_else(|| CoreError::unresolved("label", label))
    }
}

fn numeric(op: NumericOp) -> Instruction<'static> {
    match op {
        NumericOp::I32Add => Instruction::I32Add,
        NumericOp::I32Sub => Instruction::I32Sub,
        NumericOp::I32Mul => Instruction::I32Mul,
        NumericOp::I32DivS => Instruction::I32DivS,
        NumericOp::I32RemS => Instruction::I32RemS,
        NumericOp::I32And => Instruction::I32And,
        NumericOp::I32Or => Instruction::I32Or,
        NumericOp::I32Xor => Instruction::I32Xor,
        NumericOp::I32Shl => Instruction::I32Shl,
        NumericOp::I32ShrS => Instruction::I32ShrS,
        NumericOp::I32Eq => Instruction::I32Eq,
        NumericOp::I32Ne => Instruction::I32Ne,
        NumericOp::I32LtS => Instruction::I32LtS,
        NumericOp::I32LeS => Instruction::I32LeS,
        NumericOp::I32GtS => Instruction::I32GtS,
        NumericOp::I32GeS => Instruction::I32GeS,
        NumericOp::I32Eqz => Instruction::I32Eqz,
        NumericOp::I32WrapI64 => Instruction::I32WrapI64,
        NumericOp::I64Add => Instruction::I64Add,
        NumericOp::I64Sub => Instruction::I64Sub,
        NumericOp::I64Mul => Instruction::I64Mul,
        NumericOp::I64Eq => Instruction::I64Eq,
        NumericOp::I64LtS => Instruction::I64LtS,
        NumericOp::I64ExtendI32S => Instruction::I64ExtendI32S,
        NumericOp::F32Add => Instruction::F32Add,
        NumericOp::F32Mul => Instruction::F32Mul,
        NumericOp::F64Add => Instruction::F64Add,
        NumericOp::F64Sub => Instruction::F64Sub,
        NumericOp::F64Mul => Instruction::F64Mul,
        NumericOp::F64Div => Instruction::F64Div,
        NumericOp::F64Lt => Instruction::F64Lt,
        NumericOp::F64ConvertI32S => Instruction::F64ConvertI32S,
    }
}
