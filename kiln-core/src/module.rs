//! Target module model produced by lowering.
//!
//! Instructions are symbolic: locals, labels, globals and functions are
//! referenced by the names the name tables handed out. Index resolution
//! happens only when the module is encoded (see [`crate::codegen_wasm`]).

use crate::intrinsics::NumericOp;

/// Target value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    /// Nullable host reference.
    Ref,
}

/// Host symbol a function is imported from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub module: String,
    pub name: String,
}

/// A named parameter or local slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WasmLocal {
    pub name: String,
    pub ty: ValueType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),
    RefNull,
    LocalGet(String),
    LocalSet(String),
    GlobalGet(String),
    GlobalSet(String),
    Call(String),
    Numeric(NumericOp),
    /// Opens a block whose end is the branch target of `label`.
    Block(Option<String>),
    /// Opens a loop whose start is the branch target of `label`.
    Loop(Option<String>),
    If(Option<ValueType>),
    Else,
    End,
    Br(String),
    BrIf(String),
    Return,
    Drop,
    Unreachable,
}

impl Instr {
    /// The default value every slot of type `ty` starts with.
    pub fn zero_of(ty: ValueType) -> Instr {
        match ty {
            ValueType::I32 => Instr::I32Const(0),
            ValueType::I64 => Instr::I64Const(0),
            ValueType::F32 => Instr::F32Const(0.0),
            ValueType::F64 => Instr::F64Const(0.0),
            ValueType::Ref => Instr::RefNull,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WasmFunction {
    pub name: String,
    pub params: Vec<WasmLocal>,
    pub result: Option<ValueType>,
    pub locals: Vec<WasmLocal>,
    pub instructions: Vec<Instr>,
    pub import: Option<ImportRef>,
    pub exported: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WasmGlobal {
    pub name: String,
    pub ty: ValueType,
    pub mutable: bool,
    pub init: Instr,
}

/// Output of lowering one declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleField {
    Function(WasmFunction),
    Global(WasmGlobal),
    /// A declaration that expands into several flat fields.
    Group(Vec<ModuleField>),
}

impl ModuleField {
    /// Every function in this field, groups flattened.
    pub fn functions(&self) -> Vec<&WasmFunction> {
        match self {
            ModuleField::Function(f) => vec![f],
            ModuleField::Global(_) => Vec::new(),
            ModuleField::Group(fields) => fields.iter().flat_map(ModuleField::functions).collect(),
        }
    }

    /// Every global in this field, groups flattened.
    pub fn globals(&self) -> Vec<&WasmGlobal> {
        match self {
            ModuleField::Function(_) => Vec::new(),
            ModuleField::Global(g) => vec![g],
            ModuleField::Group(fields) => fields.iter().flat_map(ModuleField::globals).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WasmModule {
    /// Import stubs; they precede `functions` in the function index space.
    pub imports: Vec<WasmFunction>,
    pub functions: Vec<WasmFunction>,
    pub globals: Vec<WasmGlobal>,
    /// Name of the function run on instantiation.
    pub start: Option<String>,
}

impl WasmModule {
    pub fn new() -> Self {
        WasmModule::default()
    }

    pub fn add_field(&mut self, field: ModuleField) {
        match field {
            ModuleField::Function(f) => self.functions.push(f),
            ModuleField::Global(g) => self.globals.push(g),
            ModuleField::Group(fields) => {
                for field in fields {
                    self.add_field(field);
                }
            }
        }
    }

    pub fn function(&self, name: &str) -> Option<&WasmFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn import(&self, name: &str) -> Option<&WasmFunction> {
        self.imports.iter().find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&WasmGlobal> {
        self.globals.iter().find(|g| g.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str) -> WasmFunction {
        WasmFunction {
            name: name.to_string(),
            params: Vec::new(),
            result: None,
            locals: Vec::new(),
            instructions: Vec::new(),
            import: None,
            exported: false,
        }
    }

    #[test]
    fn add_field_flattens_nested_groups() {
        let global = WasmGlobal {
            name: "g".into(),
            ty: ValueType::I64,
            mutable: true,
            init: Instr::zero_of(ValueType::I64),
        };
        let field = ModuleField::Group(vec![
            ModuleField::Function(function("a")),
            ModuleField::Group(vec![
                ModuleField::Function(function("b")),
                ModuleField::Global(global),
            ]),
        ]);
        assert_eq!(field.functions().len(), 2);
        assert_eq!(field.globals().len(), 1);

        let mut module = WasmModule::new();
        module.add_field(field);
        assert!(module.function("a").is_some());
        assert!(module.function("b").is_some());
        assert_eq!(module.global("g").map(|g| &g.init), Some(&Instr::I64Const(0)));
    }
}
