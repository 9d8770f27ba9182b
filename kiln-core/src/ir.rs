//! Typed declaration tree consumed by the back end.
//!
//! The IR is the resolved, type-checked form produced by earlier phases.
//! Every entity that code generation has to name (declarations, parameters,
//! local variables, loops) carries a [`DeclId`] so that name tables can key
//! on identity instead of on source spelling.
//!
//! Node kinds are closed enums. Traversals match them exhaustively and fall
//! back to [`walk_expr`] for the children they do not care about.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::module::ImportRef;
use crate::types::Type;

/// Name of the class-initialization routine.
pub const CLASS_INITIALIZER_NAME: &str = "<clinit>";

/// Name given to implicit `this` receivers.
pub const THIS_NAME: &str = "<this>";

/// Identity of a declaration, parameter, variable or loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub u32);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocator for fresh [`DeclId`]s.
///
/// `next` is `None` once the id space is used up; allocation then fails
/// instead of handing out an id twice.
#[derive(Debug, Clone)]
pub struct IdGen {
    next: Option<u32>,
}

impl IdGen {
    pub fn starting_at(next: u32) -> Self {
        IdGen { next: Some(next) }
    }

    /// An allocator that never hands out an id already used by `units`.
    pub fn after(units: &[FileUnit]) -> Self {
        let next = match units.iter().filter_map(FileUnit::max_id).max() {
            Some(max) => max.0.checked_add(1),
            None => Some(0),
        };
        IdGen { next }
    }

    pub fn fresh(&mut self) -> Result<DeclId, CoreError> {
        let id = self.next.ok_or(CoreError::IdSpaceExhausted)?;
        self.next = id.checked_add(1);
        Ok(DeclId(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Internal,
    Protected,
    Private,
}

/// Where a declaration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Origin {
    /// Written by the user.
    #[default]
    Defined,
    /// Virtual-dispatch thunk synthesized by the front end.
    Bridge,
    /// Accessor synthesized to reach otherwise inaccessible members.
    SyntheticAccessor,
    /// Forwarding member created by the facade pass.
    MultifileBridge,
    /// Any other compiler-generated declaration.
    Generated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FunctionKind {
    #[default]
    Simple,
    Constructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Object,
    /// Pure annotation type; never lowered.
    Annotation,
}

/// Metadata attached to declarations by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Annotation {
    /// The declaration must not reach the output module.
    ExcludedFromCodegen,
    /// The function is a target instruction; calls are inlined.
    WasmOp(String),
    /// The function is provided by the host under `module`/`name`.
    WasmImport {
        module: String,
        #[serde(default)]
        name: Option<String>,
    },
    /// The class is one part of the multifile facade `facade`.
    MultifilePart { facade: String },
}

/// Annotation queries shared by every annotated declaration.
pub trait Annotated {
    fn annotations(&self) -> &[Annotation];

    /// Name used when an annotation does not spell one out.
    fn source_name(&self) -> &str;

    fn is_excluded(&self) -> bool {
        self.annotations()
            .iter()
            .any(|a| matches!(a, Annotation::ExcludedFromCodegen))
    }

    fn wasm_op(&self) -> Option<&str> {
        self.annotations().iter().find_map(|a| match a {
            Annotation::WasmOp(op) => Some(op.as_str()),
            _ => None,
        })
    }

    fn import_binding(&self) -> Option<ImportRef> {
        self.annotations().iter().find_map(|a| match a {
            Annotation::WasmImport { module, name } => Some(ImportRef {
                module: module.clone(),
                name: name.clone().unwrap_or_else(|| self.source_name().to_string()),
            }),
            _ => None,
        })
    }

    fn multifile_facade(&self) -> Option<&str> {
        self.annotations().iter().find_map(|a| match a {
            Annotation::MultifilePart { facade } => Some(facade.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueParameter {
    pub id: DeclId,
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParameter {
    pub id: DeclId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessorRole {
    Getter,
    Setter,
}

impl fmt::Display for AccessorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessorRole::Getter => f.write_str("getter"),
            AccessorRole::Setter => f.write_str("setter"),
        }
    }
}

/// Back-reference from an accessor to the property that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessorLink {
    pub property: DeclId,
    pub role: AccessorRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub id: DeclId,
    pub name: String,
    #[serde(default)]
    pub kind: FunctionKind,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub origin: Origin,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Inherited member that exists only for dispatch bookkeeping.
    #[serde(default)]
    pub is_fake_override: bool,
    #[serde(default)]
    pub type_params: Vec<TypeParameter>,
    #[serde(default)]
    pub dispatch_receiver: Option<ValueParameter>,
    #[serde(default)]
    pub extension_receiver: Option<ValueParameter>,
    #[serde(default)]
    pub params: Vec<ValueParameter>,
    pub return_type: Type,
    #[serde(default)]
    pub body: Option<Expr>,
    #[serde(default)]
    pub accessor: Option<AccessorLink>,
    /// Link id of the declaration this one was duplicated from.
    #[serde(default)]
    pub copied_from: Option<DeclId>,
    #[serde(default)]
    pub parent: Option<DeclId>,
}

impl FunctionDecl {
    /// Identity used for output symbol naming.
    pub fn link_id(&self) -> DeclId {
        self.copied_from.unwrap_or(self.id)
    }

    pub fn is_class_initializer(&self) -> bool {
        self.name == CLASS_INITIALIZER_NAME
    }

    /// Receivers first, then value parameters.
    pub fn all_parameters(&self) -> impl Iterator<Item = &ValueParameter> {
        self.dispatch_receiver
            .iter()
            .chain(self.extension_receiver.iter())
            .chain(self.params.iter())
    }
}

impl Annotated for FunctionDecl {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub id: DeclId,
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub initializer: Option<Expr>,
    #[serde(default)]
    pub copied_from: Option<DeclId>,
    #[serde(default)]
    pub parent: Option<DeclId>,
}

impl FieldDecl {
    pub fn link_id(&self) -> DeclId {
        self.copied_from.unwrap_or(self.id)
    }
}

impl Annotated for FieldDecl {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub id: DeclId,
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub getter: Option<FunctionDecl>,
    #[serde(default)]
    pub setter: Option<FunctionDecl>,
    #[serde(default)]
    pub backing_field: Option<FieldDecl>,
    #[serde(default)]
    pub parent: Option<DeclId>,
}

impl PropertyDecl {
    pub fn accessor(&self, role: AccessorRole) -> Option<&FunctionDecl> {
        match role {
            AccessorRole::Getter => self.getter.as_ref(),
            AccessorRole::Setter => self.setter.as_ref(),
        }
    }

    pub fn accessors(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.getter.iter().chain(self.setter.iter())
    }
}

impl Annotated for PropertyDecl {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub id: DeclId,
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub origin: Origin,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub this_receiver: Option<ValueParameter>,
    #[serde(default)]
    pub members: Vec<Declaration>,
    #[serde(default)]
    pub parent: Option<DeclId>,
}

impl ClassDecl {
    /// Point every member's `parent` at this class.
    pub fn link_members(&mut self) {
        let owner = Some(self.id);
        for member in &mut self.members {
            link_declaration(member, owner);
        }
    }
}

impl Annotated for ClassDecl {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub id: DeclId,
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub initializer: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    Function(FunctionDecl),
    Class(ClassDecl),
    Field(FieldDecl),
    Property(PropertyDecl),
    Variable(VariableDecl),
}

impl Declaration {
    pub fn id(&self) -> DeclId {
        match self {
            Declaration::Function(f) => f.id,
            Declaration::Class(c) => c.id,
            Declaration::Field(f) => f.id,
            Declaration::Property(p) => p.id,
            Declaration::Variable(v) => v.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Declaration::Function(f) => &f.name,
            Declaration::Class(c) => &c.name,
            Declaration::Field(f) => &f.name,
            Declaration::Property(p) => &p.name,
            Declaration::Variable(v) => &v.name,
        }
    }

    fn max_id(&self) -> DeclId {
        let mut max = self.id();
        match self {
            Declaration::Function(f) => max = max.max(function_max_id(f)),
            Declaration::Class(c) => {
                if let Some(this) = &c.this_receiver {
                    max = max.max(this.id);
                }
                for member in &c.members {
                    max = max.max(member.max_id());
                }
            }
            Declaration::Field(f) => max = max.max(field_max_id(f)),
            Declaration::Property(p) => {
                for accessor in p.accessors() {
                    max = max.max(function_max_id(accessor));
                }
                if let Some(field) = &p.backing_field {
                    max = max.max(field_max_id(field));
                }
            }
            Declaration::Variable(v) => {
                if let Some(init) = &v.initializer {
                    max = max.max(expr_max_id(init));
                }
            }
        }
        max
    }
}

fn function_max_id(function: &FunctionDecl) -> DeclId {
    let mut max = function.id;
    for param in function.all_parameters() {
        max = max.max(param.id);
    }
    for tp in &function.type_params {
        max = max.max(tp.id);
    }
    if let Some(body) = &function.body {
        max = max.max(expr_max_id(body));
    }
    max
}

fn field_max_id(field: &FieldDecl) -> DeclId {
    match &field.initializer {
        Some(init) => field.id.max(expr_max_id(init)),
        None => field.id,
    }
}

fn expr_max_id(expr: &Expr) -> DeclId {
    struct MaxId(DeclId);

    impl ExprVisitor for MaxId {
        fn visit_expr(&mut self, expr: &Expr) {
            match &expr.kind {
                ExprKind::Variable(var) => self.0 = self.0.max(var.id),
                ExprKind::Loop(l) => self.0 = self.0.max(l.id),
                _ => {}
            }
            walk_expr(self, expr);
        }
    }

    let mut visitor = MaxId(DeclId(0));
    visitor.visit_expr(expr);
    visitor.0
}

/// One source file worth of declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUnit {
    pub name: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

impl FileUnit {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        FileUnit {
            name: name.into(),
            package: package.into(),
            declarations: Vec::new(),
        }
    }

    pub fn max_id(&self) -> Option<DeclId> {
        self.declarations.iter().map(Declaration::max_id).max()
    }

    /// Recompute every `parent` and accessor back-reference from the tree
    /// structure.
    pub fn link_parents(&mut self) {
        for decl in &mut self.declarations {
            link_declaration(decl, None);
        }
    }
}

fn link_declaration(decl: &mut Declaration, parent: Option<DeclId>) {
    match decl {
        Declaration::Function(f) => f.parent = parent,
        Declaration::Field(f) => f.parent = parent,
        Declaration::Variable(_) => {}
        Declaration::Class(c) => {
            c.parent = parent;
            c.link_members();
        }
        Declaration::Property(p) => link_property(p, parent),
    }
}

/// Accessors and the backing field share the property's owner.
pub(crate) fn link_property(property: &mut PropertyDecl, parent: Option<DeclId>) {
    property.parent = parent;
    let id = property.id;
    if let Some(getter) = &mut property.getter {
        getter.parent = parent;
        getter.accessor = Some(AccessorLink {
            property: id,
            role: AccessorRole::Getter,
        });
    }
    if let Some(setter) = &mut property.setter {
        setter.parent = parent;
        setter.accessor = Some(AccessorLink {
            property: id,
            role: AccessorRole::Setter,
        });
    }
    if let Some(field) = &mut property.backing_field {
        field.parent = parent;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Null,
    Unit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub callee: DeclId,
    #[serde(default)]
    pub dispatch_receiver: Option<Box<Expr>>,
    #[serde(default)]
    pub extension_receiver: Option<Box<Expr>>,
    #[serde(default)]
    pub args: Vec<Expr>,
}

impl Call {
    /// Receivers followed by arguments, in evaluation order.
    pub fn operands(&self) -> impl Iterator<Item = &Expr> {
        self.dispatch_receiver
            .iter()
            .chain(self.extension_receiver.iter())
            .map(|e| e.as_ref())
            .chain(self.args.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopKind {
    #[default]
    While,
    DoWhile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopExpr {
    pub id: DeclId,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: LoopKind,
    pub cond: Box<Expr>,
    pub body: Box<Expr>,
}

/// Expression node. Every expression carries its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Const(Literal),
    /// Read of a parameter or local variable.
    GetValue(DeclId),
    SetValue { target: DeclId, value: Box<Expr> },
    GetField(DeclId),
    SetField { field: DeclId, value: Box<Expr> },
    Call(Call),
    Variable(VariableDecl),
    Block(Vec<Expr>),
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        #[serde(default)]
        else_branch: Option<Box<Expr>>,
    },
    Loop(LoopExpr),
    Break(DeclId),
    Continue(DeclId),
    Return(Option<Box<Expr>>),
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Expr {
        Expr { kind, ty }
    }

    pub fn i32(value: i32) -> Expr {
        Expr::new(ExprKind::Const(Literal::I32(value)), Type::I32)
    }

    pub fn i64(value: i64) -> Expr {
        Expr::new(ExprKind::Const(Literal::I64(value)), Type::I64)
    }

    pub fn f32(value: f32) -> Expr {
        Expr::new(ExprKind::Const(Literal::F32(value)), Type::F32)
    }

    pub fn f64(value: f64) -> Expr {
        Expr::new(ExprKind::Const(Literal::F64(value)), Type::F64)
    }

    pub fn bool(value: bool) -> Expr {
        Expr::new(ExprKind::Const(Literal::Bool(value)), Type::Bool)
    }

    pub fn unit() -> Expr {
        Expr::new(ExprKind::Const(Literal::Unit), Type::Unit)
    }

    pub fn get(param: &ValueParameter) -> Expr {
        Expr::new(ExprKind::GetValue(param.id), param.ty.clone())
    }

    pub fn get_var(var: &VariableDecl) -> Expr {
        Expr::new(ExprKind::GetValue(var.id), var.ty.clone())
    }

    pub fn set(target: DeclId, value: Expr) -> Expr {
        Expr::new(
            ExprKind::SetValue {
                target,
                value: Box::new(value),
            },
            Type::Unit,
        )
    }

    pub fn get_field(field: &FieldDecl) -> Expr {
        Expr::new(ExprKind::GetField(field.id), field.ty.clone())
    }

    pub fn set_field(field: DeclId, value: Expr) -> Expr {
        Expr::new(
            ExprKind::SetField {
                field,
                value: Box::new(value),
            },
            Type::Unit,
        )
    }

    /// Static call of `callee` with plain arguments.
    pub fn call(callee: &FunctionDecl, args: Vec<Expr>) -> Expr {
        Expr::new(
            ExprKind::Call(Call {
                callee: callee.id,
                dispatch_receiver: None,
                extension_receiver: None,
                args,
            }),
            callee.return_type.clone(),
        )
    }

    pub fn declare(var: VariableDecl) -> Expr {
        Expr::new(ExprKind::Variable(var), Type::Unit)
    }

    pub fn block(items: Vec<Expr>, ty: Type) -> Expr {
        Expr::new(ExprKind::Block(items), ty)
    }

    pub fn if_else(cond: Expr, then_branch: Expr, else_branch: Option<Expr>, ty: Type) -> Expr {
        Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
            ty,
        )
    }

    pub fn ret(value: Option<Expr>) -> Expr {
        Expr::new(ExprKind::Return(value.map(Box::new)), Type::Never)
    }

    pub fn brk(loop_id: DeclId) -> Expr {
        Expr::new(ExprKind::Break(loop_id), Type::Never)
    }

    pub fn cont(loop_id: DeclId) -> Expr {
        Expr::new(ExprKind::Continue(loop_id), Type::Never)
    }
}

/// Read-only traversal over expression trees.
///
/// Implementors override [`ExprVisitor::visit_expr`] for the node kinds they
/// handle and call [`walk_expr`] to descend into the rest.
pub trait ExprVisitor {
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

/// Visit the direct children of `expr`.
pub fn walk_expr<V: ExprVisitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Const(_)
        | ExprKind::GetValue(_)
        | ExprKind::GetField(_)
        | ExprKind::Break(_)
        | ExprKind::Continue(_) => {}
        ExprKind::SetValue { value, .. } | ExprKind::SetField { value, .. } => {
            visitor.visit_expr(value)
        }
        ExprKind::Call(call) => {
            for operand in call.operands() {
                visitor.visit_expr(operand);
            }
        }
        ExprKind::Variable(var) => {
            if let Some(init) = &var.initializer {
                visitor.visit_expr(init);
            }
        }
        ExprKind::Block(items) => {
            for item in items {
                visitor.visit_expr(item);
            }
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            visitor.visit_expr(cond);
            visitor.visit_expr(then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_expr(else_branch);
            }
        }
        ExprKind::Loop(l) => {
            visitor.visit_expr(&l.cond);
            visitor.visit_expr(&l.body);
        }
        ExprKind::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
    }
}
