//! Declaration transformer.
//!
//! Turns IR declarations into module fields. This is where emission is
//! decided, where output names are assigned, and where a function's locals
//! and loop labels are collected ahead of body lowering. Body translation
//! itself is delegated to a [`BodyLowering`] implementation, which looks up
//! the pre-registered names instead of allocating its own.

use std::collections::HashMap;

use tracing::debug;

use crate::config::CodegenConfig;
use crate::error::CoreError;
use crate::index::ModuleIndex;
use crate::ir::{
    Annotated, ClassDecl, ClassKind, DeclId, Declaration, Expr, ExprKind, ExprVisitor, FieldDecl,
    FunctionDecl, FunctionKind, LoopExpr, Origin, PropertyDecl, ValueParameter, VariableDecl,
    Visibility, walk_expr,
};
use crate::module::{Instr, ModuleField, ValueType, WasmFunction, WasmGlobal, WasmLocal};
use crate::names::{GlobalNames, LabelKind, LoopLabelKey, NameTable};
use crate::type_mapper::TypeMapper;

/// A field initializer waiting for the initialization routine.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredInitializer {
    pub field: DeclId,
    pub value: Expr,
}

/// State shared by every declaration of one output module.
pub struct CodegenContext<'a> {
    pub config: &'a CodegenConfig,
    pub types: &'a dyn TypeMapper,
    pub index: ModuleIndex,
    pub global_names: GlobalNames,
    /// Import stubs, filled as import-bound functions are transformed.
    pub imports: Vec<WasmFunction>,
    pub deferred_initializers: Vec<DeferredInitializer>,
}

impl<'a> CodegenContext<'a> {
    pub fn new(config: &'a CodegenConfig, types: &'a dyn TypeMapper, index: ModuleIndex) -> Self {
        CodegenContext {
            config,
            types,
            index,
            global_names: GlobalNames::new(),
            imports: Vec::new(),
            deferred_initializers: Vec::new(),
        }
    }

    /// Stable module-wide name of a function or field.
    ///
    /// Seeded with the fully qualified name of the declaration's link
    /// target; asking twice returns the same name.
    pub fn global_name(&mut self, id: DeclId) -> Result<String, CoreError> {
        let entry = self
            .index
            .get(id)
            .ok_or_else(|| CoreError::unresolved("declaration", id))?;
        let link = entry.link;
        let suggested = self.index.get(link).unwrap_or(entry).fq_name.clone();
        Ok(self.global_names.name_for(link, &suggested))
    }
}

/// Per-function name tables and slot lists.
#[derive(Debug, Clone, Default)]
pub struct FunctionContext {
    /// Parameters and locals share one table, as they share one index space.
    pub locals: NameTable<DeclId>,
    pub labels: NameTable<LoopLabelKey>,
    pub params: Vec<WasmLocal>,
    /// Locals in first-encountered order.
    pub declared_locals: Vec<WasmLocal>,
    pub result: Option<ValueType>,
    slot_types: HashMap<DeclId, ValueType>,
}

impl FunctionContext {
    pub fn new(result: Option<ValueType>) -> Self {
        FunctionContext {
            result,
            ..FunctionContext::default()
        }
    }

    pub fn declare_param(&mut self, param: &ValueParameter, ty: ValueType) {
        let name = self.locals.declare_fresh_name(param.id, &param.name);
        self.slot_types.insert(param.id, ty);
        self.params.push(WasmLocal { name, ty });
    }

    pub fn declare_local(&mut self, var: &VariableDecl, ty: ValueType) {
        if self.locals.contains(&var.id) {
            return;
        }
        let name = self.locals.declare_fresh_name(var.id, &var.name);
        self.slot_types.insert(var.id, ty);
        self.declared_locals.push(WasmLocal { name, ty });
    }

    pub fn declare_loop(&mut self, l: &LoopExpr) {
        for kind in LabelKind::ALL {
            let key = LoopLabelKey::new(l.id, kind);
            let suggested = key.suggested_name(l.label.as_deref());
            self.labels.declare_fresh_name(key, &suggested);
        }
    }

    pub fn local_name(&self, id: DeclId) -> Result<&str, CoreError> {
        self.locals
            .get(&id)
            .ok_or_else(|| CoreError::unresolved("local", id))
    }

    pub fn slot_type(&self, id: DeclId) -> Option<ValueType> {
        self.slot_types.get(&id).copied()
    }

    pub fn label(&self, loop_id: DeclId, kind: LabelKind) -> Result<&str, CoreError> {
        self.labels
            .get(&LoopLabelKey::new(loop_id, kind))
            .ok_or_else(|| CoreError::unresolved("loop label", format!("{kind} of loop {loop_id}")))
    }
}

/// Registers every variable and loop of a body, in all nested scopes.
struct LocalCollector<'f, 't> {
    function: &'f mut FunctionContext,
    types: &'t dyn TypeMapper,
}

impl ExprVisitor for LocalCollector<'_, '_> {
    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Variable(var) => {
                let ty = self.types.transform_type(&var.ty);
                self.function.declare_local(var, ty);
            }
            ExprKind::Loop(l) => self.function.declare_loop(l),
            _ => {}
        }
        walk_expr(self, expr);
    }
}

/// Translates a function body into a flat instruction sequence.
pub trait BodyLowering {
    fn lower_body(
        &mut self,
        body: &Expr,
        function: &FunctionContext,
        ctx: &mut CodegenContext<'_>,
    ) -> Result<Vec<Instr>, CoreError>;
}

pub struct DeclarationTransformer<L> {
    lowering: L,
}

impl<L: BodyLowering> DeclarationTransformer<L> {
    pub fn new(lowering: L) -> Self {
        DeclarationTransformer { lowering }
    }

    /// Lower one declaration. `None` means nothing is emitted for it.
    pub fn transform(
        &mut self,
        decl: &Declaration,
        ctx: &mut CodegenContext<'_>,
    ) -> Result<Option<ModuleField>, CoreError> {
        match decl {
            Declaration::Function(f) => self.transform_function(f, ctx),
            Declaration::Class(c) => self.transform_class(c, ctx),
            Declaration::Field(f) if f.is_excluded() => {
                debug!(field = %f.name, "skipping excluded field");
                Ok(None)
            }
            Declaration::Field(f) => self.transform_field(f, ctx).map(Some),
            Declaration::Property(p) => self.transform_property(p, ctx),
            Declaration::Variable(v) => {
                debug!(variable = %v.name, "variables outside function bodies produce no output");
                Ok(None)
            }
        }
    }

    pub fn transform_function(
        &mut self,
        function: &FunctionDecl,
        ctx: &mut CodegenContext<'_>,
    ) -> Result<Option<ModuleField>, CoreError> {
        let fq_name = ctx.index.describe(function.id, &function.name);
        if function.is_excluded() {
            debug!(function = %fq_name, "skipping excluded function");
            return Ok(None);
        }
        if function.wasm_op().is_some() {
            debug!(function = %fq_name, "skipping intrinsic; calls are inlined");
            return Ok(None);
        }
        if function.is_fake_override {
            debug!(function = %fq_name, "skipping fake override");
            return Ok(None);
        }
        if function.origin == Origin::Bridge {
            return Err(CoreError::unsupported(
                format!("bridge `{fq_name}` cannot be lowered: virtual dispatch thunks are not supported"),
                function,
            ));
        }

        let name = ctx.global_name(function.id)?;
        let result = ctx.types.result_type(&function.return_type);
        let mut fctx = FunctionContext::new(result);
        for param in function.all_parameters() {
            fctx.declare_param(param, ctx.types.transform_type(&param.ty));
        }
        let exported = ctx.config.export_public && function.visibility == Visibility::Public;

        if let Some(import) = function.import_binding() {
            debug!(function = %fq_name, module = %import.module, symbol = %import.name, "emitting import stub");
            ctx.imports.push(WasmFunction {
                name,
                params: fctx.params,
                result,
                locals: Vec::new(),
                instructions: Vec::new(),
                import: Some(import),
                exported: false,
            });
            return Ok(None);
        }

        let body = function
            .body
            .as_ref()
            .ok_or_else(|| CoreError::MissingBody {
                fq_name: fq_name.clone(),
            })?;

        LocalCollector {
            function: &mut fctx,
            types: ctx.types,
        }
        .visit_expr(body);

        let instructions = self.lowering.lower_body(body, &fctx, ctx)?;

        Ok(Some(ModuleField::Function(WasmFunction {
            name,
            params: fctx.params,
            result,
            locals: fctx.declared_locals,
            instructions,
            import: None,
            exported,
        })))
    }

    /// Lower the function members of a class into one group.
    ///
    /// Fields and properties are left to the field path
    /// ([`Self::transform_field`], [`Self::transform_property`]).
    pub fn transform_class(
        &mut self,
        class: &ClassDecl,
        ctx: &mut CodegenContext<'_>,
    ) -> Result<Option<ModuleField>, CoreError> {
        if class.kind == ClassKind::Annotation || class.is_excluded() {
            debug!(class = %class.name, "skipping class");
            return Ok(None);
        }
        let mut fields = Vec::new();
        for member in &class.members {
            match member {
                Declaration::Function(f) if f.kind == FunctionKind::Constructor => {
                    let fq_name = ctx.index.describe(f.id, &f.name);
                    return Err(CoreError::unsupported(
                        format!("constructor `{fq_name}` has no lowering yet"),
                        f,
                    ));
                }
                Declaration::Function(f) => {
                    if let Some(field) = self.transform_function(f, ctx)? {
                        fields.push(field);
                    }
                }
                Declaration::Field(_) | Declaration::Property(_) => {}
                Declaration::Class(_) | Declaration::Variable(_) => {
                    debug!(class = %class.name, member = %member.name(), "dropping class member");
                }
            }
        }
        Ok(Some(ModuleField::Group(fields)))
    }

    /// Always one mutable global holding the type's zero value. An
    /// initializer expression is queued for the initialization routine.
    pub fn transform_field(
        &mut self,
        field: &FieldDecl,
        ctx: &mut CodegenContext<'_>,
    ) -> Result<ModuleField, CoreError> {
        let ty = ctx.types.transform_type(&field.ty);
        let name = ctx.global_name(field.id)?;
        if let Some(value) = &field.initializer {
            debug!(field = %name, "deferring initializer to the initialization routine");
            ctx.deferred_initializers.push(DeferredInitializer {
                field: field.id,
                value: value.clone(),
            });
        }
        Ok(ModuleField::Global(WasmGlobal {
            name,
            ty,
            mutable: true,
            init: Instr::zero_of(ty),
        }))
    }

    pub fn transform_property(
        &mut self,
        property: &PropertyDecl,
        ctx: &mut CodegenContext<'_>,
    ) -> Result<Option<ModuleField>, CoreError> {
        if property.is_excluded() {
            debug!(property = %property.name, "skipping excluded property");
            return Ok(None);
        }
        let mut fields = Vec::new();
        if let Some(field) = &property.backing_field {
            fields.push(self.transform_field(field, ctx)?);
        }
        for accessor in property.accessors() {
            if let Some(field) = self.transform_function(accessor, ctx)? {
                fields.push(field);
            }
        }
        Ok((!fields.is_empty()).then_some(ModuleField::Group(fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IrBuilder;
    use crate::ir::{Annotation, FileUnit, LoopKind};
    use crate::module::ImportRef;
    use crate::type_mapper::WasmTypeMapper;
    use crate::types::Type;

    /// Records the function context it was handed and emits a marker.
    #[derive(Default)]
    struct Recording {
        seen: Vec<FunctionContext>,
    }

    impl BodyLowering for Recording {
        fn lower_body(
            &mut self,
            _body: &Expr,
            function: &FunctionContext,
            _ctx: &mut CodegenContext<'_>,
        ) -> Result<Vec<Instr>, CoreError> {
            self.seen.push(function.clone());
            Ok(vec![Instr::Unreachable])
        }
    }

    fn unit_of(decls: Vec<Declaration>) -> FileUnit {
        let mut unit = FileUnit::new("test.kt", "demo");
        unit.declarations = decls;
        unit.link_parents();
        unit
    }

    fn transform_all(
        unit: &FileUnit,
        config: &CodegenConfig,
    ) -> (Vec<Result<Option<ModuleField>, CoreError>>, Vec<FunctionContext>, Vec<WasmFunction>) {
        let mapper = WasmTypeMapper;
        let mut ctx = CodegenContext::new(config, &mapper, ModuleIndex::from_units(std::slice::from_ref(unit)).unwrap());
        let mut transformer = DeclarationTransformer::new(Recording::default());
        let results = unit
            .declarations
            .iter()
            .map(|d| transformer.transform(d, &mut ctx))
            .collect();
        (results, transformer.lowering.seen, ctx.imports)
    }

    fn only_function(field: ModuleField) -> WasmFunction {
        match field {
            ModuleField::Function(f) => f,
            other => panic!("expected a function, got {other:?}"),
        }
    }

    #[test]
    fn skips_excluded_intrinsic_and_fake_override_functions() {
        let mut b = IrBuilder::new();
        let mut excluded = b.function("hidden", Vec::new(), Type::Unit, Some(Expr::unit()));
        excluded.annotations.push(Annotation::ExcludedFromCodegen);
        let mut intrinsic = b.function("plus", Vec::new(), Type::I32, None);
        intrinsic.annotations.push(Annotation::WasmOp("I32_ADD".into()));
        let mut fake = b.function("inherited", Vec::new(), Type::Unit, None);
        fake.is_fake_override = true;

        let unit = unit_of(vec![
            Declaration::Function(excluded),
            Declaration::Function(intrinsic),
            Declaration::Function(fake),
        ]);
        let (results, seen, imports) = transform_all(&unit, &CodegenConfig::default());
        for result in results {
            assert!(result.unwrap().is_none());
        }
        assert!(seen.is_empty());
        assert!(imports.is_empty());
    }

    #[test]
    fn rejects_bridges() {
        let mut b = IrBuilder::new();
        let mut bridge = b.function("bridge", Vec::new(), Type::Unit, Some(Expr::unit()));
        bridge.origin = Origin::Bridge;
        let unit = unit_of(vec![Declaration::Function(bridge)]);
        let (mut results, _, _) = transform_all(&unit, &CodegenConfig::default());
        let err = results.remove(0).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedConstruct { ref message, .. } if message.contains("demo.bridge")));
    }

    #[test]
    fn import_bound_function_only_produces_an_import_stub() {
        let mut b = IrBuilder::new();
        let a = b.param("a", Type::I32);
        let c = b.param("c", Type::F64);
        let mut host = b.function("host", vec![a, c], Type::I64, None);
        host.annotations.push(Annotation::WasmImport {
            module: "env".into(),
            name: Some("host_fn".into()),
        });
        let unit = unit_of(vec![Declaration::Function(host)]);
        let (mut results, seen, imports) = transform_all(&unit, &CodegenConfig::default());

        assert!(results.remove(0).unwrap().is_none());
        assert!(seen.is_empty());
        assert_eq!(imports.len(), 1);
        let stub = &imports[0];
        assert_eq!(stub.name, "demo.host");
        assert_eq!(
            stub.params,
            vec![
                WasmLocal { name: "a".into(), ty: ValueType::I32 },
                WasmLocal { name: "c".into(), ty: ValueType::F64 },
            ]
        );
        assert_eq!(stub.result, Some(ValueType::I64));
        assert!(stub.locals.is_empty());
        assert!(stub.instructions.is_empty());
        assert_eq!(
            stub.import,
            Some(ImportRef {
                module: "env".into(),
                name: "host_fn".into()
            })
        );
    }

    #[test]
    fn missing_body_names_the_declaration() {
        let mut b = IrBuilder::new();
        let draw = b.function("draw", Vec::new(), Type::Unit, None);
        let class = b.class("Widget", vec![Declaration::Function(draw)]);
        let unit = unit_of(vec![Declaration::Class(class)]);
        let (mut results, _, _) = transform_all(&unit, &CodegenConfig::default());
        let err = results.remove(0).unwrap_err();
        assert!(matches!(err, CoreError::MissingBody { ref fq_name } if fq_name == "demo.Widget.draw"));
    }

    #[test]
    fn collects_every_local_once_before_lowering() {
        let mut b = IrBuilder::new();
        let x_param = b.param("x", Type::I32);
        let x_outer = b.variable("x", Type::I32, Some(Expr::i32(1)));
        let x_inner = b.variable("x", Type::I64, None);
        let y = b.variable("y", Type::F64, None);
        let z = b.variable("z", Type::Bool, None);
        let inner = b.while_loop(None, Expr::bool(false), Expr::declare(y));
        let outer = b.while_loop(
            Some("outer"),
            Expr::bool(false),
            Expr::block(vec![Expr::declare(x_inner), inner], Type::Unit),
        );
        let branch = Expr::if_else(Expr::bool(true), Expr::declare(z), None, Type::Unit);
        let body = Expr::block(vec![Expr::declare(x_outer), outer, branch], Type::Unit);
        let f = b.function("f", vec![x_param], Type::Unit, Some(body));

        let unit = unit_of(vec![Declaration::Function(f)]);
        let (mut results, seen, _) = transform_all(&unit, &CodegenConfig::default());
        let function = only_function(results.remove(0).unwrap().unwrap());

        let names: Vec<_> = function.locals.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["x_1", "x_2", "y", "z"]);
        let types: Vec<_> = function.locals.iter().map(|l| l.ty).collect();
        assert_eq!(
            types,
            vec![ValueType::I32, ValueType::I64, ValueType::F64, ValueType::I32]
        );
        assert_eq!(function.params[0].name, "x");
        assert_eq!(seen[0].declared_locals.len(), 4);
    }

    #[test]
    fn allocates_three_distinct_labels_per_loop() {
        let mut b = IrBuilder::new();
        let mut loop_ids = Vec::new();
        let inner = b.loop_with(LoopKind::DoWhile, None, |_, id| {
            loop_ids.push(id);
            (Expr::bool(false), Expr::cont(id))
        });
        let outer = b.loop_with(LoopKind::While, Some("outer"), |_, id| {
            loop_ids.push(id);
            (Expr::bool(true), Expr::block(vec![inner, Expr::brk(id)], Type::Unit))
        });
        let f = b.function("spin", Vec::new(), Type::Unit, Some(outer));

        let unit = unit_of(vec![Declaration::Function(f)]);
        let (_, seen, _) = transform_all(&unit, &CodegenConfig::default());
        let fctx = &seen[0];
        assert_eq!(fctx.labels.len(), 6);

        let inner_id = loop_ids[0];
        let outer_id = loop_ids[1];
        let outer_labels: Vec<_> = LabelKind::ALL
            .iter()
            .map(|k| fctx.label(outer_id, *k).unwrap().to_string())
            .collect();
        assert_eq!(outer_labels, vec!["BREAK_outer", "CONTINUE_outer", "LOOP_outer"]);
        let inner_labels: Vec<_> = LabelKind::ALL
            .iter()
            .map(|k| fctx.label(inner_id, *k).unwrap().to_string())
            .collect();
        assert_eq!(inner_labels, vec!["BREAK_", "CONTINUE_", "LOOP_"]);
    }

    #[test]
    fn parameters_follow_receiver_order() {
        let mut b = IrBuilder::new();
        let this = b.param("<this>", Type::named("demo.Box"));
        let ext = b.param("<receiver>", Type::I32);
        let a = b.param("a", Type::F32);
        let mut f = b.function("m", vec![a], Type::F32, Some(Expr::f32(0.0)));
        f.dispatch_receiver = Some(this);
        f.extension_receiver = Some(ext);

        let unit = unit_of(vec![Declaration::Function(f)]);
        let (mut results, _, _) = transform_all(&unit, &CodegenConfig::default());
        let function = only_function(results.remove(0).unwrap().unwrap());
        let params: Vec<_> = function
            .params
            .iter()
            .map(|p| (p.name.as_str(), p.ty))
            .collect();
        assert_eq!(
            params,
            vec![
                ("<this>", ValueType::Ref),
                ("<receiver>", ValueType::I32),
                ("a", ValueType::F32)
            ]
        );
        assert_eq!(function.result, Some(ValueType::F32));
        assert!(function.exported);
    }

    #[test]
    fn private_functions_are_not_exported() {
        let mut b = IrBuilder::new();
        let mut f = b.function("secret", Vec::new(), Type::Unit, Some(Expr::unit()));
        f.visibility = Visibility::Private;
        let unit = unit_of(vec![Declaration::Function(f)]);
        let (mut results, _, _) = transform_all(&unit, &CodegenConfig::default());
        assert!(!only_function(results.remove(0).unwrap().unwrap()).exported);
    }

    #[test]
    fn class_groups_functions_and_leaves_fields_alone() {
        let mut b = IrBuilder::new();
        let f = b.function("f", Vec::new(), Type::Unit, Some(Expr::unit()));
        let g = b.function("g", Vec::new(), Type::Unit, Some(Expr::unit()));
        let field = b.field("count", Type::I32);
        let prop = b.property("size", Type::I32, true, false);
        let class = b.class(
            "Box",
            vec![
                Declaration::Function(f),
                Declaration::Field(field),
                Declaration::Property(prop),
                Declaration::Function(g),
            ],
        );
        let unit = unit_of(vec![Declaration::Class(class)]);
        let (mut results, _, _) = transform_all(&unit, &CodegenConfig::default());
        let group = results.remove(0).unwrap().unwrap();
        let names: Vec<_> = group.functions().iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["demo.Box.f", "demo.Box.g"]);
        assert!(group.globals().is_empty());
    }

    #[test]
    fn constructors_fail_loudly() {
        let mut b = IrBuilder::new();
        let mut ctor = b.function("<init>", Vec::new(), Type::Unit, Some(Expr::unit()));
        ctor.kind = FunctionKind::Constructor;
        let class = b.class("Box", vec![Declaration::Function(ctor)]);
        let unit = unit_of(vec![Declaration::Class(class)]);
        let (mut results, _, _) = transform_all(&unit, &CodegenConfig::default());
        assert!(matches!(
            results.remove(0),
            Err(CoreError::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn annotation_and_excluded_classes_are_skipped() {
        let mut b = IrBuilder::new();
        let mut marker = b.class("Marker", Vec::new());
        marker.kind = ClassKind::Annotation;
        let f = b.function("f", Vec::new(), Type::Unit, None);
        let mut excluded = b.class("Hidden", vec![Declaration::Function(f)]);
        excluded.annotations.push(Annotation::ExcludedFromCodegen);
        let unit = unit_of(vec![Declaration::Class(marker), Declaration::Class(excluded)]);
        let (results, _, _) = transform_all(&unit, &CodegenConfig::default());
        for result in results {
            assert!(result.unwrap().is_none());
        }
    }

    #[test]
    fn fields_become_mutable_globals_with_zero_values() {
        let mut b = IrBuilder::new();
        let cases = [
            (Type::I32, Instr::I32Const(0)),
            (Type::I64, Instr::I64Const(0)),
            (Type::F32, Instr::F32Const(0.0)),
            (Type::F64, Instr::F64Const(0.0)),
            (Type::Bool, Instr::I32Const(0)),
            (Type::named("demo.Box"), Instr::RefNull),
        ];
        let decls = cases
            .iter()
            .enumerate()
            .map(|(i, (ty, _))| Declaration::Field(b.field(&format!("f{i}"), ty.clone())))
            .collect();
        let unit = unit_of(decls);
        let (results, _, _) = transform_all(&unit, &CodegenConfig::default());

        for (result, (_, expected)) in results.into_iter().zip(cases.iter()) {
            let Some(ModuleField::Global(global)) = result.unwrap() else {
                panic!("expected a global");
            };
            assert!(global.mutable);
            assert_eq!(&global.init, expected);
        }
    }

    #[test]
    fn field_initializers_are_deferred_not_dropped() {
        let mut b = IrBuilder::new();
        let mut field = b.field("limit", Type::I64);
        field.initializer = Some(Expr::i64(42));
        let field_id = field.id;
        let unit = unit_of(vec![Declaration::Field(field)]);

        let config = CodegenConfig::default();
        let mapper = WasmTypeMapper;
        let mut ctx = CodegenContext::new(&config, &mapper, ModuleIndex::from_units(std::slice::from_ref(&unit)).unwrap());
        let mut transformer = DeclarationTransformer::new(Recording::default());
        let field = transformer
            .transform(&unit.declarations[0], &mut ctx)
            .unwrap()
            .unwrap();

        assert_eq!(field.globals()[0].init, Instr::I64Const(0));
        assert_eq!(
            ctx.deferred_initializers,
            vec![DeferredInitializer {
                field: field_id,
                value: Expr::i64(42)
            }]
        );
    }

    #[test]
    fn global_names_are_stable_and_unique_across_overloads() {
        let mut b = IrBuilder::new();
        let first = b.function("f", Vec::new(), Type::Unit, Some(Expr::unit()));
        let p = b.param("x", Type::I32);
        let second = b.function("f", vec![p], Type::Unit, Some(Expr::unit()));
        let (first_id, second_id) = (first.id, second.id);
        let unit = unit_of(vec![Declaration::Function(first), Declaration::Function(second)]);

        let config = CodegenConfig::default();
        let mapper = WasmTypeMapper;
        let mut ctx = CodegenContext::new(&config, &mapper, ModuleIndex::from_units(std::slice::from_ref(&unit)).unwrap());
        let a = ctx.global_name(first_id).unwrap();
        let b2 = ctx.global_name(second_id).unwrap();
        assert_eq!(a, "demo.f");
        assert_eq!(b2, "demo.f_1");
        assert_eq!(ctx.global_name(first_id).unwrap(), a);
        assert_eq!(ctx.global_name(second_id).unwrap(), b2);
    }
}
