//! Default body lowering.
//!
//! Emits a stack-machine instruction sequence for an expression tree. Every
//! expression leaves exactly one value on the stack when its type produces a
//! value, and nothing otherwise; `Never`-typed expressions leave the stack
//! unreachable. Locals and loop labels must already be registered in the
//! [`FunctionContext`].

use crate::declarations::{BodyLowering, CodegenContext, FunctionContext};
use crate::error::CoreError;
use crate::index::EntryKind;
use crate::intrinsics::NumericOp;
use crate::ir::{Call, Expr, ExprKind, Literal, LoopExpr, LoopKind, VariableDecl};
use crate::module::{Instr, ValueType};
use crate::names::LabelKind;
use crate::types::Type;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExprLowerer;

impl BodyLowering for ExprLowerer {
    fn lower_body(
        &mut self,
        body: &Expr,
        function: &FunctionContext,
        ctx: &mut CodegenContext<'_>,
    ) -> Result<Vec<Instr>, CoreError> {
        let mut emitter = Emitter {
            function,
            ctx,
            out: Vec::new(),
        };
        emitter.lower(body)?;

        let produced = emitter.produces(&body.ty);
        match function.result {
            Some(_) if !produced && !body.ty.is_never() => emitter.out.push(Instr::Unreachable),
            None if produced => emitter.out.push(Instr::Drop),
            _ => {}
        }
        Ok(emitter.out)
    }
}

struct Emitter<'f, 'c, 'a> {
    function: &'f FunctionContext,
    ctx: &'c mut CodegenContext<'a>,
    out: Vec<Instr>,
}

impl Emitter<'_, '_, '_> {
    fn produces(&self, ty: &Type) -> bool {
        self.ctx.types.produces_value(ty)
    }

    fn lower(&mut self, expr: &Expr) -> Result<(), CoreError> {
        match &expr.kind {
            ExprKind::Const(literal) => self.lower_literal(literal, &expr.ty),
            ExprKind::GetValue(id) => {
                let name = self.function.local_name(*id)?.to_string();
                self.out.push(Instr::LocalGet(name));
            }
            ExprKind::SetValue { target, value } => {
                let name = self.function.local_name(*target)?.to_string();
                let slot = self
                    .function
                    .slot_type(*target)
                    .unwrap_or_else(|| self.ctx.types.transform_type(&value.ty));
                self.lower_into(value, slot)?;
                self.out.push(Instr::LocalSet(name));
            }
            ExprKind::GetField(id) => {
                self.ctx.index.field(*id)?;
                let name = self.ctx.global_name(*id)?;
                self.out.push(Instr::GlobalGet(name));
            }
            ExprKind::SetField { field, value } => {
                let slot = match &self.ctx.index.field(*field)?.kind {
                    EntryKind::Field { ty } => self.ctx.types.transform_type(ty),
                    _ => ValueType::Ref,
                };
                let name = self.ctx.global_name(*field)?;
                self.lower_into(value, slot)?;
                self.out.push(Instr::GlobalSet(name));
            }
            ExprKind::Call(call) => self.lower_call(call, &expr.ty)?,
            ExprKind::Variable(var) => self.lower_variable(var)?,
            ExprKind::Block(items) => self.lower_block(items, &expr.ty)?,
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.lower_into(cond, ValueType::I32)?;
                let result = self.ctx.types.result_type(&expr.ty);
                self.out.push(Instr::If(result));
                self.lower(then_branch)?;
                self.coerce(&then_branch.ty, &expr.ty);
                match else_branch {
                    Some(else_branch) => {
                        self.out.push(Instr::Else);
                        self.lower(else_branch)?;
                        self.coerce(&else_branch.ty, &expr.ty);
                    }
                    None => {
                        if let Some(ty) = result {
                            self.out.push(Instr::Else);
                            self.out.push(Instr::zero_of(ty));
                        }
                    }
                }
                self.out.push(Instr::End);
            }
            ExprKind::Loop(l) => self.lower_loop(l)?,
            ExprKind::Break(id) => {
                let label = self.function.label(*id, LabelKind::Break)?.to_string();
                self.out.push(Instr::Br(label));
            }
            ExprKind::Continue(id) => {
                let label = self.function.label(*id, LabelKind::Continue)?.to_string();
                self.out.push(Instr::Br(label));
            }
            ExprKind::Return(value) => {
                if let Some(value) = value {
                    self.lower(value)?;
                    let produced = self.produces(&value.ty);
                    match self.function.result {
                        Some(ty) if !produced && !value.ty.is_never() => {
                            self.out.push(Instr::zero_of(ty))
                        }
                        None if produced => self.out.push(Instr::Drop),
                        _ => {}
                    }
                } else if let Some(ty) = self.function.result {
                    self.out.push(Instr::zero_of(ty));
                }
                self.out.push(Instr::Return);
            }
        }
        Ok(())
    }

    fn lower_literal(&mut self, literal: &Literal, ty: &Type) {
        match literal {
            Literal::I32(v) => self.out.push(Instr::I32Const(*v)),
            Literal::I64(v) => self.out.push(Instr::I64Const(*v)),
            Literal::F32(v) => self.out.push(Instr::F32Const(*v)),
            Literal::F64(v) => self.out.push(Instr::F64Const(*v)),
            Literal::Bool(v) => self.out.push(Instr::I32Const(i32::from(*v))),
            Literal::Null => {
                if let Some(ty) = self.ctx.types.result_type(ty) {
                    self.out.push(Instr::zero_of(ty));
                }
            }
            Literal::Unit => {}
        }
    }

    /// Lower `expr` so that exactly one value of `slot` is left behind.
    fn lower_into(&mut self, expr: &Expr, slot: ValueType) -> Result<(), CoreError> {
        self.lower(expr)?;
        if !self.produces(&expr.ty) && !expr.ty.is_never() {
            self.out.push(Instr::zero_of(slot));
        }
        Ok(())
    }

    /// Reconcile the stack after an expression of type `from` with what an
    /// enclosing expression of type `to` must leave.
    fn coerce(&mut self, from: &Type, to: &Type) {
        let produced = self.produces(from);
        match self.ctx.types.result_type(to) {
            Some(ty) if !produced && !from.is_never() => self.out.push(Instr::zero_of(ty)),
            None if produced => self.out.push(Instr::Drop),
            _ => {}
        }
    }

    fn lower_call(&mut self, call: &Call, ty: &Type) -> Result<(), CoreError> {
        let entry = self.ctx.index.function(call.callee)?;
        let (intrinsic, return_type) = match &entry.kind {
            EntryKind::Function {
                intrinsic,
                return_type,
            } => (*intrinsic, return_type.clone()),
            _ => return Err(CoreError::unresolved("function", call.callee)),
        };

        for operand in call.operands() {
            self.lower_into(operand, ValueType::Ref)?;
        }
        match intrinsic {
            Some(op) => self.out.push(Instr::Numeric(op)),
            None => {
                let name = self.ctx.global_name(call.callee)?;
                self.out.push(Instr::Call(name));
            }
        }

        let returned = intrinsic.is_some() || self.produces(&return_type);
        let wanted = self.ctx.types.result_type(ty);
        match wanted {
            Some(slot) if !returned && !ty.is_never() => self.out.push(Instr::zero_of(slot)),
            None if returned => self.out.push(Instr::Drop),
            _ => {}
        }
        Ok(())
    }

    fn lower_variable(&mut self, var: &VariableDecl) -> Result<(), CoreError> {
        let Some(init) = &var.initializer else {
            return Ok(());
        };
        let name = self.function.local_name(var.id)?.to_string();
        let slot = self
            .function
            .slot_type(var.id)
            .unwrap_or_else(|| self.ctx.types.transform_type(&var.ty));
        self.lower_into(init, slot)?;
        self.out.push(Instr::LocalSet(name));
        Ok(())
    }

    fn lower_block(&mut self, items: &[Expr], ty: &Type) -> Result<(), CoreError> {
        let Some((last, init)) = items.split_last() else {
            self.coerce(&Type::Unit, ty);
            return Ok(());
        };
        for item in init {
            self.lower(item)?;
            if self.produces(&item.ty) {
                self.out.push(Instr::Drop);
            }
        }
        self.lower(last)?;
        self.coerce(&last.ty, ty);
        Ok(())
    }

    fn lower_loop(&mut self, l: &LoopExpr) -> Result<(), CoreError> {
        let break_label = self.function.label(l.id, LabelKind::Break)?.to_string();
        let continue_label = self.function.label(l.id, LabelKind::Continue)?.to_string();
        let loop_label = self.function.label(l.id, LabelKind::Loop)?.to_string();

        self.out.push(Instr::Block(Some(break_label.clone())));
        self.out.push(Instr::Loop(Some(loop_label.clone())));
        self.out.push(Instr::Block(Some(continue_label)));
        match l.kind {
            LoopKind::While => {
                self.lower_into(&l.cond, ValueType::I32)?;
                self.out.push(Instr::Numeric(NumericOp::I32Eqz));
                self.out.push(Instr::BrIf(break_label));
                self.lower(&l.body)?;
                self.coerce(&l.body.ty, &Type::Unit);
                self.out.push(Instr::End);
                self.out.push(Instr::Br(loop_label));
            }
            LoopKind::DoWhile => {
                self.lower(&l.body)?;
                self.coerce(&l.body.ty, &Type::Unit);
                self.out.push(Instr::End);
                self.lower_into(&l.cond, ValueType::I32)?;
                self.out.push(Instr::BrIf(loop_label));
            }
        }
        self.out.push(Instr::End);
        self.out.push(Instr::End);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IrBuilder;
    use crate::config::CodegenConfig;
    use crate::declarations::DeclarationTransformer;
    use crate::index::ModuleIndex;
    use crate::ir::{Annotation, DeclId, Declaration, FileUnit};
    use crate::module::ModuleField;
    use crate::type_mapper::WasmTypeMapper;

    /// Lower the declaration at `position` of a unit built from `decls`.
    fn lower_at(decls: Vec<Declaration>, position: usize) -> Result<Vec<Instr>, CoreError> {
        let mut unit = FileUnit::new("body.kt", "demo");
        unit.declarations = decls;
        unit.link_parents();
        let config = CodegenConfig::default();
        let mapper = WasmTypeMapper;
        let index = ModuleIndex::from_units(std::slice::from_ref(&unit))?;
        let mut ctx = CodegenContext::new(&config, &mapper, index);
        let mut transformer = DeclarationTransformer::new(ExprLowerer);
        match transformer.transform(&unit.declarations[position], &mut ctx)? {
            Some(ModuleField::Function(f)) => Ok(f.instructions),
            other => panic!("expected a function, got {other:?}"),
        }
    }

    fn get(name: &str) -> Instr {
        Instr::LocalGet(name.to_string())
    }

    #[test]
    fn while_loop_checks_condition_before_body() {
        let mut b = IrBuilder::new();
        let i = b.variable("i", Type::I32, Some(Expr::i32(0)));
        let i_id = i.id;
        let cond = Expr::new(ExprKind::GetValue(i_id), Type::Bool);
        let step = Expr::set(i_id, Expr::i32(0));
        let looped = b.while_loop(Some("scan"), cond, step);
        let body = Expr::block(vec![Expr::declare(i), looped], Type::Unit);
        let f = b.function("scan", Vec::new(), Type::Unit, Some(body));

        let code = lower_at(vec![Declaration::Function(f)], 0).unwrap();
        assert_eq!(
            code,
            vec![
                Instr::I32Const(0),
                Instr::LocalSet("i".into()),
                Instr::Block(Some("BREAK_scan".into())),
                Instr::Loop(Some("LOOP_scan".into())),
                Instr::Block(Some("CONTINUE_scan".into())),
                get("i"),
                Instr::Numeric(NumericOp::I32Eqz),
                Instr::BrIf("BREAK_scan".into()),
                Instr::I32Const(0),
                Instr::LocalSet("i".into()),
                Instr::End,
                Instr::Br("LOOP_scan".into()),
                Instr::End,
                Instr::End,
            ]
        );
    }

    #[test]
    fn do_while_runs_body_first_and_continue_reaches_condition() {
        let mut b = IrBuilder::new();
        let looped = b.loop_with(LoopKind::DoWhile, None, |_, id| {
            (Expr::bool(false), Expr::cont(id))
        });
        let f = b.function("once", Vec::new(), Type::Unit, Some(looped));

        let code = lower_at(vec![Declaration::Function(f)], 0).unwrap();
        assert_eq!(
            code,
            vec![
                Instr::Block(Some("BREAK_".into())),
                Instr::Loop(Some("LOOP_".into())),
                Instr::Block(Some("CONTINUE_".into())),
                Instr::Br("CONTINUE_".into()),
                Instr::End,
                Instr::I32Const(0),
                Instr::BrIf("LOOP_".into()),
                Instr::End,
                Instr::End,
            ]
        );
    }

    #[test]
    fn intrinsic_calls_are_inlined() {
        let mut b = IrBuilder::new();
        let x = b.param("x", Type::I32);
        let y = b.param("y", Type::I32);
        let mut plus = b.function("plus", vec![x, y], Type::I32, None);
        plus.annotations.push(Annotation::WasmOp("I32_ADD".into()));
        let a = b.param("a", Type::I32);
        let c = b.param("c", Type::I32);
        let body = Expr::call(&plus, vec![Expr::get(&a), Expr::get(&c)]);
        let sum = b.function("sum", vec![a, c], Type::I32, Some(body));

        let code = lower_at(
            vec![Declaration::Function(plus), Declaration::Function(sum)],
            1,
        )
        .unwrap();
        assert_eq!(
            code,
            vec![get("a"), get("c"), Instr::Numeric(NumericOp::I32Add)]
        );
    }

    #[test]
    fn block_drops_intermediate_values_and_calls_by_global_name() {
        let mut b = IrBuilder::new();
        let answer = b.function("answer", Vec::new(), Type::I32, Some(Expr::i32(42)));
        let body = Expr::block(
            vec![Expr::call(&answer, Vec::new()), Expr::i32(1)],
            Type::I32,
        );
        let f = b.function("f", Vec::new(), Type::I32, Some(body));

        let code = lower_at(
            vec![Declaration::Function(answer), Declaration::Function(f)],
            1,
        )
        .unwrap();
        assert_eq!(
            code,
            vec![
                Instr::Call("demo.answer".into()),
                Instr::Drop,
                Instr::I32Const(1),
            ]
        );
    }

    #[test]
    fn typed_if_without_else_yields_a_zero() {
        let mut b = IrBuilder::new();
        let flag = b.param("flag", Type::Bool);
        let body = Expr::if_else(Expr::get(&flag), Expr::f64(2.5), None, Type::F64);
        let f = b.function("pick", vec![flag], Type::F64, Some(body));

        let code = lower_at(vec![Declaration::Function(f)], 0).unwrap();
        assert_eq!(
            code,
            vec![
                get("flag"),
                Instr::If(Some(ValueType::F64)),
                Instr::F64Const(2.5),
                Instr::Else,
                Instr::F64Const(0.0),
                Instr::End,
            ]
        );
    }

    #[test]
    fn fields_are_read_and_written_through_globals() {
        let mut b = IrBuilder::new();
        let counter = b.field("counter", Type::I64);
        let body = Expr::block(
            vec![
                Expr::set_field(counter.id, Expr::i64(5)),
                Expr::ret(Some(Expr::get_field(&counter))),
            ],
            Type::Never,
        );
        let f = b.function("bump", Vec::new(), Type::I64, Some(body));

        let code = lower_at(
            vec![Declaration::Field(counter), Declaration::Function(f)],
            1,
        )
        .unwrap();
        assert_eq!(
            code,
            vec![
                Instr::I64Const(5),
                Instr::GlobalSet("demo.counter".into()),
                Instr::GlobalGet("demo.counter".into()),
                Instr::Return,
            ]
        );
    }

    #[test]
    fn unit_function_drops_a_trailing_value() {
        let mut b = IrBuilder::new();
        let f = b.function("noop", Vec::new(), Type::Unit, Some(Expr::i32(3)));
        let code = lower_at(vec![Declaration::Function(f)], 0).unwrap();
        assert_eq!(code, vec![Instr::I32Const(3), Instr::Drop]);
    }

    #[test]
    fn unknown_local_is_an_unresolved_symbol() {
        let mut b = IrBuilder::new();
        let body = Expr::new(ExprKind::GetValue(DeclId(9_999)), Type::I32);
        let f = b.function("broken", Vec::new(), Type::I32, Some(body));
        let err = lower_at(vec![Declaration::Function(f)], 0).unwrap_err();
        assert!(matches!(err, CoreError::UnresolvedSymbol { kind: "local", .. }));
    }

    #[test]
    fn unknown_callee_is_an_unresolved_symbol() {
        let mut b = IrBuilder::new();
        let ghost = b.function("ghost", Vec::new(), Type::Unit, Some(Expr::unit()));
        let f = b.function(
            "caller",
            Vec::new(),
            Type::Unit,
            Some(Expr::call(&ghost, Vec::new())),
        );
        let err = lower_at(vec![Declaration::Function(f)], 0).unwrap_err();
        assert!(matches!(err, CoreError::UnresolvedSymbol { kind: "function", .. }));
    }
}
