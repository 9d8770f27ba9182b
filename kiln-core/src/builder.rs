//! Convenience constructors for IR trees.
//!
//! Used by tests and tools that assemble IR by hand. Ids count up from
//! zero; [`IrBuilder::into_ids`] hands the remaining id space to passes that
//! allocate more.

use crate::ir::{
    ClassDecl, ClassKind, DeclId, Declaration, Expr, ExprKind, FieldDecl, FunctionDecl,
    FunctionKind, IdGen, LoopExpr, LoopKind, Origin, PropertyDecl, THIS_NAME, ValueParameter,
    VariableDecl, Visibility, link_property,
};
use crate::types::Type;

#[derive(Debug, Default)]
pub struct IrBuilder {
    next: u32,
}

impl IrBuilder {
    pub fn new() -> Self {
        IrBuilder::default()
    }

    /// An allocator continuing after the last id this builder handed out.
    pub fn into_ids(self) -> IdGen {
        IdGen::starting_at(self.next)
    }

    pub fn fresh_id(&mut self) -> DeclId {
        let id = DeclId(self.next);
        self.next += 1;
        id
    }

    pub fn peek_next(&self) -> DeclId {
        DeclId(self.next)
    }

    pub fn param(&mut self, name: &str, ty: Type) -> ValueParameter {
        ValueParameter {
            id: self.fresh_id(),
            name: name.to_string(),
            ty,
        }
    }

    /// A public, user-defined simple function.
    pub fn function(
        &mut self,
        name: &str,
        params: Vec<ValueParameter>,
        return_type: Type,
        body: Option<Expr>,
    ) -> FunctionDecl {
        FunctionDecl {
            id: self.fresh_id(),
            name: name.to_string(),
            kind: FunctionKind::Simple,
            visibility: Visibility::Public,
            origin: Origin::Defined,
            annotations: Vec::new(),
            is_fake_override: false,
            type_params: Vec::new(),
            dispatch_receiver: None,
            extension_receiver: None,
            params,
            return_type,
            body,
            accessor: None,
            copied_from: None,
            parent: None,
        }
    }

    pub fn variable(&mut self, name: &str, ty: Type, initializer: Option<Expr>) -> VariableDecl {
        VariableDecl {
            id: self.fresh_id(),
            name: name.to_string(),
            ty,
            mutable: true,
            initializer: initializer.map(Box::new),
        }
    }

    /// A `while` loop whose body does not refer to the loop itself.
    pub fn while_loop(&mut self, label: Option<&str>, cond: Expr, body: Expr) -> Expr {
        self.loop_with(LoopKind::While, label, |_, _| (cond, body))
    }

    /// A loop whose condition and body are built knowing the loop id, so
    /// they can `break`/`continue` it.
    pub fn loop_with(
        &mut self,
        kind: LoopKind,
        label: Option<&str>,
        build: impl FnOnce(&mut Self, DeclId) -> (Expr, Expr),
    ) -> Expr {
        let id = self.fresh_id();
        let (cond, body) = build(self, id);
        Expr::new(
            ExprKind::Loop(LoopExpr {
                id,
                label: label.map(str::to_string),
                kind,
                cond: Box::new(cond),
                body: Box::new(body),
            }),
            Type::Unit,
        )
    }

    pub fn field(&mut self, name: &str, ty: Type) -> FieldDecl {
        FieldDecl {
            id: self.fresh_id(),
            name: name.to_string(),
            ty,
            visibility: Visibility::Public,
            annotations: Vec::new(),
            initializer: None,
            copied_from: None,
            parent: None,
        }
    }

    /// A class with an implicit `this` receiver; members are reparented.
    pub fn class(&mut self, name: &str, members: Vec<Declaration>) -> ClassDecl {
        let id = self.fresh_id();
        let this_receiver = self.param(THIS_NAME, Type::named(name));
        let mut class = ClassDecl {
            id,
            name: name.to_string(),
            kind: ClassKind::Class,
            visibility: Visibility::Public,
            origin: Origin::Defined,
            annotations: Vec::new(),
            this_receiver: Some(this_receiver),
            members,
            parent: None,
        };
        class.link_members();
        class
    }

    /// A property backed by a field, with trivial accessors.
    pub fn property(&mut self, name: &str, ty: Type, getter: bool, setter: bool) -> PropertyDecl {
        let id = self.fresh_id();
        let field = self.field(name, ty.clone());

        let getter = getter.then(|| {
            let body = Expr::block(vec![Expr::ret(Some(Expr::get_field(&field)))], Type::Never);
            self.function(&format!("<get-{name}>"), Vec::new(), ty.clone(), Some(body))
        });
        let setter = setter.then(|| {
            let value = self.param("value", ty.clone());
            let body = Expr::block(vec![Expr::set_field(field.id, Expr::get(&value))], Type::Unit);
            self.function(&format!("<set-{name}>"), vec![value], Type::Unit, Some(body))
        });

        let mut property = PropertyDecl {
            id,
            name: name.to_string(),
            ty,
            visibility: Visibility::Public,
            annotations: Vec::new(),
            getter,
            setter,
            backing_field: Some(field),
            parent: None,
        };
        link_property(&mut property, None);
        property
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AccessorRole, ExprKind};

    #[test]
    fn property_accessors_use_backing_field() {
        let mut b = IrBuilder::new();
        let prop = b.property("size", Type::I64, true, true);
        let field_id = prop.backing_field.as_ref().unwrap().id;

        let getter = prop.accessor(AccessorRole::Getter).unwrap();
        assert_eq!(getter.name, "<get-size>");
        assert_eq!(getter.accessor.unwrap().property, prop.id);

        let setter = prop.accessor(AccessorRole::Setter).unwrap();
        let Some(Expr {
            kind: ExprKind::Block(items),
            ..
        }) = &setter.body
        else {
            panic!("setter body should be a block");
        };
        assert!(matches!(
            items[0].kind,
            ExprKind::SetField { field, .. } if field == field_id
        ));
    }

    #[test]
    fn loop_body_can_target_its_own_loop() {
        let mut b = IrBuilder::new();
        let expr = b.loop_with(LoopKind::DoWhile, Some("spin"), |_, id| {
            (Expr::bool(false), Expr::brk(id))
        });
        let ExprKind::Loop(l) = &expr.kind else {
            panic!("expected loop");
        };
        assert_eq!(l.body.kind, ExprKind::Break(l.id));
        assert_eq!(l.label.as_deref(), Some("spin"));
    }
}
