//! Structural deep copy of declarations.
//!
//! Every declaration defined inside the copied subtree (accessors,
//! parameters, the backing field, local variables, loops) gets a fresh id,
//! and every reference to one of them is rewritten to the new id.
//! References that leave the subtree are kept as they are. Copies of
//! functions and fields remember their source's link id in `copied_from`.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::ir::{
    DeclId, Expr, ExprKind, FieldDecl, FunctionDecl, IdGen, PropertyDecl, link_property,
};

pub struct DeepCopier<'g> {
    ids: &'g mut IdGen,
    remap: HashMap<DeclId, DeclId>,
}

impl<'g> DeepCopier<'g> {
    pub fn new(ids: &'g mut IdGen) -> Self {
        DeepCopier {
            ids,
            remap: HashMap::new(),
        }
    }

    /// Copy a property together with its accessors and backing field, owned
    /// by `parent`.
    pub fn copy_property(
        &mut self,
        property: &PropertyDecl,
        parent: Option<DeclId>,
    ) -> Result<PropertyDecl, CoreError> {
        let mut copy = property.clone();
        copy.id = self.rename(copy.id)?;
        for accessor in copy.getter.iter_mut().chain(copy.setter.iter_mut()) {
            self.renew_function(accessor)?;
        }
        if let Some(field) = &mut copy.backing_field {
            self.renew_field(field)?;
        }

        for accessor in copy.getter.iter_mut().chain(copy.setter.iter_mut()) {
            self.relink_function(accessor)?;
        }
        if let Some(field) = &mut copy.backing_field {
            if let Some(init) = &mut field.initializer {
                self.relink_expr(init)?;
            }
        }
        link_property(&mut copy, parent);
        Ok(copy)
    }

    /// Copy a free-standing function. Calls between functions copied by the
    /// same copier are rewritten to the copies.
    pub fn copy_function(
        &mut self,
        function: &FunctionDecl,
        parent: Option<DeclId>,
    ) -> Result<FunctionDecl, CoreError> {
        let mut copy = function.clone();
        self.renew_function(&mut copy)?;
        self.relink_function(&mut copy)?;
        copy.parent = parent;
        Ok(copy)
    }

    #[cfg(test)]
    fn remapped(&self, original: DeclId) -> Option<DeclId> {
        self.remap.get(&original).copied()
    }

    fn rename(&mut self, id: DeclId) -> Result<DeclId, CoreError> {
        if let Some(new) = self.remap.get(&id) {
            return Ok(*new);
        }
        let new = self.ids.fresh()?;
        self.remap.insert(id, new);
        Ok(new)
    }

    /// Rename the variables and loops declared inside `expr`.
    fn renew_locals(&mut self, expr: &mut Expr) -> Result<(), CoreError> {
        walk_expr_mut(expr, &mut |expr| {
            match &mut expr.kind {
                ExprKind::Variable(var) => var.id = self.rename(var.id)?,
                ExprKind::Loop(l) => l.id = self.rename(l.id)?,
                _ => {}
            }
            Ok(())
        })
    }

    fn renew_function(&mut self, function: &mut FunctionDecl) -> Result<(), CoreError> {
        function.copied_from = Some(function.link_id());
        function.id = self.rename(function.id)?;
        for tp in &mut function.type_params {
            tp.id = self.rename(tp.id)?;
        }
        let params = function
            .dispatch_receiver
            .iter_mut()
            .chain(function.extension_receiver.iter_mut())
            .chain(function.params.iter_mut());
        for param in params {
            param.id = self.rename(param.id)?;
        }
        if let Some(body) = &mut function.body {
            self.renew_locals(body)?;
        }
        Ok(())
    }

    fn renew_field(&mut self, field: &mut FieldDecl) -> Result<(), CoreError> {
        field.copied_from = Some(field.link_id());
        field.id = self.rename(field.id)?;
        if let Some(init) = &mut field.initializer {
            self.renew_locals(init)?;
        }
        Ok(())
    }

    fn relink_function(&self, function: &mut FunctionDecl) -> Result<(), CoreError> {
        if let Some(link) = &mut function.accessor {
            link.property = self.map(link.property);
        }
        match &mut function.body {
            Some(body) => self.relink_expr(body),
            None => Ok(()),
        }
    }

    fn relink_expr(&self, expr: &mut Expr) -> Result<(), CoreError> {
        walk_expr_mut(expr, &mut |expr| {
            match &mut expr.kind {
                ExprKind::GetValue(id)
                | ExprKind::GetField(id)
                | ExprKind::Break(id)
                | ExprKind::Continue(id)
                | ExprKind::SetValue { target: id, .. }
                | ExprKind::SetField { field: id, .. } => *id = self.map(*id),
                ExprKind::Call(call) => call.callee = self.map(call.callee),
                _ => {}
            }
            Ok(())
        })
    }

    fn map(&self, id: DeclId) -> DeclId {
        self.remap.get(&id).copied().unwrap_or(id)
    }
}

/// Pre-order traversal handing out mutable access to every node.
///
/// Stops at the first error `f` returns.
fn walk_expr_mut(
    expr: &mut Expr,
    f: &mut dyn FnMut(&mut Expr) -> Result<(), CoreError>,
) -> Result<(), CoreError> {
    f(expr)?;
    match &mut expr.kind {
        ExprKind::Const(_)
        | ExprKind::GetValue(_)
        | ExprKind::GetField(_)
        | ExprKind::Break(_)
        | ExprKind::Continue(_) => {}
        ExprKind::SetValue { value, .. } | ExprKind::SetField { value, .. } => {
            walk_expr_mut(value, f)?
        }
        ExprKind::Call(call) => {
            if let Some(receiver) = &mut call.dispatch_receiver {
                walk_expr_mut(receiver, f)?;
            }
            if let Some(receiver) = &mut call.extension_receiver {
                walk_expr_mut(receiver, f)?;
            }
            for arg in &mut call.args {
                walk_expr_mut(arg, f)?;
            }
        }
        ExprKind::Variable(var) => {
            if let Some(init) = &mut var.initializer {
                walk_expr_mut(init, f)?;
            }
        }
        ExprKind::Block(items) => {
            for item in items {
                walk_expr_mut(item, f)?;
            }
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_expr_mut(cond, f)?;
            walk_expr_mut(then_branch, f)?;
            if let Some(else_branch) = else_branch {
                walk_expr_mut(else_branch, f)?;
            }
        }
        ExprKind::Loop(l) => {
            walk_expr_mut(&mut l.cond, f)?;
            walk_expr_mut(&mut l.body, f)?;
        }
        ExprKind::Return(value) => {
            if let Some(value) = value {
                walk_expr_mut(value, f)?;
            }
        }
    }
    Ok(())
}
