//! Multifile facade generation.
//!
//! An earlier pass splits one logical file into several part classes, each
//! annotated with the facade it belongs to. This pass synthesizes the
//! facade class itself: one public class per facade whose members forward
//! to the real implementations in the parts.
//!
//! A forwarding member's body is a single call to its target followed by a
//! return of the result. Targets are always part members or accessor
//! copies owned by a part, never the facade, so forwarding cannot recurse.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::copy::DeepCopier;
use crate::error::CoreError;
use crate::ir::{
    Annotated, Call, ClassDecl, ClassKind, DeclId, Declaration, Expr, ExprKind, FileUnit,
    FunctionDecl, FunctionKind, IdGen, Origin, PropertyDecl, THIS_NAME, TypeParameter,
    ValueParameter, Visibility,
};
use crate::types::Type;

/// Part classes waiting to be merged, by fully qualified facade name.
///
/// Filled while the declarations are lowered and drained by
/// [`generate_facades`].
#[derive(Debug, Clone, Default)]
pub struct MultifileFacadeContext {
    pending: BTreeMap<String, Vec<ClassDecl>>,
}

impl MultifileFacadeContext {
    pub fn new() -> Self {
        MultifileFacadeContext::default()
    }

    pub fn register_part(&mut self, facade: impl Into<String>, part: ClassDecl) {
        self.pending.entry(facade.into()).or_default().push(part);
    }

    pub fn parts(&self, facade: &str) -> Option<&[ClassDecl]> {
        self.pending.get(facade).map(Vec::as_slice)
    }

    /// Number of facades with pending parts.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// One generated facade.
#[derive(Debug, Clone, PartialEq)]
pub struct FacadeUnit {
    pub unit: FileUnit,
    /// Property copies created for accessor forwarding. They are owned by
    /// part classes and are not part of `unit`.
    pub accessor_copies: Vec<PropertyDecl>,
}

/// Build every pending facade and clear the context.
pub fn generate_facades(
    context: &mut MultifileFacadeContext,
    ids: &mut IdGen,
) -> Result<Vec<FacadeUnit>, CoreError> {
    let pending = std::mem::take(&mut context.pending);
    let mut units = Vec::with_capacity(pending.len());
    for (facade, parts) in pending {
        units.push(build_facade(&facade, &parts, ids)?);
    }
    Ok(units)
}

fn build_facade(facade: &str, parts: &[ClassDecl], ids: &mut IdGen) -> Result<FacadeUnit, CoreError> {
    let (package, simple_name) = match facade.rsplit_once('.') {
        Some((package, name)) => (package, name),
        None => ("", facade),
    };
    let facade_id = ids.fresh()?;
    let this_receiver = ValueParameter {
        id: ids.fresh()?,
        name: THIS_NAME.to_string(),
        ty: Type::named(facade),
    };

    let mut members = Vec::new();
    let mut accessor_copies = Vec::new();
    for part in parts {
        if part.is_excluded() {
            debug!(facade, part = %part.name, "part is excluded from code generation");
            continue;
        }
        for member in &part.members {
            match member {
                Declaration::Function(f) => {
                    if !is_forwardable(f) {
                        debug!(facade, member = %f.name, "not forwarding");
                        continue;
                    }
                    let forwarder = forwarding_function(f, f.id, facade_id, ids)?;
                    members.push(Declaration::Function(forwarder));
                }
                Declaration::Property(p) => {
                    if let Some(copy) = forward_accessors(p, part, facade_id, ids, &mut members)? {
                        accessor_copies.push(copy);
                    }
                }
                Declaration::Class(_) | Declaration::Field(_) | Declaration::Variable(_) => {}
            }
        }
    }

    info!(facade, parts = parts.len(), members = members.len(), "generated multifile facade");

    let class = ClassDecl {
        id: facade_id,
        name: simple_name.to_string(),
        kind: ClassKind::Class,
        visibility: Visibility::Public,
        origin: Origin::Generated,
        annotations: Vec::new(),
        this_receiver: Some(this_receiver),
        members,
        parent: None,
    };
    let mut unit = FileUnit::new(facade, package);
    unit.declarations.push(Declaration::Class(class));
    unit.link_parents();
    Ok(FacadeUnit {
        unit,
        accessor_copies,
    })
}

/// Members that are not emitted have nothing to forward to.
fn is_forwardable(function: &FunctionDecl) -> bool {
    function.kind == FunctionKind::Simple
        && function.visibility != Visibility::Private
        && !function.is_excluded()
        && !function.is_fake_override
        && !function.is_class_initializer()
        && !matches!(
            function.origin,
            Origin::SyntheticAccessor | Origin::MultifileBridge
        )
}

/// Forward the accessors of `property` through a copy owned by `part`.
///
/// Returns the copy when at least one accessor was forwarded.
fn forward_accessors(
    property: &PropertyDecl,
    part: &ClassDecl,
    facade_id: DeclId,
    ids: &mut IdGen,
    members: &mut Vec<Declaration>,
) -> Result<Option<PropertyDecl>, CoreError> {
    if property.is_excluded() {
        return Ok(None);
    }
    let forwarded: Vec<&FunctionDecl> = property.accessors().filter(|a| is_forwardable(a)).collect();
    if forwarded.is_empty() {
        return Ok(None);
    }

    let copy = DeepCopier::new(ids).copy_property(property, Some(part.id))?;
    for accessor in forwarded {
        let link = match accessor.accessor {
            Some(link) if link.property == property.id => link,
            _ => {
                return Err(CoreError::unsupported(
                    format!(
                        "accessor `{}` is not linked to property `{}`",
                        accessor.name, property.name
                    ),
                    accessor,
                ));
            }
        };
        let target = copy.accessor(link.role).ok_or_else(|| {
            CoreError::unsupported(
                format!(
                    "property `{}` has no {} to forward `{}` to",
                    property.name, link.role, accessor.name
                ),
                property,
            )
        })?;
        let forwarder = forwarding_function(accessor, target.id, facade_id, ids)?;
        members.push(Declaration::Function(forwarder));
    }
    Ok(Some(copy))
}

/// A facade member with the signature of `original` whose body returns
/// the result of calling `target`.
fn forwarding_function(
    original: &FunctionDecl,
    target: DeclId,
    facade_id: DeclId,
    ids: &mut IdGen,
) -> Result<FunctionDecl, CoreError> {
    if original.dispatch_receiver.is_some() {
        return Err(CoreError::unsupported(
            format!(
                "`{}` has a dispatch receiver and cannot be forwarded statically",
                original.name
            ),
            original,
        ));
    }

    let mut fresh_param = |p: &ValueParameter| -> Result<ValueParameter, CoreError> {
        Ok(ValueParameter {
            id: ids.fresh()?,
            name: p.name.clone(),
            ty: p.ty.clone(),
        })
    };
    let extension_receiver = original
        .extension_receiver
        .as_ref()
        .map(&mut fresh_param)
        .transpose()?;
    let params = original
        .params
        .iter()
        .map(&mut fresh_param)
        .collect::<Result<Vec<_>, _>>()?;
    let type_params = original
        .type_params
        .iter()
        .map(|tp| {
            Ok(TypeParameter {
                id: ids.fresh()?,
                name: tp.name.clone(),
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    let call = Expr::new(
        ExprKind::Call(Call {
            callee: target,
            dispatch_receiver: None,
            extension_receiver: extension_receiver.as_ref().map(|p| Box::new(Expr::get(p))),
            args: params.iter().map(Expr::get).collect(),
        }),
        original.return_type.clone(),
    );
    let body = Expr::block(vec![Expr::ret(Some(call))], Type::Never);

    Ok(FunctionDecl {
        id: ids.fresh()?,
        name: original.name.clone(),
        kind: FunctionKind::Simple,
        visibility: original.visibility,
        origin: Origin::MultifileBridge,
        annotations: Vec::new(),
        is_fake_override: false,
        type_params,
        dispatch_receiver: None,
        extension_receiver,
        params,
        return_type: original.return_type.clone(),
        body: Some(body),
        accessor: None,
        copied_from: None,
        parent: Some(facade_id),
    })
}
