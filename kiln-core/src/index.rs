//! Declaration index for a module under construction.
//!
//! Lowering refers to other declarations only by id (call targets, field
//! reads). The index answers what those ids are: their fully qualified
//! name, their link id for symbol naming, and whether calls to them are
//! inlined intrinsics.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::intrinsics::{NumericOp, find_intrinsic};
use crate::ir::{Annotated, ClassDecl, DeclId, Declaration, FieldDecl, FileUnit, FunctionDecl, PropertyDecl};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    Function {
        intrinsic: Option<NumericOp>,
        return_type: Type,
    },
    Field {
        ty: Type,
    },
    Class,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub name: String,
    pub fq_name: String,
    pub link: DeclId,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    entries: HashMap<DeclId, IndexEntry>,
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

impl ModuleIndex {
    pub fn new() -> Self {
        ModuleIndex::default()
    }

    pub fn from_units(units: &[FileUnit]) -> Result<Self, CoreError> {
        let mut index = ModuleIndex::new();
        for unit in units {
            index.add_unit(unit)?;
        }
        Ok(index)
    }

    pub fn add_unit(&mut self, unit: &FileUnit) -> Result<(), CoreError> {
        for decl in &unit.declarations {
            self.add_declaration(decl, &unit.package)?;
        }
        Ok(())
    }

    pub fn add_declaration(&mut self, decl: &Declaration, scope: &str) -> Result<(), CoreError> {
        match decl {
            Declaration::Function(f) => self.add_function(f, scope),
            Declaration::Field(f) => {
                self.add_field(f, scope);
                Ok(())
            }
            Declaration::Property(p) => self.add_property(p, scope),
            Declaration::Class(c) => self.add_class(c, scope),
            Declaration::Variable(_) => Ok(()),
        }
    }

    fn add_class(&mut self, class: &ClassDecl, scope: &str) -> Result<(), CoreError> {
        let fq_name = qualify(scope, &class.name);
        for member in &class.members {
            self.add_declaration(member, &fq_name)?;
        }
        self.entries.insert(
            class.id,
            IndexEntry {
                name: class.name.clone(),
                fq_name,
                link: class.id,
                kind: EntryKind::Class,
            },
        );
        Ok(())
    }

    pub fn add_function(&mut self, function: &FunctionDecl, scope: &str) -> Result<(), CoreError> {
        let intrinsic = match function.wasm_op() {
            Some(op) => Some(
                find_intrinsic(op)
                    .ok_or_else(|| CoreError::UnknownIntrinsic(op.to_string()))?
                    .op,
            ),
            None => None,
        };
        self.entries.insert(
            function.id,
            IndexEntry {
                name: function.name.clone(),
                fq_name: qualify(scope, &function.name),
                link: function.link_id(),
                kind: EntryKind::Function {
                    intrinsic,
                    return_type: function.return_type.clone(),
                },
            },
        );
        Ok(())
    }

    pub fn add_field(&mut self, field: &FieldDecl, scope: &str) {
        self.entries.insert(
            field.id,
            IndexEntry {
                name: field.name.clone(),
                fq_name: qualify(scope, &field.name),
                link: field.link_id(),
                kind: EntryKind::Field {
                    ty: field.ty.clone(),
                },
            },
        );
    }

    pub fn add_property(&mut self, property: &PropertyDecl, scope: &str) -> Result<(), CoreError> {
        for accessor in property.accessors() {
            self.add_function(accessor, scope)?;
        }
        if let Some(field) = &property.backing_field {
            self.add_field(field, scope);
        }
        Ok(())
    }

    /// Index a detached property copy under the scope of its parent class.
    pub fn add_detached_property(&mut self, property: &PropertyDecl) -> Result<(), CoreError> {
        let scope = property
            .parent
            .and_then(|parent| self.entries.get(&parent))
            .map(|entry| entry.fq_name.clone())
            .unwrap_or_default();
        self.add_property(property, &scope)
    }

    pub fn get(&self, id: DeclId) -> Option<&IndexEntry> {
        self.entries.get(&id)
    }

    pub fn function(&self, id: DeclId) -> Result<&IndexEntry, CoreError> {
        match self.entries.get(&id) {
            Some(entry) if matches!(entry.kind, EntryKind::Function { .. }) => Ok(entry),
            _ => Err(CoreError::unresolved("function", id)),
        }
    }

    pub fn field(&self, id: DeclId) -> Result<&IndexEntry, CoreError> {
        match self.entries.get(&id) {
            Some(entry) if matches!(entry.kind, EntryKind::Field { .. }) => Ok(entry),
            _ => Err(CoreError::unresolved("field", id)),
        }
    }

    /// Fully qualified name, or the bare id when the declaration is unknown.
    pub fn describe(&self, id: DeclId, fallback: &str) -> String {
        self.entries
            .get(&id)
            .map(|entry| entry.fq_name.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IrBuilder;
    use crate::ir::Annotation;

    #[test]
    fn qualifies_members_with_package_and_class() {
        let mut b = IrBuilder::new();
        let f = b.function("run", Vec::new(), Type::Unit, None);
        let f_id = f.id;
        let prop = b.property("size", Type::I32, true, false);
        let getter_id = prop.getter.as_ref().unwrap().id;
        let class = b.class(
            "Box",
            vec![Declaration::Function(f), Declaration::Property(prop)],
        );

        let mut unit = FileUnit::new("box.kt", "demo.util");
        unit.declarations.push(Declaration::Class(class));
        let index = ModuleIndex::from_units(&[unit]).expect("index");

        assert_eq!(index.function(f_id).unwrap().fq_name, "demo.util.Box.run");
        assert_eq!(
            index.function(getter_id).unwrap().fq_name,
            "demo.util.Box.<get-size>"
        );
        assert!(index.field(f_id).is_err());
    }

    #[test]
    fn records_intrinsic_ops_and_rejects_unknown_ones() {
        let mut b = IrBuilder::new();
        let mut add = b.function("plus", Vec::new(), Type::I32, None);
        add.annotations.push(Annotation::WasmOp("I32_ADD".into()));
        let mut index = ModuleIndex::new();
        index.add_function(&add, "").expect("known op");
        assert!(matches!(
            index.function(add.id).unwrap().kind,
            EntryKind::Function {
                intrinsic: Some(NumericOp::I32Add),
                ..
            }
        ));

        let mut bogus = b.function("bogus", Vec::new(), Type::I32, None);
        bogus.annotations.push(Annotation::WasmOp("I32_FROB".into()));
        let err = index.add_function(&bogus, "").unwrap_err();
        assert!(matches!(err, CoreError::UnknownIntrinsic(name) if name == "I32_FROB"));
    }
}
