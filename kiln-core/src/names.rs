//! Name tables.
//!
//! A [`NameTable`] maps semantic keys (declarations, loop labels) to output
//! names. Each key gets exactly one name, and no two keys of a table share
//! one. When a suggestion is already taken the table appends `_<n>` with
//! the smallest free `n`, so allocation depends only on the order of
//! requests.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use tracing::trace;

use crate::ir::DeclId;

#[derive(Debug, Clone)]
pub struct NameTable<K> {
    names: HashMap<K, String>,
    used: HashSet<String>,
}

impl<K> Default for NameTable<K> {
    fn default() -> Self {
        NameTable {
            names: HashMap::new(),
            used: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash> NameTable<K> {
    pub fn new() -> Self {
        NameTable::default()
    }

    /// Name `key`, seeding the allocation with `suggested`.
    ///
    /// A key that already has a name keeps it; the suggestion is ignored.
    pub fn declare_fresh_name(&mut self, key: K, suggested: &str) -> String {
        if let Some(existing) = self.names.get(&key) {
            return existing.clone();
        }
        let base = if suggested.is_empty() { "_" } else { suggested };
        let mut candidate = base.to_string();
        let mut n = 1;
        while self.used.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        trace!(suggested, allocated = %candidate, "declared fresh name");
        self.used.insert(candidate.clone());
        self.names.insert(key, candidate.clone());
        candidate
    }

    pub fn get(&self, key: &K) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.names.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The three labels every loop owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Break,
    Continue,
    Loop,
}

impl LabelKind {
    pub const ALL: [LabelKind; 3] = [LabelKind::Break, LabelKind::Continue, LabelKind::Loop];
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelKind::Break => f.write_str("BREAK"),
            LabelKind::Continue => f.write_str("CONTINUE"),
            LabelKind::Loop => f.write_str("LOOP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopLabelKey {
    pub loop_id: DeclId,
    pub kind: LabelKind,
}

impl LoopLabelKey {
    pub fn new(loop_id: DeclId, kind: LabelKind) -> Self {
        LoopLabelKey { loop_id, kind }
    }

    /// Seed for the label name: `<KIND>_<label>`.
    pub fn suggested_name(&self, label: Option<&str>) -> String {
        format!("{}_{}", self.kind, label.unwrap_or(""))
    }
}

/// Module-wide names for functions and globals.
///
/// Functions and globals share one namespace. Keys are link ids, so a
/// duplicated declaration resolves to the name of its source.
#[derive(Debug, Clone, Default)]
pub struct GlobalNames {
    table: NameTable<DeclId>,
}

impl GlobalNames {
    pub fn new() -> Self {
        GlobalNames::default()
    }

    pub fn name_for(&mut self, link: DeclId, suggested: &str) -> String {
        self.table.declare_fresh_name(link, suggested)
    }

    pub fn get(&self, link: DeclId) -> Option<&str> {
        self.table.get(&link)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
