//! Resolved schema: lookup tables and the reverse (cascade) relation index.

use super::entity::EntityKind;
use super::lims::{EntitySpec, FieldSpec, FieldType, SPECS};
use std::collections::HashMap;

/// One foreign-key edge: `kind.field` points at `target`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relation {
    pub kind: EntityKind,
    pub field: &'static str,
    pub target: EntityKind,
}

/// The LIMS schema resolved for runtime use: spec lookup by kind and path,
/// plus the dependents index the cascade walker needs. Built once at startup
/// and shared through `AppState`.
pub struct SchemaRegistry {
    by_kind: HashMap<EntityKind, &'static EntitySpec>,
    by_path: HashMap<&'static str, EntityKind>,
    /// For each kind, the relations whose `target` is that kind.
    dependents: HashMap<EntityKind, Vec<Relation>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let mut by_kind = HashMap::new();
        let mut by_path = HashMap::new();
        let mut dependents: HashMap<EntityKind, Vec<Relation>> = HashMap::new();
        for spec in SPECS {
            by_kind.insert(spec.kind, spec);
            by_path.insert(spec.path_segment, spec.kind);
            for rel in references_of(spec) {
                dependents.entry(rel.target).or_default().push(rel);
            }
        }
        SchemaRegistry {
            by_kind,
            by_path,
            dependents,
        }
    }

    pub fn spec(&self, kind: EntityKind) -> &'static EntitySpec {
        // Every variant has an entry in SPECS; the self_check test keeps it that way.
        self.by_kind[&kind]
    }

    pub fn kind_for_path(&self, path_segment: &str) -> Option<EntityKind> {
        self.by_path.get(path_segment).copied()
    }

    pub fn field(&self, kind: EntityKind, name: &str) -> Option<&'static FieldSpec> {
        self.spec(kind).fields.iter().find(|f| f.name == name)
    }

    /// Outgoing foreign keys of a kind.
    pub fn references(&self, kind: EntityKind) -> impl Iterator<Item = Relation> + '_ {
        references_of(self.spec(kind))
    }

    /// Incoming foreign keys: the rows that must go when a row of `kind` goes.
    pub fn dependents(&self, kind: EntityKind) -> &[Relation] {
        self.dependents.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn uniques(&self, kind: EntityKind) -> &'static [&'static [&'static str]] {
        self.spec(kind).uniques
    }

    pub fn allows(&self, kind: EntityKind, operation: &str) -> bool {
        self.spec(kind).operations.iter().any(|o| *o == operation)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn references_of(spec: &'static EntitySpec) -> impl Iterator<Item = Relation> {
    spec.fields.iter().filter_map(move |f| match f.field_type {
        FieldType::Reference(target) => Some(Relation {
            kind: spec.kind,
            field: f.name,
            target,
        }),
        _ => None,
    })
}
