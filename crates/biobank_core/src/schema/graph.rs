//! Relationship graph over the table catalog.
//!
//! # Responsibility
//! - Answer parent/child questions for referential-integrity checks.
//! - Order tables so parents precede children (DDL, cascade planning).
//! - Describe the required-parent chain used for lineage tracing.
//!
//! # Invariants
//! - Every edge is single-parent; there are no many-to-many tables.
//! - The graph is acyclic; `dependency_order` rejects cycles.

use super::{ForeignKeyDef, TableDef};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Edge seen from the parent side.
#[derive(Debug, Clone, Copy)]
pub struct ChildEdge {
    pub table: &'static TableDef,
    pub foreign_key: &'static ForeignKeyDef,
}

impl ChildEdge {
    /// Child column holding the parent's key value.
    pub fn column(&self, parent: &TableDef) -> &'static str {
        self.foreign_key.key_column(parent.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    UnknownTable(String),
    Cycle(Vec<&'static str>),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTable(name) => write!(f, "foreign key targets unknown table `{name}`"),
            Self::Cycle(tables) => write!(f, "foreign keys form a cycle through {}", tables.join(", ")),
        }
    }
}

impl Error for GraphError {}

/// Finds a table by name.
pub fn find_table(
    tables: &[&'static TableDef],
    name: &str,
) -> Option<&'static TableDef> {
    tables.iter().copied().find(|table| table.name == name)
}

/// Direct children of `parent`, in catalog order.
pub fn children_of(tables: &[&'static TableDef], parent: &str) -> Vec<ChildEdge> {
    tables
        .iter()
        .copied()
        .flat_map(|table| {
            table
                .foreign_keys
                .iter()
                .filter(move |foreign_key| foreign_key.parent_table == parent)
                .map(move |foreign_key| ChildEdge {
                    table,
                    foreign_key,
                })
        })
        .collect()
}

/// Orders tables parents first (Kahn's algorithm, stable on catalog order).
pub fn dependency_order(
    tables: &[&'static TableDef],
) -> Result<Vec<&'static TableDef>, GraphError> {
    for table in tables {
        for foreign_key in table.foreign_keys {
            if find_table(tables, foreign_key.parent_table).is_none() {
                return Err(GraphError::UnknownTable(foreign_key.parent_table.to_string()));
            }
        }
    }

    let mut placed: BTreeSet<&'static str> = BTreeSet::new();
    let mut ordered = Vec::with_capacity(tables.len());

    while ordered.len() < tables.len() {
        let ready = tables.iter().copied().find(|table| {
            !placed.contains(table.name)
                && table
                    .foreign_keys
                    .iter()
                    .all(|foreign_key| {
                        foreign_key.parent_table == table.name
                            || placed.contains(foreign_key.parent_table)
                    })
        });

        match ready {
            Some(table) => {
                placed.insert(table.name);
                ordered.push(table);
            }
            None => {
                let remaining = tables
                    .iter()
                    .map(|table| table.name)
                    .filter(|name| !placed.contains(name))
                    .collect();
                return Err(GraphError::Cycle(remaining));
            }
        }
    }

    Ok(ordered)
}

/// Follows required foreign keys from `start` up to a root table.
///
/// The returned path starts with `start` itself.
pub fn lineage_path(
    tables: &[&'static TableDef],
    start: &str,
) -> Result<Vec<&'static TableDef>, GraphError> {
    let mut current = find_table(tables, start).ok_or_else(|| GraphError::UnknownTable(start.to_string()))?;
    let mut path = vec![current];

    while let Some(foreign_key) = current.foreign_keys.iter().find(|fk| fk.required) {
        let parent = find_table(tables, foreign_key.parent_table)
            .ok_or_else(|| GraphError::UnknownTable(foreign_key.parent_table.to_string()))?;
        if path.iter().any(|table| table.name == parent.name) {
            return Err(GraphError::Cycle(path.iter().map(|table| table.name).collect()));
        }
        path.push(parent);
        current = parent;
    }

    Ok(path)
}
