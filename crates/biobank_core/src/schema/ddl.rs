//! DDL rendering for both storage engines from one catalog.
//!
//! # Invariants
//! - Both engines receive the same tables, columns, keys and constraints;
//!   only physical types and dialect details differ.
//! - Tables are emitted parents first so every FK target already exists.
//! - Deletes are never cascaded by storage; `ON DELETE` stays the engine
//!   default (reject).

use super::engine::Engine;
use super::graph::{dependency_order, GraphError};
use super::{ColumnDef, TableDef};
use crate::model::catalog;

/// Renders the full schema script for `engine`.
pub fn schema_script(engine: Engine) -> Result<String, GraphError> {
    let ordered = dependency_order(catalog::tables())?;
    let mut script = String::new();
    for table in ordered {
        script.push_str(&create_table_sql(engine, table));
        script.push('\n');
        for statement in index_statements(engine, table) {
            script.push_str(&statement);
            script.push('\n');
        }
    }
    Ok(script)
}

/// Renders one `CREATE TABLE` statement.
pub fn create_table_sql(engine: Engine, table: &TableDef) -> String {
    let q = |name: &str| engine.quote(name);
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|column| column_sql(engine, column))
        .collect();

    if let Some(discriminator) = table.discriminator {
        let width = discriminator.value.len().max(1);
        let column_type = match engine {
            Engine::MySql => format!("VARCHAR({width})"),
            Engine::Sqlite => "TEXT".to_string(),
        };
        lines.push(format!(
            "{} {column_type} NOT NULL DEFAULT '{value}' CHECK ({} = '{value}')",
            q(discriminator.column),
            q(discriminator.column),
            value = discriminator.value,
        ));
    }

    lines.push(format!("PRIMARY KEY ({})", q(table.key)));

    for unique in table.unique {
        lines.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            q(&format!("uq_{}_{}", table.name, unique.join("_"))),
            join_quoted(engine, unique)
        ));
    }

    for foreign_key in table.foreign_keys {
        lines.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            q(&format!("fk_{}_{}", table.name, foreign_key.parent_table)),
            join_quoted(engine, foreign_key.columns),
            q(foreign_key.parent_table),
            join_quoted(engine, foreign_key.parent_columns),
        ));
    }

    let suffix = match engine {
        Engine::MySql => " ENGINE=InnoDB",
        Engine::Sqlite => "",
    };

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n){suffix};",
        q(table.name),
        lines.join(",\n    ")
    )
}

/// Child-side FK indexes. InnoDB creates these itself; SQLite does not.
pub fn index_statements(engine: Engine, table: &TableDef) -> Vec<String> {
    if engine == Engine::MySql {
        return Vec::new();
    }

    table
        .foreign_keys
        .iter()
        .filter(|foreign_key| !foreign_key.columns.contains(&table.key))
        .map(|foreign_key| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({});",
                engine.quote(&format!("idx_{}_{}", table.name, foreign_key.columns.join("_"))),
                engine.quote(table.name),
                join_quoted(engine, foreign_key.columns)
            )
        })
        .collect()
}

fn column_sql(engine: Engine, column: &ColumnDef) -> String {
    let mut sql = format!(
        "{} {}",
        engine.quote(column.name),
        engine.column_type(column.logical)
    );
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if !column.choices.is_empty() {
        let choices = column
            .choices
            .iter()
            .map(|choice| format!("'{choice}'"))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" CHECK ({} IN ({choices}))", engine.quote(column.name)));
    }
    sql
}

fn join_quoted(engine: Engine, names: &[&str]) -> String {
    names
        .iter()
        .map(|name| engine.quote(name))
        .collect::<Vec<_>>()
        .join(", ")
}
