//! Row-level SQL helpers shared by the biobank repositories.
//!
//! # Responsibility
//! - Render SQL for any catalog table and bind encoded values.
//! - Run parent pre-checks, discriminator claims and cascade planning.
//!
//! # Invariants
//! - Values cross this boundary only through `Engine::Sqlite` encode/decode.
//! - Helpers never open transactions; callers pass a `Transaction` when a
//!   write spans several statements.

use super::error::{classify_write_error, Constraint, RepoError, RepoResult};
use crate::db::migrations::latest_version;
use crate::model::catalog;
use crate::schema::graph::{children_of, ChildEdge};
use crate::schema::{ColumnDef, Engine, FieldValue, PhysicalValue, TableDef, ValidationError};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

const ENGINE: Engine = Engine::Sqlite;

/// Rows removed and references cleared by one delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: usize,
    pub detached: usize,
}

/// How a delete treats rows that reference the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Fail with `ConstraintViolation` while any row references the target.
    #[default]
    Reject,
    /// Delete required-FK descendants recursively and null optional
    /// references.
    Cascade,
}

pub(crate) fn q(identifier: &str) -> String {
    ENGINE.quote(identifier)
}

pub(crate) fn select_sql(table: &TableDef) -> String {
    let columns = table
        .columns
        .iter()
        .map(|column| q(column.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {columns} FROM {}", q(table.name))
}

/// Human readable rendering of a key for errors and logs.
pub(crate) fn key_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "NULL".to_string(),
        FieldValue::Text(text) => text.clone(),
        FieldValue::Boolean(flag) => flag.to_string(),
        FieldValue::Integer(number) => number.to_string(),
        FieldValue::Float(number) => number.to_string(),
        FieldValue::Date(date) => date.to_string(),
    }
}

pub(crate) fn key_column(table: &'static TableDef) -> RepoResult<&'static ColumnDef> {
    table
        .column(table.key)
        .ok_or(RepoError::MissingRequiredColumn {
            table: table.name,
            column: table.key,
        })
}

pub(crate) fn encode(
    table: &'static TableDef,
    column: &'static ColumnDef,
    value: &FieldValue,
) -> RepoResult<Value> {
    Ok(ENGINE.encode(table.name, column, value)?.into())
}

pub(crate) fn encode_key(table: &'static TableDef, key: &FieldValue) -> RepoResult<Value> {
    encode(table, key_column(table)?, key)
}

/// Decodes one selected row in column order.
pub(crate) fn decode_row(table: &'static TableDef, row: &Row<'_>) -> RepoResult<Vec<FieldValue>> {
    let mut values = Vec::with_capacity(table.columns.len());
    for (index, column) in table.columns.iter().enumerate() {
        let raw: Value = row.get(index)?;
        values.push(ENGINE.decode(table.name, column, PhysicalValue::from(raw))?);
    }
    Ok(values)
}

pub(crate) fn select_by_key(
    conn: &Connection,
    table: &'static TableDef,
    key: &FieldValue,
) -> RepoResult<Option<Vec<FieldValue>>> {
    let sql = format!("{} WHERE {} = ?1;", select_sql(table), q(table.key));
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([encode_key(table, key)?])?;
    match rows.next()? {
        Some(row) => Ok(Some(decode_row(table, row)?)),
        None => Ok(None),
    }
}

pub(crate) fn key_exists(
    conn: &Connection,
    table: &'static TableDef,
    key: &FieldValue,
) -> RepoResult<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
        q(table.name),
        q(table.key)
    );
    let exists: i64 = conn.query_row(&sql, [encode_key(table, key)?], |row| row.get(0))?;
    Ok(exists == 1)
}

/// Inserts one full row. A subtype discriminator takes its column default.
pub(crate) fn insert_row(
    conn: &Connection,
    table: &'static TableDef,
    values: &[FieldValue],
) -> RepoResult<()> {
    let mut bind_values = Vec::with_capacity(values.len());
    for (column, value) in table.columns.iter().zip(values) {
        bind_values.push(encode(table, column, value)?);
    }

    let columns = table
        .columns
        .iter()
        .map(|column| q(column.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=bind_values.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders});",
        q(table.name)
    );

    conn.execute(&sql, params_from_iter(bind_values))
        .map_err(|err| classify_write_error(table.name, &row_key_text(table, values), err))?;
    Ok(())
}

/// Writes the given columns of one row; returns the number of rows changed.
pub(crate) fn update_columns(
    conn: &Connection,
    table: &'static TableDef,
    key: &FieldValue,
    changes: &[(&'static ColumnDef, FieldValue)],
) -> RepoResult<usize> {
    if changes.is_empty() {
        return Ok(0);
    }

    let mut bind_values = Vec::with_capacity(changes.len() + 1);
    let mut assignments = Vec::with_capacity(changes.len());
    for (index, (column, value)) in changes.iter().enumerate() {
        assignments.push(format!("{} = ?{}", q(column.name), index + 1));
        bind_values.push(encode(table, column, value)?);
    }
    bind_values.push(encode_key(table, key)?);

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{};",
        q(table.name),
        assignments.join(", "),
        q(table.key),
        bind_values.len()
    );
    conn.execute(&sql, params_from_iter(bind_values))
        .map_err(|err| classify_write_error(table.name, &key_text(key), err))
}

pub(crate) fn delete_by_key(
    conn: &Connection,
    table: &'static TableDef,
    key: &FieldValue,
) -> RepoResult<usize> {
    let sql = format!("DELETE FROM {} WHERE {} = ?1;", q(table.name), q(table.key));
    conn.execute(&sql, [encode_key(table, key)?])
        .map_err(|err| classify_write_error(table.name, &key_text(key), err))
}

/// Checks that every non-null foreign key in `values` resolves to a parent.
///
/// Only foreign keys touching `columns` are checked; pass `None` to check all.
pub(crate) fn ensure_parents(
    conn: &Connection,
    table: &'static TableDef,
    values: &[FieldValue],
    columns: Option<&[&'static str]>,
) -> RepoResult<()> {
    for foreign_key in table.foreign_keys {
        if let Some(columns) = columns {
            if !foreign_key.columns.iter().any(|column| columns.contains(column)) {
                continue;
            }
        }

        let parent = catalog::table(foreign_key.parent_table)
            .ok_or(RepoError::MissingRequiredTable(foreign_key.parent_table))?;
        let column = foreign_key.key_column(parent.key);
        let Some(index) = table.column_index(column) else {
            continue;
        };
        let value = &values[index];
        if *value == FieldValue::Null {
            continue;
        }

        if !key_exists(conn, parent, value)? {
            return Err(Constraint::MissingParent {
                table: table.name,
                column,
                parent_table: parent.name,
                key: key_text(value),
            }
            .into());
        }
    }
    Ok(())
}

/// Marks the base row of a subtype row with the subtype's discriminator.
///
/// A base row that is still unspecialized (or already carries the same
/// value) is claimed; any other value is a `SubtypeConflict`.
pub(crate) fn claim_discriminator(
    conn: &Connection,
    table: &'static TableDef,
    values: &[FieldValue],
) -> RepoResult<()> {
    let Some(discriminator) = table.discriminator else {
        return Ok(());
    };
    let Some(foreign_key) = table
        .foreign_keys
        .iter()
        .find(|foreign_key| foreign_key.columns.contains(&discriminator.column))
    else {
        return Ok(());
    };
    let parent = catalog::table(foreign_key.parent_table)
        .ok_or(RepoError::MissingRequiredTable(foreign_key.parent_table))?;
    let parent_column = foreign_key
        .columns
        .iter()
        .position(|column| *column == discriminator.column)
        .map(|index| foreign_key.parent_columns[index])
        .unwrap_or(discriminator.column);

    let key_index = table
        .column_index(foreign_key.key_column(parent.key))
        .ok_or(RepoError::MissingRequiredColumn {
            table: table.name,
            column: foreign_key.key_column(parent.key),
        })?;
    let key = &values[key_index];
    let encoded_key = encode_key(parent, key)?;

    let changed = conn
        .execute(
            &format!(
                "UPDATE {parent_table} SET {column} = ?2
                 WHERE {key_column} = ?1 AND ({column} IS NULL OR {column} = ?2);",
                parent_table = q(parent.name),
                column = q(parent_column),
                key_column = q(parent.key),
            ),
            rusqlite::params![encoded_key, discriminator.value],
        )
        .map_err(|err| classify_write_error(parent.name, &key_text(key), err))?;
    if changed == 1 {
        debug!(
            "event=subtype_claim module=repo status=ok table={} kind={}",
            parent.name, discriminator.value
        );
        return Ok(());
    }

    let existing: Option<Option<String>> = conn
        .query_row(
            &format!(
                "SELECT {} FROM {} WHERE {} = ?1;",
                q(parent_column),
                q(parent.name),
                q(parent.key)
            ),
            [encode_key(parent, key)?],
            |row| row.get(0),
        )
        .optional()?;

    Err(match existing {
        None => Constraint::MissingParent {
            table: table.name,
            column: foreign_key.key_column(parent.key),
            parent_table: parent.name,
            key: key_text(key),
        },
        Some(existing) => Constraint::SubtypeConflict {
            table: parent.name,
            key: key_text(key),
            existing: existing.unwrap_or_else(|| "NULL".to_string()),
            requested: discriminator.value,
        },
    }
    .into())
}

/// Keys of rows in `edge.table` that reference `key` in `parent`.
pub(crate) fn referencing_keys(
    conn: &Connection,
    parent: &'static TableDef,
    edge: &ChildEdge,
    key: &FieldValue,
) -> RepoResult<Vec<FieldValue>> {
    let child = edge.table;
    let child_key = key_column(child)?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1 ORDER BY {};",
        q(child.key),
        q(child.name),
        q(edge.column(parent)),
        q(child.key)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([encode_key(parent, key)?])?;
    let mut keys = Vec::new();
    while let Some(row) = rows.next()? {
        let raw: Value = row.get(0)?;
        keys.push(ENGINE.decode(child.name, child_key, PhysicalValue::from(raw))?);
    }
    Ok(keys)
}

/// Deletes `key` from `table`, honoring `policy` for referencing rows.
///
/// Must run inside a transaction; a rejected or failed cascade leaves
/// partial work that only a rollback undoes.
pub(crate) fn delete_tree(
    conn: &Connection,
    table: &'static TableDef,
    key: &FieldValue,
    policy: DeletePolicy,
) -> RepoResult<DeleteReport> {
    let mut report = DeleteReport::default();

    for edge in children_of(catalog::tables(), table.name) {
        let dependents = referencing_keys(conn, table, &edge, key)?;
        if dependents.is_empty() {
            continue;
        }

        if policy == DeletePolicy::Reject {
            return Err(Constraint::HasDependents {
                table: table.name,
                key: key_text(key),
                dependent_table: edge.table.name,
                count: dependents.len(),
            }
            .into());
        }

        if edge.foreign_key.required {
            for dependent in &dependents {
                let nested = delete_tree(conn, edge.table, dependent, policy)?;
                report.deleted += nested.deleted;
                report.detached += nested.detached;
            }
        } else {
            let sql = format!(
                "UPDATE {} SET {column} = NULL WHERE {column} = ?1;",
                q(edge.table.name),
                column = q(edge.column(table)),
            );
            report.detached += conn
                .execute(&sql, [encode_key(table, key)?])
                .map_err(|err| classify_write_error(edge.table.name, &key_text(key), err))?;
        }
    }

    let deleted = delete_by_key(conn, table, key)?;
    if deleted == 0 {
        return Err(RepoError::NotFound {
            table: table.name,
            key: key_text(key),
        });
    }
    report.deleted += deleted;
    Ok(report)
}

/// Verifies the connection is migrated and every catalog column exists.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in catalog::tables() {
        if !table_exists(conn, table.name)? {
            return Err(RepoError::MissingRequiredTable(table.name));
        }
        let existing = table_columns(conn, table.name)?;
        for column in table.physical_column_names() {
            if !existing.iter().any(|name| name == column) {
                return Err(RepoError::MissingRequiredColumn {
                    table: table.name,
                    column,
                });
            }
        }
    }

    Ok(())
}

/// Resolves a caller-supplied column name against `table`.
pub(crate) fn lookup_column(
    table: &'static TableDef,
    name: &str,
) -> Result<&'static ColumnDef, ValidationError> {
    table.column(name).ok_or_else(|| ValidationError::UnknownColumn {
        table: table.name,
        column: name.to_string(),
    })
}

fn row_key_text(table: &TableDef, values: &[FieldValue]) -> String {
    table
        .column_index(table.key)
        .and_then(|index| values.get(index))
        .map_or_else(String::new, key_text)
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", q(table)))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
