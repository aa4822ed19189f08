//! Generic entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/update/delete for every catalog entity.
//! - Keep SQL and engine encoding inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate the full record before any SQL mutation.
//! - Parent rows are checked by the application before storage sees the
//!   write; storage foreign keys remain enabled as the second line.
//! - Every write runs in one `IMMEDIATE` transaction.
//! - Read paths reject undecodable persisted state instead of masking it.

use super::error::{RepoError, RepoResult};
use super::rows::{
    claim_discriminator, decode_row, delete_tree, encode, ensure_connection_ready, ensure_parents,
    insert_row, key_exists, key_text, lookup_column, q, select_by_key, select_sql, update_columns,
    DeletePolicy, DeleteReport,
};
use crate::model::{Entity, FieldType};
use crate::schema::{FieldValue, ValidationError};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};

/// Equality filters plus pagination for `list`.
///
/// Results are always ordered by primary key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(String, FieldValue)>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `column = value`; a `Null` value matches `IS NULL`.
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// Partial update: named columns and their new logical values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    changes: Vec<(String, FieldValue)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one column; a later `set` of the same column wins.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.changes.push((column.into(), value.into()));
        self
    }

    /// Clears a nullable column.
    pub fn clear(self, column: impl Into<String>) -> Self {
        self.set(column, FieldValue::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[(String, FieldValue)] {
        &self.changes
    }
}

/// Repository interface for entity CRUD operations.
pub trait EntityRepository {
    /// Validates and inserts one record; returns its key.
    fn create<E: Entity>(&self, record: &E) -> RepoResult<E::Key>;
    /// Gets one record or fails with `NotFound`.
    fn get<E: Entity>(&self, key: &E::Key) -> RepoResult<E>;
    /// Gets one record if present.
    fn find<E: Entity>(&self, key: &E::Key) -> RepoResult<Option<E>>;
    fn exists<E: Entity>(&self, key: &E::Key) -> RepoResult<bool>;
    /// Lists records matching all filters, ordered by key.
    fn list<E: Entity>(&self, query: &ListQuery) -> RepoResult<Vec<E>>;
    /// Merges `patch` into the stored record and writes changed columns.
    fn update<E: Entity>(&self, key: &E::Key, patch: &Patch) -> RepoResult<E>;
    /// Deletes one record under `policy`.
    fn delete<E: Entity>(&self, key: &E::Key, policy: DeletePolicy) -> RepoResult<DeleteReport>;
}

/// SQLite-backed repository over every catalog table.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Wraps a connection another repository already checked.
    pub(crate) fn unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn create<E: Entity>(&self, record: &E) -> RepoResult<E::Key> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let result = insert_record(&tx, record);
        match result {
            Ok(()) => {
                tx.commit()?;
                info!(
                    "event=entity_create module=repo status=ok table={}",
                    E::table().name
                );
                Ok(record.key())
            }
            Err(err) => {
                warn!(
                    "event=entity_create module=repo status=error table={} error={}",
                    E::table().name,
                    err
                );
                Err(err)
            }
        }
    }

    fn get<E: Entity>(&self, key: &E::Key) -> RepoResult<E> {
        self.find::<E>(key)?.ok_or_else(|| RepoError::NotFound {
            table: E::table().name,
            key: key.to_string(),
        })
    }

    fn find<E: Entity>(&self, key: &E::Key) -> RepoResult<Option<E>> {
        load_record(self.conn, key)
    }

    fn exists<E: Entity>(&self, key: &E::Key) -> RepoResult<bool> {
        key_exists(self.conn, E::table(), &key.to_field())
    }

    fn list<E: Entity>(&self, query: &ListQuery) -> RepoResult<Vec<E>> {
        let table = E::table();
        let mut sql = format!("{} WHERE 1 = 1", select_sql(table));
        let mut bind_values: Vec<Value> = Vec::new();

        for (name, value) in &query.filters {
            let column = lookup_column(table, name)?;
            if *value == FieldValue::Null {
                sql.push_str(&format!(" AND {} IS NULL", q(column.name)));
                continue;
            }
            bind_values.push(encode(table, column, value)?);
            sql.push_str(&format!(" AND {} = ?{}", q(column.name), bind_values.len()));
        }

        sql.push_str(&format!(" ORDER BY {} ASC", q(table.key)));
        if query.limit.is_some() || query.offset > 0 {
            let limit = query.limit.map_or(-1, i64::from);
            sql.push_str(&format!(" LIMIT {limit} OFFSET {}", query.offset));
        }
        sql.push(';');

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(E::from_fields(decode_row(table, row)?)?);
        }
        Ok(records)
    }

    fn update<E: Entity>(&self, key: &E::Key, patch: &Patch) -> RepoResult<E> {
        let table = E::table();
        let key_value = key.to_field();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let current = select_by_key(&tx, table, &key_value)?.ok_or_else(|| RepoError::NotFound {
            table: table.name,
            key: key.to_string(),
        })?;

        let mut merged = current.clone();
        for (name, value) in patch.changes() {
            let column = lookup_column(table, name)?;
            if column.name == table.key {
                return Err(ValidationError::ImmutableColumn {
                    table: table.name,
                    column: column.name,
                }
                .into());
            }
            if let Some(index) = table.column_index(column.name) {
                merged[index] = value.clone();
            }
        }
        table.validate_row(&merged)?;
        let updated = E::from_fields(merged.clone())?;

        let changes: Vec<_> = table
            .columns
            .iter()
            .zip(current.iter().zip(&merged))
            .filter(|(_, (before, after))| before != after)
            .map(|(column, (_, after))| (column, after.clone()))
            .collect();
        let changed_columns: Vec<&'static str> =
            changes.iter().map(|(column, _)| column.name).collect();

        ensure_parents(&tx, table, &merged, Some(changed_columns.as_slice()))?;
        update_columns(&tx, table, &key_value, &changes)?;
        tx.commit()?;

        info!(
            "event=entity_update module=repo status=ok table={} changed_columns={}",
            table.name,
            changed_columns.len()
        );
        Ok(updated)
    }

    fn delete<E: Entity>(&self, key: &E::Key, policy: DeletePolicy) -> RepoResult<DeleteReport> {
        let table = E::table();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let report = match delete_tree(&tx, table, &key.to_field(), policy) {
            Ok(report) => report,
            Err(err) => {
                warn!(
                    "event=entity_delete module=repo status=error table={} policy={:?} error={}",
                    table.name, policy, err
                );
                return Err(err);
            }
        };
        tx.commit()?;

        info!(
            "event=entity_delete module=repo status=ok table={} policy={:?} deleted={} detached={}",
            table.name, policy, report.deleted, report.detached
        );
        Ok(report)
    }
}

/// Validates and inserts one record on `conn` without opening a transaction.
pub(crate) fn insert_record<E: Entity>(conn: &Connection, record: &E) -> RepoResult<()> {
    record.validate()?;
    let table = E::table();
    let values = record.to_fields();

    if key_exists(conn, table, &record.key().to_field())? {
        return Err(RepoError::UniqueKeyViolation {
            table: table.name,
            key: key_text(&record.key().to_field()),
        });
    }
    ensure_parents(conn, table, &values, None)?;
    claim_discriminator(conn, table, &values)?;
    insert_row(conn, table, &values)
}

pub(crate) fn load_record<E: Entity>(conn: &Connection, key: &E::Key) -> RepoResult<Option<E>> {
    match select_by_key(conn, E::table(), &key.to_field())? {
        Some(values) => Ok(Some(E::from_fields(values)?)),
        None => Ok(None),
    }
}
