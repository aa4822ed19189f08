//! Versioned schema steps for the embedded engine.
//!
//! # Invariants
//! - `version` values are strictly increasing.
//! - Steps run inside one transaction; the applied version is mirrored to
//!   `PRAGMA user_version`.
//! - Version 1 is rendered from the catalog, so the SQLite schema cannot
//!   drift from the MySQL script produced by `schema::ddl`.

use crate::db::{DbError, DbResult};
use crate::schema::ddl::schema_script;
use crate::schema::engine::Engine;
use crate::schema::graph::GraphError;
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    render: fn() -> Result<String, GraphError>,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "biobank_catalog",
    render: catalog_schema,
}];

fn catalog_schema() -> Result<String, GraphError> {
    schema_script(Engine::Sqlite)
}

/// Returns the latest schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending schema steps on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        let sql = (migration.render)()?;
        tx.execute_batch(&sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
