//! Core domain logic for the biobank entity store.
//!
//! The catalog in `model::catalog` is the single source of truth for tables,
//! columns, keys and relationships; both storage engines are derived from it.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;
pub mod settings;

pub use db::{open_db, open_db_in_memory, open_with_settings, DbError, DbResult};
pub use logging::{default_log_level, init_from_settings, init_logging, logging_status, LoggingError};
pub use model::id::{IdGenerator, RandomIds, SequentialIds};
pub use model::trial::{TrialKind, TrialRecord, TrialSubtype};
pub use model::Entity;
pub use repo::{
    Constraint, DeletePolicy, DeleteReport, EntityRepository, ListQuery, Patch, RepoError,
    RepoResult, SqliteEntityRepository, SqliteTrialRepository, TrialRepository,
};
pub use schema::ddl::schema_script;
pub use schema::{DecodeError, Engine, FieldValue, PhysicalValue, ValidationError};
pub use service::biobank_service::{BiobankService, Lineage};
pub use settings::{DatabaseLocation, SettingsError, StoreSettings};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
