//! Repository error taxonomy.
//!
//! # Invariants
//! - Every storage constraint failure surfaces as `UniqueKeyViolation` or
//!   `ConstraintViolation`, never as a raw SQLite error.
//! - Nothing is retried; every variant reaches the caller.

use crate::db::DbError;
use crate::schema::{DecodeError, ValidationError};
use rusqlite::ffi;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Referential or discriminator rule that blocked a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// A foreign key value points at no parent row (or at a parent of the
    /// wrong subtype table).
    MissingParent {
        table: &'static str,
        column: &'static str,
        parent_table: &'static str,
        key: String,
    },
    /// The base row is already specialized as another subtype.
    SubtypeConflict {
        table: &'static str,
        key: String,
        existing: String,
        requested: &'static str,
    },
    /// A subtype row must reuse the id of the base row it specializes.
    SubtypeKeyMismatch { base_key: String, subtype_key: String },
    /// Delete rejected because rows still reference the target.
    HasDependents {
        table: &'static str,
        key: String,
        dependent_table: &'static str,
        count: usize,
    },
    /// Storage rejected the write; `detail` is the engine message.
    Storage { table: &'static str, detail: String },
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParent {
                table,
                column,
                parent_table,
                key,
            } => write!(
                f,
                "{table}.{column} references missing {parent_table} row `{key}`"
            ),
            Self::SubtypeConflict {
                table,
                key,
                existing,
                requested,
            } => write!(
                f,
                "{table} `{key}` is already `{existing}`; cannot specialize as `{requested}`"
            ),
            Self::SubtypeKeyMismatch {
                base_key,
                subtype_key,
            } => write!(
                f,
                "subtype key `{subtype_key}` does not match base key `{base_key}`"
            ),
            Self::HasDependents {
                table,
                key,
                dependent_table,
                count,
            } => write!(
                f,
                "{table} `{key}` is still referenced by {count} {dependent_table} row(s)"
            ),
            Self::Storage { table, detail } => write!(f, "{table}: {detail}"),
        }
    }
}

/// Error returned by every repository operation.
#[derive(Debug)]
pub enum RepoError {
    /// Record failed boundary validation; nothing was written.
    Validation(ValidationError),
    /// Stored value cannot be mapped back to its logical type.
    Decode(DecodeError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    NotFound { table: &'static str, key: String },
    UniqueKeyViolation { table: &'static str, key: String },
    ConstraintViolation(Constraint),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Decode(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { table, key } => write!(f, "{table} not found: {key}"),
            Self::UniqueKeyViolation { table, key } => {
                write!(f, "{table} key already exists: {key}")
            }
            Self::ConstraintViolation(constraint) => {
                write!(f, "constraint violation: {constraint}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "biobank repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "biobank repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "biobank repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::UniqueKeyViolation { .. } => None,
            Self::ConstraintViolation(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DecodeError> for RepoError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<Constraint> for RepoError {
    fn from(value: Constraint) -> Self {
        Self::ConstraintViolation(value)
    }
}

/// Maps a failed write on `table` to the repository taxonomy by SQLite
/// extended result code.
pub(crate) fn classify_write_error(table: &'static str, key: &str, err: rusqlite::Error) -> RepoError {
    let rusqlite::Error::SqliteFailure(failure, message) = &err else {
        return err.into();
    };
    if failure.code != rusqlite::ErrorCode::ConstraintViolation {
        return err.into();
    }

    let detail = message
        .clone()
        .unwrap_or_else(|| "constraint failed".to_string());
    match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
            RepoError::UniqueKeyViolation {
                table,
                key: key.to_string(),
            }
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        | ffi::SQLITE_CONSTRAINT_CHECK
        | ffi::SQLITE_CONSTRAINT_NOTNULL => {
            RepoError::ConstraintViolation(Constraint::Storage { table, detail })
        }
        _ => err.into(),
    }
}
