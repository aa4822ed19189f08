//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate records before persistence.
//! - Repository APIs return semantic errors (`NotFound`,
//!   `UniqueKeyViolation`, `ConstraintViolation`) in addition to DB
//!   transport errors.

pub mod entity_repo;
pub mod error;
mod rows;
pub mod trial_repo;

pub use entity_repo::{EntityRepository, ListQuery, Patch, SqliteEntityRepository};
pub use error::{Constraint, RepoError, RepoResult};
pub use rows::{DeletePolicy, DeleteReport};
pub use trial_repo::{SqliteTrialRepository, TrialRepository};
