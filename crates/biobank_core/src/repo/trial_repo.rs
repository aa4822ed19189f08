//! Trial hierarchy repository.
//!
//! # Responsibility
//! - Create a trial together with its specialization atomically.
//! - Resolve a trial id to its full `TrialRecord`.
//!
//! # Invariants
//! - A trial and its subtype row are written in one transaction or not at
//!   all.
//! - `Trial.kind` always matches the subtype row when one exists; storage
//!   enforces this through the `(id, kind)` foreign key.

use super::entity_repo::{
    insert_record, load_record, EntityRepository, ListQuery, SqliteEntityRepository,
};
use super::error::{Constraint, RepoError, RepoResult};
use super::rows::ensure_connection_ready;
use crate::model::biomodel::Passage;
use crate::model::trial::{
    LcTrial, PdoTrial, PdxTrial, Trial, TrialKind, TrialRecord, TrialSubtype,
};
use crate::model::Entity;
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

/// Repository interface for the trial hierarchy.
pub trait TrialRepository {
    /// Inserts `trial` and, when given, its specialization as one unit.
    fn create_trial(&self, trial: &Trial, subtype: Option<&TrialSubtype>) -> RepoResult<Uuid>;
    /// Adds the specialization of an existing, unspecialized trial.
    fn specialize_trial(&self, subtype: &TrialSubtype) -> RepoResult<()>;
    /// Loads a trial with its specialization.
    fn resolve_trial(&self, id: Uuid) -> RepoResult<TrialRecord>;
    /// Discriminator of a trial; `None` while unspecialized.
    fn trial_kind(&self, id: Uuid) -> RepoResult<Option<TrialKind>>;
    /// Every trial grown from one passage, ordered by id.
    fn trials_for_passage(&self, passage_id: Uuid) -> RepoResult<Vec<TrialRecord>>;
}

/// SQLite-backed trial repository.
pub struct SqliteTrialRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTrialRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn entities(&self) -> SqliteEntityRepository<'conn> {
        SqliteEntityRepository::unchecked(self.conn)
    }
}

impl TrialRepository for SqliteTrialRepository<'_> {
    fn create_trial(&self, trial: &Trial, subtype: Option<&TrialSubtype>) -> RepoResult<Uuid> {
        if let Some(subtype) = subtype {
            check_subtype_matches(trial, subtype)?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let result = insert_record(&tx, trial)
            .and_then(|()| subtype.map_or(Ok(()), |subtype| insert_subtype(&tx, subtype)));
        if let Err(err) = result {
            warn!(
                "event=trial_create module=repo status=error kind={} error={}",
                subtype.map_or("none", |subtype| subtype.kind().as_str()),
                err
            );
            return Err(err);
        }
        tx.commit()?;

        info!(
            "event=trial_create module=repo status=ok kind={}",
            subtype.map_or("none", |subtype| subtype.kind().as_str())
        );
        Ok(trial.id)
    }

    fn specialize_trial(&self, subtype: &TrialSubtype) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_subtype(&tx, subtype)?;
        tx.commit()?;
        info!(
            "event=trial_specialize module=repo status=ok kind={}",
            subtype.kind()
        );
        Ok(())
    }

    fn resolve_trial(&self, id: Uuid) -> RepoResult<TrialRecord> {
        let trial: Trial = self.entities().get(&id)?;
        resolve_subtype(self.conn, trial)
    }

    fn trial_kind(&self, id: Uuid) -> RepoResult<Option<TrialKind>> {
        let trial: Trial = self.entities().get(&id)?;
        Ok(trial.kind)
    }

    fn trials_for_passage(&self, passage_id: Uuid) -> RepoResult<Vec<TrialRecord>> {
        let entities = self.entities();
        if !entities.exists::<Passage>(&passage_id)? {
            return Err(RepoError::NotFound {
                table: Passage::table().name,
                key: passage_id.to_string(),
            });
        }

        entities
            .list::<Trial>(&ListQuery::new().where_eq("passage_id", passage_id))?
            .into_iter()
            .map(|trial| resolve_subtype(self.conn, trial))
            .collect()
    }
}

fn check_subtype_matches(trial: &Trial, subtype: &TrialSubtype) -> RepoResult<()> {
    if subtype.trial_id() != trial.id {
        return Err(Constraint::SubtypeKeyMismatch {
            base_key: trial.id.to_string(),
            subtype_key: subtype.trial_id().to_string(),
        }
        .into());
    }
    if let Some(kind) = trial.kind {
        if kind != subtype.kind() {
            return Err(Constraint::SubtypeConflict {
                table: Trial::table().name,
                key: trial.id.to_string(),
                existing: kind.to_string(),
                requested: subtype.kind().as_str(),
            }
            .into());
        }
    }
    Ok(())
}

fn insert_subtype(conn: &Connection, subtype: &TrialSubtype) -> RepoResult<()> {
    match subtype {
        TrialSubtype::Pdx(row) => insert_record(conn, row),
        TrialSubtype::Pdo(row) => insert_record(conn, row),
        TrialSubtype::Lc(row) => insert_record(conn, row),
    }
}

fn resolve_subtype(conn: &Connection, trial: Trial) -> RepoResult<TrialRecord> {
    let subtype = match trial.kind {
        None => None,
        Some(TrialKind::Pdx) => load_record::<PdxTrial>(conn, &trial.id)?.map(TrialSubtype::Pdx),
        Some(TrialKind::Pdo) => load_record::<PdoTrial>(conn, &trial.id)?.map(TrialSubtype::Pdo),
        Some(TrialKind::Lc) => load_record::<LcTrial>(conn, &trial.id)?.map(TrialSubtype::Lc),
    };
    Ok(TrialRecord { trial, subtype })
}
