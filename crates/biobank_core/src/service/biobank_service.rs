//! Biobank use-case service.
//!
//! # Responsibility
//! - Register records along the patient to trial chain with generated ids.
//! - Trace a trial back to the patient it originated from.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or integrity checks.
//! - Identifiers come from the service's `IdGenerator`, never from storage.

use crate::model::biomodel::{Biomodel, Passage};
use crate::model::id::{IdGenerator, RandomIds};
use crate::model::patient::{Patient, Tumor};
use crate::model::trial::{
    LcTrial, PdoTrial, PdxTrial, Trial, TrialKind, TrialRecord, TrialSubtype,
};
use crate::repo::{DeletePolicy, DeleteReport, EntityRepository, RepoResult, TrialRepository};
use serde::Serialize;
use uuid::Uuid;

/// Every record on the required-parent chain of one trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lineage {
    pub patient: Patient,
    pub tumor: Tumor,
    pub biomodel: Biomodel,
    pub passage: Passage,
    pub trial: TrialRecord,
}

/// Use-case service over entity and trial repositories.
pub struct BiobankService<E, T, G = RandomIds> {
    entities: E,
    trials: T,
    ids: G,
}

impl<E: EntityRepository, T: TrialRepository> BiobankService<E, T, RandomIds> {
    pub fn new(entities: E, trials: T) -> Self {
        Self::with_ids(entities, trials, RandomIds)
    }
}

impl<E: EntityRepository, T: TrialRepository, G: IdGenerator> BiobankService<E, T, G> {
    /// Creates a service drawing identifiers from `ids`.
    pub fn with_ids(entities: E, trials: T, ids: G) -> Self {
        Self {
            entities,
            trials,
            ids,
        }
    }

    pub fn entities(&self) -> &E {
        &self.entities
    }

    pub fn trials(&self) -> &T {
        &self.trials
    }

    pub fn register_patient(&self, patient: &Patient) -> RepoResult<String> {
        self.entities.create(patient)
    }

    pub fn register_tumor(&self, tumor: &Tumor) -> RepoResult<String> {
        self.entities.create(tumor)
    }

    /// Creates a biomodel grown from `tumor_biobank_code`.
    pub fn derive_biomodel(
        &self,
        tumor_biobank_code: &str,
        model_type: Option<&str>,
    ) -> RepoResult<Biomodel> {
        let mut biomodel = Biomodel::with_id(self.ids.next_id(), tumor_biobank_code);
        biomodel.model_type = model_type.map(str::to_string);
        self.entities.create(&biomodel)?;
        Ok(biomodel)
    }

    /// Records the next passage of a biomodel.
    pub fn record_passage(&self, biomodel_id: Uuid, number: Option<i32>) -> RepoResult<Passage> {
        let mut passage = Passage::with_id(self.ids.next_id(), biomodel_id);
        passage.number = number;
        self.entities.create(&passage)?;
        Ok(passage)
    }

    /// Starts a trial on a passage, specialized as `kind` when given.
    ///
    /// The subtype row starts with empty detail fields.
    pub fn start_trial(
        &self,
        passage_id: Uuid,
        kind: Option<TrialKind>,
    ) -> RepoResult<TrialRecord> {
        let trial = Trial::with_id(self.ids.next_id(), passage_id);
        let subtype = kind.map(|kind| match kind {
            TrialKind::Pdx => TrialSubtype::Pdx(PdxTrial::new(trial.id)),
            TrialKind::Pdo => TrialSubtype::Pdo(PdoTrial::new(trial.id)),
            TrialKind::Lc => TrialSubtype::Lc(LcTrial::new(trial.id)),
        });
        self.trials.create_trial(&trial, subtype.as_ref())?;
        self.trials.resolve_trial(trial.id)
    }

    /// Follows a trial's required parents up to its patient.
    pub fn trace_lineage(&self, trial_id: Uuid) -> RepoResult<Lineage> {
        let trial = self.trials.resolve_trial(trial_id)?;
        let passage: Passage = self.entities.get(&trial.trial.passage_id)?;
        let biomodel: Biomodel = self.entities.get(&passage.biomodel_id)?;
        let tumor: Tumor = self.entities.get(&biomodel.tumor_biobank_code)?;
        let patient: Patient = self.entities.get(&tumor.patient_nhc)?;
        Ok(Lineage {
            patient,
            tumor,
            biomodel,
            passage,
            trial,
        })
    }

    /// Deletes a patient; `Cascade` removes its whole subtree.
    pub fn remove_patient(&self, nhc: &str, policy: DeletePolicy) -> RepoResult<DeleteReport> {
        self.entities.delete::<Patient>(&nhc.to_string(), policy)
    }
}
