use biobank_core::db::open_db_in_memory;
use biobank_core::model::patient::{Patient, Tumor};
use biobank_core::{
    BiobankService, DeletePolicy, EntityRepository, RepoError, SequentialIds,
    SqliteEntityRepository, SqliteTrialRepository, TrialKind,
};
use uuid::Uuid;

#[test]
fn trace_lineage_walks_from_trial_to_patient() {
    let conn = open_db_in_memory().unwrap();
    let ids = SequentialIds::new(42);
    let service = BiobankService::with_ids(
        SqliteEntityRepository::try_new(&conn).unwrap(),
        SqliteTrialRepository::try_new(&conn).unwrap(),
        &ids,
    );

    service.register_patient(&Patient::new("P001")).unwrap();
    service.register_tumor(&Tumor::new("T001", "P001")).unwrap();
    let biomodel = service.derive_biomodel("T001", Some("PDX")).unwrap();
    let passage = service.record_passage(biomodel.id, Some(0)).unwrap();
    let trial = service.start_trial(passage.id, Some(TrialKind::Pdx)).unwrap();

    assert_eq!(biomodel.id, Uuid::from_u128((42u128 << 64) | 1));
    assert_eq!(trial.kind(), Some(TrialKind::Pdx));
    assert!(trial.as_pdx().is_some());

    let lineage = service.trace_lineage(trial.trial.id).unwrap();
    assert_eq!(lineage.patient.nhc, "P001");
    assert_eq!(lineage.tumor.biobank_code, "T001");
    assert_eq!(lineage.biomodel, biomodel);
    assert_eq!(lineage.passage, passage);
    assert_eq!(lineage.trial, trial);
}

#[test]
fn start_trial_on_missing_passage_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = BiobankService::new(
        SqliteEntityRepository::try_new(&conn).unwrap(),
        SqliteTrialRepository::try_new(&conn).unwrap(),
    );

    let err = service
        .start_trial(Uuid::new_v4(), Some(TrialKind::Lc))
        .unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
    assert!(service
        .trace_lineage(Uuid::new_v4())
        .unwrap_err()
        .is_not_found());
}

#[test]
fn remove_patient_cascades_through_the_chain() {
    let conn = open_db_in_memory().unwrap();
    let service = BiobankService::new(
        SqliteEntityRepository::try_new(&conn).unwrap(),
        SqliteTrialRepository::try_new(&conn).unwrap(),
    );
    service.register_patient(&Patient::new("P001")).unwrap();
    service.register_tumor(&Tumor::new("T001", "P001")).unwrap();
    let biomodel = service.derive_biomodel("T001", None).unwrap();
    let passage = service.record_passage(biomodel.id, None).unwrap();
    let trial = service.start_trial(passage.id, Some(TrialKind::Pdo)).unwrap();

    assert!(service
        .remove_patient("P001", DeletePolicy::Reject)
        .unwrap_err()
        .is_constraint_violation());

    let report = service.remove_patient("P001", DeletePolicy::Cascade).unwrap();
    assert_eq!(report.deleted, 6);
    assert!(!service
        .entities()
        .exists::<Patient>(&"P001".to_string())
        .unwrap());
    assert!(service.trace_lineage(trial.trial.id).unwrap_err().is_not_found());
}
