use biobank_core::db::open_db_in_memory;
use biobank_core::model::biomodel::{Biomodel, Passage};
use biobank_core::model::lc::Facs;
use biobank_core::model::patient::{Patient, Tumor};
use biobank_core::model::pdx::{Implant, Mouse, SizeRecord};
use biobank_core::model::trial::{LcTrial, PdoTrial, PdxTrial, Trial};
use biobank_core::model::trial_records::{Cryopreservation, Image, UsageRecord};
use biobank_core::{
    Constraint, DeletePolicy, Entity, EntityRepository, Patch, RepoError, SqliteEntityRepository,
    SqliteTrialRepository, TrialKind, TrialRepository, TrialSubtype,
};
use rusqlite::Connection;
use uuid::Uuid;

/// P001 -> T001 -> biomodel -> passage; returns the passage id.
fn seed_passage(repo: &SqliteEntityRepository<'_>) -> Uuid {
    repo.create(&Patient::new("P001")).unwrap();
    repo.create(&Tumor::new("T001", "P001")).unwrap();
    let biomodel = Biomodel::new("T001");
    repo.create(&biomodel).unwrap();
    let passage = Passage::new(biomodel.id);
    repo.create(&passage).unwrap();
    passage.id
}

#[test]
fn pdx_trial_resolves_from_the_full_chain() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    let mut pdx = PdxTrial::new(trial.id);
    pdx.latency_weeks = Some(6);
    trials
        .create_trial(&trial, Some(&TrialSubtype::Pdx(pdx.clone())))
        .unwrap();

    let record = trials.resolve_trial(trial.id).unwrap();
    assert_eq!(record.kind(), Some(TrialKind::Pdx));
    assert_eq!(record.as_pdx(), Some(&pdx));
    assert_eq!(record.as_pdo(), None);
    assert_eq!(trials.trial_kind(trial.id).unwrap(), Some(TrialKind::Pdx));
}

#[test]
fn second_specialization_of_a_pdx_trial_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    trials
        .create_trial(&trial, Some(&TrialSubtype::Pdx(PdxTrial::new(trial.id))))
        .unwrap();

    let err = entities.create(&PdoTrial::new(trial.id)).unwrap_err();
    match err {
        RepoError::ConstraintViolation(Constraint::SubtypeConflict {
            existing,
            requested,
            ..
        }) => {
            assert_eq!(existing, "pdx");
            assert_eq!(requested, "pdo");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(row_count(&conn, "pdo_trial"), 0);
    assert_eq!(trials.trial_kind(trial.id).unwrap(), Some(TrialKind::Pdx));
}

#[test]
fn storage_rejects_subtype_rows_with_a_mismatched_kind() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    trials
        .create_trial(&trial, Some(&TrialSubtype::Lc(LcTrial::new(trial.id))))
        .unwrap();

    let err = conn
        .execute(
            "INSERT INTO pdx_trial (id) VALUES (?1);",
            [trial.id.to_string()],
        )
        .unwrap_err();
    assert_eq!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    );
}

#[test]
fn implant_pointing_at_an_lc_trial_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    trials
        .create_trial(&trial, Some(&TrialSubtype::Lc(LcTrial::new(trial.id))))
        .unwrap();

    let err = entities.create(&Implant::new(trial.id)).unwrap_err();
    match err {
        RepoError::ConstraintViolation(Constraint::MissingParent { parent_table, .. }) => {
            assert_eq!(parent_table, "pdx_trial");
        }
        other => panic!("unexpected error: {other}"),
    }

    let facs = Facs::new(Some(trial.id));
    entities.create(&facs).unwrap();
}

fn assert_missing_parent<E: Entity>(
    repo: &SqliteEntityRepository<'_>,
    record: &E,
    expected_parent: &str,
) where
    E::Key: std::fmt::Debug,
{
    match repo.create(record).unwrap_err() {
        RepoError::ConstraintViolation(Constraint::MissingParent { parent_table, .. }) => {
            assert_eq!(parent_table, expected_parent, "{}", E::table().name);
        }
        other => panic!("{}: unexpected error: {other}", E::table().name),
    }
}

#[test]
fn every_required_parent_must_exist() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    assert_missing_parent(&repo, &Tumor::new("T404", "P404"), "patient");
    assert_missing_parent(&repo, &Biomodel::new("T404"), "tumor");
    assert_missing_parent(&repo, &Passage::new(missing), "biomodel");
    assert_missing_parent(&repo, &Trial::new(missing), "passage");
    assert_missing_parent(&repo, &PdxTrial::new(missing), "trial");
    assert_missing_parent(&repo, &PdoTrial::new(missing), "trial");
    assert_missing_parent(&repo, &LcTrial::new(missing), "trial");
    assert_missing_parent(&repo, &Implant::new(missing), "pdx_trial");
    assert_missing_parent(&repo, &SizeRecord::new(missing), "implant");
    assert_missing_parent(&repo, &Mouse::new(missing), "pdx_trial");
    assert_missing_parent(&repo, &Facs::new(Some(missing)), "lc_trial");
    assert_missing_parent(&repo, &UsageRecord::new(missing), "trial");
    assert_missing_parent(&repo, &Image::new(missing), "trial");
    assert_missing_parent(&repo, &Cryopreservation::new(missing), "trial");

    for table in ["patient", "tumor", "biomodel", "passage", "trial", "implant", "mouse", "facs"] {
        assert_eq!(row_count(&conn, table), 0, "{table}");
    }
}

#[test]
fn mouse_and_facs_reject_trials_of_another_kind() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let pdx = Trial::new(passage_id);
    trials
        .create_trial(&pdx, Some(&TrialSubtype::Pdx(PdxTrial::new(pdx.id))))
        .unwrap();
    let pdo = Trial::new(passage_id);
    trials
        .create_trial(&pdo, Some(&TrialSubtype::Pdo(PdoTrial::new(pdo.id))))
        .unwrap();
    let lc = Trial::new(passage_id);
    trials
        .create_trial(&lc, Some(&TrialSubtype::Lc(LcTrial::new(lc.id))))
        .unwrap();

    assert_missing_parent(&entities, &Mouse::new(pdo.id), "pdx_trial");
    assert_missing_parent(&entities, &Mouse::new(lc.id), "pdx_trial");
    assert_missing_parent(&entities, &Facs::new(Some(pdx.id)), "lc_trial");
    assert_missing_parent(&entities, &Facs::new(Some(pdo.id)), "lc_trial");

    entities.create(&Mouse::new(pdx.id)).unwrap();
    entities.create(&Facs::new(Some(lc.id))).unwrap();
    assert_eq!(row_count(&conn, "mouse"), 1);
    assert_eq!(row_count(&conn, "facs"), 1);
}

#[test]
fn trial_and_subtype_are_written_atomically() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    let mut pdo = PdoTrial::new(trial.id);
    pdo.drop_count = Some(-3);
    let err = trials
        .create_trial(&trial, Some(&TrialSubtype::Pdo(pdo)))
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    assert!(!entities.exists::<Trial>(&trial.id).unwrap());
    assert_eq!(row_count(&conn, "trial"), 0);
}

#[test]
fn create_trial_checks_subtype_key_and_declared_kind() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    let err = trials
        .create_trial(&trial, Some(&TrialSubtype::Pdx(PdxTrial::new(Uuid::new_v4()))))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::ConstraintViolation(Constraint::SubtypeKeyMismatch { .. })
    ));

    let mut declared = Trial::new(passage_id);
    declared.kind = Some(TrialKind::Lc);
    let err = trials
        .create_trial(
            &declared,
            Some(&TrialSubtype::Pdx(PdxTrial::new(declared.id))),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::ConstraintViolation(Constraint::SubtypeConflict { .. })
    ));
    assert_eq!(row_count(&conn, "trial"), 0);
}

#[test]
fn unspecialized_trial_can_be_specialized_later() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    trials.create_trial(&trial, None).unwrap();
    let record = trials.resolve_trial(trial.id).unwrap();
    assert_eq!(record.kind(), None);
    assert_eq!(record.subtype, None);

    let mut lc = LcTrial::new(trial.id);
    lc.confluence = Some(0.8);
    trials.specialize_trial(&TrialSubtype::Lc(lc.clone())).unwrap();

    let record = trials.resolve_trial(trial.id).unwrap();
    assert_eq!(record.kind(), Some(TrialKind::Lc));
    assert_eq!(record.as_lc(), Some(&lc));
}

#[test]
fn declared_kind_cannot_change_while_subtype_row_exists() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    trials
        .create_trial(&trial, Some(&TrialSubtype::Pdx(PdxTrial::new(trial.id))))
        .unwrap();

    let err = entities
        .update::<Trial>(&trial.id, &Patch::new().set("kind", "pdo"))
        .unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(trials.trial_kind(trial.id).unwrap(), Some(TrialKind::Pdx));
}

#[test]
fn trials_for_passage_lists_every_trial_with_its_subtype() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let pdx = Trial::new(passage_id);
    trials
        .create_trial(&pdx, Some(&TrialSubtype::Pdx(PdxTrial::new(pdx.id))))
        .unwrap();
    let plain = Trial::new(passage_id);
    trials.create_trial(&plain, None).unwrap();

    let records = trials.trials_for_passage(passage_id).unwrap();
    assert_eq!(records.len(), 2);
    let mut ids: Vec<_> = records.iter().map(|record| record.trial.id).collect();
    let mut expected = vec![pdx.id, plain.id];
    ids.sort();
    expected.sort();
    assert_eq!(ids, expected);
    assert_eq!(
        records.iter().filter(|record| record.as_pdx().is_some()).count(),
        1
    );

    assert!(trials
        .trials_for_passage(Uuid::new_v4())
        .unwrap_err()
        .is_not_found());
}

#[test]
fn cascading_a_trial_removes_its_pdx_subtree() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    trials
        .create_trial(&trial, Some(&TrialSubtype::Pdx(PdxTrial::new(trial.id))))
        .unwrap();
    let implant = Implant::new(trial.id);
    entities.create(&implant).unwrap();
    entities.create(&SizeRecord::new(implant.id)).unwrap();
    entities.create(&Mouse::new(trial.id)).unwrap();

    assert!(entities
        .delete::<Trial>(&trial.id, DeletePolicy::Reject)
        .unwrap_err()
        .is_constraint_violation());

    let report = entities
        .delete::<Trial>(&trial.id, DeletePolicy::Cascade)
        .unwrap();
    assert_eq!(report.deleted, 5);
    for table in ["trial", "pdx_trial", "implant", "size_record", "mouse"] {
        assert_eq!(row_count(&conn, table), 0, "{table}");
    }
    assert!(entities.exists::<Passage>(&passage_id).unwrap());
}

#[test]
fn deleting_a_subtype_keeps_the_declared_kind() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::try_new(&conn).unwrap();
    let trials = SqliteTrialRepository::try_new(&conn).unwrap();
    let passage_id = seed_passage(&entities);

    let trial = Trial::new(passage_id);
    trials
        .create_trial(&trial, Some(&TrialSubtype::Pdo(PdoTrial::new(trial.id))))
        .unwrap();
    entities
        .delete::<PdoTrial>(&trial.id, DeletePolicy::Reject)
        .unwrap();

    let record = trials.resolve_trial(trial.id).unwrap();
    assert_eq!(record.kind(), Some(TrialKind::Pdo));
    assert_eq!(record.subtype, None);
    assert!(entities.create(&PdxTrial::new(trial.id)).is_err());
    entities.create(&PdoTrial::new(trial.id)).unwrap();
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}
