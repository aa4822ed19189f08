use biobank_core::db::open_db_in_memory;
use biobank_core::model::biomodel::{Biomodel, Passage};
use biobank_core::model::lc::Facs;
use biobank_core::model::patient::{LiquidBiopsy, Patient, Tumor};
use biobank_core::model::trial::Trial;
use biobank_core::model::trial_records::{GenomicSequencing, UsageRecord};
use biobank_core::{
    Constraint, DeletePolicy, EntityRepository, FieldValue, ListQuery, Patch, RepoError,
    SqliteEntityRepository, ValidationError,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn seed_patient_and_tumor(repo: &SqliteEntityRepository<'_>) {
    let mut patient = Patient::new("P001");
    patient.sex = Some("F".to_string());
    patient.birth_date = Some(date("1970-03-14"));
    repo.create(&patient).unwrap();
    repo.create(&Tumor::new("T001", "P001")).unwrap();
}

#[test]
fn create_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    seed_patient_and_tumor(&repo);

    let loaded: Patient = repo.get(&"P001".to_string()).unwrap();
    assert_eq!(loaded.nhc, "P001");
    assert_eq!(loaded.sex.as_deref(), Some("F"));
    assert_eq!(loaded.birth_date, Some(date("1970-03-14")));

    let tumor: Tumor = repo.get(&"T001".to_string()).unwrap();
    assert_eq!(tumor.patient_nhc, "P001");
    assert_eq!(tumor.organ, None);
}

#[test]
fn sqlite_stores_booleans_as_integers_and_dates_as_iso_text() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    seed_patient_and_tumor(&repo);

    let mut biopsy = LiquidBiopsy::new();
    biopsy.has_serum = Some(true);
    biopsy.has_plasma = Some(false);
    biopsy.biopsy_date = Some(date("2024-02-29"));
    repo.create(&biopsy).unwrap();

    let (serum, plasma, biopsy_date): (i64, i64, String) = conn
        .query_row(
            "SELECT has_serum, has_plasma, biopsy_date FROM liquid_biopsy WHERE id = ?1;",
            [biopsy.id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!((serum, plasma), (1, 0));
    assert_eq!(biopsy_date, "2024-02-29");

    let loaded: LiquidBiopsy = repo.get(&biopsy.id).unwrap();
    assert_eq!(loaded, biopsy);
}

#[test]
fn duplicate_natural_key_is_a_unique_key_violation() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    repo.create(&Patient::new("P001")).unwrap();

    let err = repo.create(&Patient::new("P001")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::UniqueKeyViolation { table: "patient", ref key } if key == "P001"
    ));
}

#[test]
fn tumor_for_unknown_patient_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let err = repo.create(&Tumor::new("T404", "P404")).unwrap_err();
    match err {
        RepoError::ConstraintViolation(Constraint::MissingParent {
            table,
            column,
            parent_table,
            key,
        }) => {
            assert_eq!(table, "tumor");
            assert_eq!(column, "patient_nhc");
            assert_eq!(parent_table, "patient");
            assert_eq!(key, "P404");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!repo.exists::<Tumor>(&"T404".to_string()).unwrap());
}

#[test]
fn storage_rejects_orphans_written_behind_the_repository() {
    let conn = open_db_in_memory().unwrap();
    let err = conn
        .execute(
            "INSERT INTO tumor (biobank_code, patient_nhc) VALUES ('T1', 'nobody');",
            [],
        )
        .unwrap_err();
    assert_eq!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    );
}

#[test]
fn invalid_records_are_rejected_before_any_write() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    seed_patient_and_tumor(&repo);

    let mut biomodel = Biomodel::new("T001");
    biomodel.viability = Some(1.5);
    assert!(matches!(
        repo.create(&biomodel).unwrap_err(),
        RepoError::Validation(ValidationError::OutOfRange {
            column: "viability",
            ..
        })
    ));

    let mut patient = Patient::new("P002");
    patient.sex = Some("x".repeat(21));
    assert!(matches!(
        repo.create(&patient).unwrap_err(),
        RepoError::Validation(ValidationError::TooLong {
            column: "sex",
            max: 20,
            actual: 21,
            ..
        })
    ));

    assert!(matches!(
        repo.create(&Patient::new("  ")).unwrap_err(),
        RepoError::Validation(ValidationError::InvalidNaturalKey { .. })
    ));
    assert_eq!(row_count(&conn, "patient"), 1);
    assert_eq!(row_count(&conn, "biomodel"), 0);
}

#[test]
fn get_missing_is_not_found_and_find_is_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let err = repo.get::<Patient>(&"ghost".to_string()).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(repo.find::<Patient>(&"ghost".to_string()).unwrap(), None);
}

#[test]
fn list_filters_orders_by_key_and_paginates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    for (nhc, sex) in [("P003", "M"), ("P001", "F"), ("P002", "F"), ("P004", "F")] {
        let mut patient = Patient::new(nhc);
        patient.sex = Some(sex.to_string());
        repo.create(&patient).unwrap();
    }
    repo.create(&Patient::new("P000")).unwrap();

    let women: Vec<Patient> = repo
        .list(&ListQuery::new().where_eq("sex", "F"))
        .unwrap();
    let keys: Vec<_> = women.iter().map(|patient| patient.nhc.as_str()).collect();
    assert_eq!(keys, ["P001", "P002", "P004"]);

    let page: Vec<Patient> = repo
        .list(&ListQuery::new().where_eq("sex", "F").limit(1).offset(1))
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].nhc, "P002");

    let unknown: Vec<Patient> = repo
        .list(&ListQuery::new().where_eq("sex", FieldValue::Null))
        .unwrap();
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].nhc, "P000");

    let err = repo
        .list::<Patient>(&ListQuery::new().where_eq("gender", "F"))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::UnknownColumn { table: "patient", .. })
    ));
}

#[test]
fn update_merges_patch_and_writes_only_changed_columns() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    seed_patient_and_tumor(&repo);

    let updated: Tumor = repo
        .update(
            &"T001".to_string(),
            &Patch::new()
                .set("organ", "colon")
                .set("registration_date", date("2023-06-01")),
        )
        .unwrap();
    assert_eq!(updated.organ.as_deref(), Some("colon"));
    assert_eq!(updated.registration_date, Some(date("2023-06-01")));
    assert_eq!(updated.patient_nhc, "P001");

    let cleared: Tumor = repo
        .update(&"T001".to_string(), &Patch::new().clear("organ"))
        .unwrap();
    assert_eq!(cleared.organ, None);
    assert_eq!(cleared.registration_date, Some(date("2023-06-01")));

    let stored: Tumor = repo.get(&"T001".to_string()).unwrap();
    assert_eq!(stored, cleared);
}

#[test]
fn update_rejects_key_changes_unknown_columns_and_bad_values() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    seed_patient_and_tumor(&repo);
    let key = "T001".to_string();

    assert!(matches!(
        repo.update::<Tumor>(&key, &Patch::new().set("biobank_code", "T002"))
            .unwrap_err(),
        RepoError::Validation(ValidationError::ImmutableColumn { .. })
    ));
    assert!(matches!(
        repo.update::<Tumor>(&key, &Patch::new().set("colour", "red"))
            .unwrap_err(),
        RepoError::Validation(ValidationError::UnknownColumn { .. })
    ));
    assert!(matches!(
        repo.update::<Tumor>(&key, &Patch::new().set("organ", 7_i32))
            .unwrap_err(),
        RepoError::Validation(ValidationError::TypeMismatch { .. })
    ));
    assert!(matches!(
        repo.update::<Tumor>(&key, &Patch::new().clear("patient_nhc"))
            .unwrap_err(),
        RepoError::Validation(ValidationError::Required { .. })
    ));
    assert!(matches!(
        repo.update::<Tumor>(&key, &Patch::new().set("patient_nhc", "P999"))
            .unwrap_err(),
        RepoError::ConstraintViolation(Constraint::MissingParent { .. })
    ));
    assert!(repo
        .update::<Tumor>(&"T404".to_string(), &Patch::new().set("organ", "lung"))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn update_rejects_integers_wider_than_the_column_and_keeps_the_row_readable() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    seed_patient_and_tumor(&repo);
    let biomodel = Biomodel::new("T001");
    repo.create(&biomodel).unwrap();
    let mut passage = Passage::new(biomodel.id);
    passage.number = Some(3);
    repo.create(&passage).unwrap();

    let err = repo
        .update::<Passage>(&passage.id, &Patch::new().set("number", 5_000_000_000_i64))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::OutOfRange { column: "number", .. })
    ));

    let stored: i64 = conn
        .query_row(
            "SELECT number FROM passage WHERE id = ?1;",
            [passage.id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, 3);
    let loaded: Passage = repo.get(&passage.id).unwrap();
    assert_eq!(loaded.number, Some(3));
}

#[test]
fn patient_delete_is_blocked_until_tumor_is_removed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    seed_patient_and_tumor(&repo);
    let nhc = "P001".to_string();

    let err = repo.delete::<Patient>(&nhc, DeletePolicy::Reject).unwrap_err();
    match err {
        RepoError::ConstraintViolation(Constraint::HasDependents {
            table,
            dependent_table,
            count,
            ..
        }) => {
            assert_eq!(table, "patient");
            assert_eq!(dependent_table, "tumor");
            assert_eq!(count, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(repo.exists::<Patient>(&nhc).unwrap());

    repo.delete::<Tumor>(&"T001".to_string(), DeletePolicy::default())
        .unwrap();
    let report = repo.delete::<Patient>(&nhc, DeletePolicy::Reject).unwrap();
    assert_eq!(report.deleted, 1);
    assert!(!repo.exists::<Patient>(&nhc).unwrap());
}

#[test]
fn deleting_missing_record_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    assert!(repo
        .delete::<Patient>(&"ghost".to_string(), DeletePolicy::Cascade)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn cascade_removes_descendants_and_detaches_optional_children() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    seed_patient_and_tumor(&repo);

    let biomodel = Biomodel::new("T001");
    repo.create(&biomodel).unwrap();
    let passage = Passage::new(biomodel.id);
    repo.create(&passage).unwrap();
    let trial = Trial::new(passage.id);
    repo.create(&trial).unwrap();
    repo.create(&UsageRecord::new(trial.id)).unwrap();
    let sequencing = GenomicSequencing::new(Some(trial.id));
    repo.create(&sequencing).unwrap();

    let mut biopsy = LiquidBiopsy::new();
    biopsy.tumor_biobank_code = Some("T001".to_string());
    repo.create(&biopsy).unwrap();

    let report = repo
        .delete::<Patient>(&"P001".to_string(), DeletePolicy::Cascade)
        .unwrap();
    assert_eq!(report.deleted, 6);
    assert_eq!(report.detached, 2);

    for table in ["patient", "tumor", "biomodel", "passage", "trial", "usage_record"] {
        assert_eq!(row_count(&conn, table), 0, "{table}");
    }
    let detached: GenomicSequencing = repo.get(&sequencing.id).unwrap();
    assert_eq!(detached.trial_id, None);
    let orphan: LiquidBiopsy = repo.get(&biopsy.id).unwrap();
    assert_eq!(orphan.tumor_biobank_code, None);
}

#[test]
fn optional_parent_link_may_be_absent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let facs = Facs::new(None);
    let id: Uuid = repo.create(&facs).unwrap();
    assert_eq!(repo.get::<Facs>(&id).unwrap().lc_trial_id, None);

    let err = repo.create(&Facs::new(Some(Uuid::new_v4()))).unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn corrupted_boolean_fails_to_decode() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let biopsy = LiquidBiopsy::new();
    repo.create(&biopsy).unwrap();
    conn.execute(
        "UPDATE liquid_biopsy SET has_buffy = 2 WHERE id = ?1;",
        [biopsy.id.to_string()],
    )
    .unwrap();

    match repo.get::<LiquidBiopsy>(&biopsy.id).unwrap_err() {
        RepoError::Decode(err) => {
            assert_eq!(err.table, "liquid_biopsy");
            assert_eq!(err.column, "has_buffy");
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}
