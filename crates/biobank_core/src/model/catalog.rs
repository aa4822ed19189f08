//! Static table definitions for every entity.
//!
//! # Invariants
//! - `tables()` lists parents before children.
//! - Each `TableDef.columns` is the owning struct's `COLUMNS`.
//! - Subtype tables reference `trial(id, kind)` so one trial can carry at
//!   most one specialization, enforced by storage on every engine.

use super::biomodel::{Biomodel, Passage};
use super::lc::Facs;
use super::patient::{LiquidBiopsy, Patient, Tumor};
use super::pdx::{Implant, Mouse, SizeRecord};
use super::trial::{LcTrial, PdoTrial, PdxTrial, Trial};
use super::trial_records::{
    Cryopreservation, GenomicSequencing, Image, MolecularData, UsageRecord,
};
use crate::schema::{Discriminator, ForeignKeyDef, KeyKind, RowCheck, TableDef};

const fn required(
    column: &'static [&'static str],
    parent: &'static str,
    key: &'static [&'static str],
) -> ForeignKeyDef {
    ForeignKeyDef {
        columns: column,
        parent_table: parent,
        parent_columns: key,
        required: true,
    }
}

const fn optional(
    column: &'static [&'static str],
    parent: &'static str,
    key: &'static [&'static str],
) -> ForeignKeyDef {
    ForeignKeyDef {
        columns: column,
        parent_table: parent,
        parent_columns: key,
        required: false,
    }
}

const fn generated(
    name: &'static str,
    entity: &'static str,
    columns: &'static [crate::schema::ColumnDef],
    foreign_keys: &'static [ForeignKeyDef],
) -> TableDef {
    TableDef {
        name,
        entity,
        key: "id",
        key_kind: KeyKind::Generated,
        columns,
        foreign_keys,
        unique: &[],
        discriminator: None,
        checks: &[],
    }
}

/// Subtype rows point at `trial(id, kind)`, not just `trial(id)`.
const SUBTYPE_PARENT: &[ForeignKeyDef] = &[required(&["id", "kind"], "trial", &["id", "kind"])];

const fn subtype(
    name: &'static str,
    entity: &'static str,
    kind: &'static str,
    columns: &'static [crate::schema::ColumnDef],
) -> TableDef {
    TableDef {
        name,
        entity,
        key: "id",
        key_kind: KeyKind::Shared,
        columns,
        foreign_keys: SUBTYPE_PARENT,
        unique: &[],
        discriminator: Some(Discriminator {
            column: "kind",
            value: kind,
        }),
        checks: &[],
    }
}

pub static PATIENT: TableDef = TableDef {
    name: "patient",
    entity: "Patient",
    key: "nhc",
    key_kind: KeyKind::Natural,
    columns: Patient::COLUMNS,
    foreign_keys: &[],
    unique: &[],
    discriminator: None,
    checks: &[],
};

pub static TUMOR: TableDef = TableDef {
    name: "tumor",
    entity: "Tumor",
    key: "biobank_code",
    key_kind: KeyKind::Natural,
    columns: Tumor::COLUMNS,
    foreign_keys: &[required(&["patient_nhc"], "patient", &["nhc"])],
    unique: &[],
    discriminator: None,
    checks: &[],
};

pub static LIQUID_BIOPSY: TableDef = generated(
    "liquid_biopsy",
    "LiquidBiopsy",
    LiquidBiopsy::COLUMNS,
    &[optional(&["tumor_biobank_code"], "tumor", &["biobank_code"])],
);

pub static BIOMODEL: TableDef = generated(
    "biomodel",
    "Biomodel",
    Biomodel::COLUMNS,
    &[required(&["tumor_biobank_code"], "tumor", &["biobank_code"])],
);

pub static PASSAGE: TableDef = generated(
    "passage",
    "Passage",
    Passage::COLUMNS,
    &[required(&["biomodel_id"], "biomodel", &["id"])],
);

pub static TRIAL: TableDef = TableDef {
    name: "trial",
    entity: "Trial",
    key: "id",
    key_kind: KeyKind::Generated,
    columns: Trial::COLUMNS,
    foreign_keys: &[required(&["passage_id"], "passage", &["id"])],
    unique: &[&["id", "kind"]],
    discriminator: None,
    checks: &[],
};

pub static PDX_TRIAL: TableDef = subtype("pdx_trial", "PDXTrial", "pdx", PdxTrial::COLUMNS);

pub static PDO_TRIAL: TableDef = subtype("pdo_trial", "PDOTrial", "pdo", PdoTrial::COLUMNS);

pub static LC_TRIAL: TableDef = subtype("lc_trial", "LCTrial", "lc", LcTrial::COLUMNS);

pub static IMPLANT: TableDef = generated(
    "implant",
    "Implant",
    Implant::COLUMNS,
    &[required(&["pdx_trial_id"], "pdx_trial", &["id"])],
);

pub static SIZE_RECORD: TableDef = generated(
    "size_record",
    "SizeRecord",
    SizeRecord::COLUMNS,
    &[required(&["implant_id"], "implant", &["id"])],
);

pub static MOUSE: TableDef = TableDef {
    checks: &[RowCheck::NotBefore {
        earlier: "birth_date",
        later: "death_date",
    }],
    ..generated(
        "mouse",
        "Mouse",
        Mouse::COLUMNS,
        &[required(&["pdx_trial_id"], "pdx_trial", &["id"])],
    )
};

pub static FACS: TableDef = generated(
    "facs",
    "FACS",
    Facs::COLUMNS,
    &[optional(&["lc_trial_id"], "lc_trial", &["id"])],
);

pub static USAGE_RECORD: TableDef = generated(
    "usage_record",
    "UsageRecord",
    UsageRecord::COLUMNS,
    &[required(&["trial_id"], "trial", &["id"])],
);

pub static IMAGE: TableDef = generated(
    "image",
    "Image",
    Image::COLUMNS,
    &[required(&["trial_id"], "trial", &["id"])],
);

pub static CRYOPRESERVATION: TableDef = generated(
    "cryopreservation",
    "Cryopreservation",
    Cryopreservation::COLUMNS,
    &[required(&["trial_id"], "trial", &["id"])],
);

pub static GENOMIC_SEQUENCING: TableDef = generated(
    "genomic_sequencing",
    "GenomicSequencing",
    GenomicSequencing::COLUMNS,
    &[optional(&["trial_id"], "trial", &["id"])],
);

pub static MOLECULAR_DATA: TableDef = generated(
    "molecular_data",
    "MolecularData",
    MolecularData::COLUMNS,
    &[optional(&["trial_id"], "trial", &["id"])],
);

static TABLES: [&TableDef; 18] = [
    &PATIENT,
    &TUMOR,
    &LIQUID_BIOPSY,
    &BIOMODEL,
    &PASSAGE,
    &TRIAL,
    &PDX_TRIAL,
    &PDO_TRIAL,
    &LC_TRIAL,
    &IMPLANT,
    &SIZE_RECORD,
    &MOUSE,
    &FACS,
    &USAGE_RECORD,
    &IMAGE,
    &CRYOPRESERVATION,
    &GENOMIC_SEQUENCING,
    &MOLECULAR_DATA,
];

/// Every table, parents before children.
pub fn tables() -> &'static [&'static TableDef] {
    &TABLES
}

/// Looks up a table by its physical name.
pub fn table(name: &str) -> Option<&'static TableDef> {
    TABLES.iter().copied().find(|table| table.name == name)
}
