//! Clinical origin records: patients, tumors and liquid biopsies.
//!
//! # Invariants
//! - `Patient.nhc` and `Tumor.biobank_code` are caller-supplied natural keys.
//! - Every tumor belongs to exactly one patient.
//! - A liquid biopsy may exist before it is linked to a tumor.

use super::catalog::{LIQUID_BIOPSY, PATIENT, TUMOR};
use super::id::generate_id;
use chrono::NaiveDate;
use uuid::Uuid;

entity! {
    table PATIENT, key nhc: String;
    /// Patient identified by the clinical record number (NHC).
    pub struct Patient {
        pub nhc: String = ShortString(50),
        pub sex: Option<String> = ShortString(20),
        pub birth_date: Option<NaiveDate> = Date,
    }
}

impl Patient {
    pub fn new(nhc: impl Into<String>) -> Self {
        Self {
            nhc: nhc.into(),
            ..Self::default()
        }
    }
}

entity! {
    table TUMOR, key biobank_code: String;
    /// Tumor specimen registered in the biobank.
    pub struct Tumor {
        pub biobank_code: String = ShortString(100),
        pub lab_code: Option<String> = ShortString(100),
        pub classification: Option<String> = ShortString(100),
        /// Anatomical pathology observation.
        pub ap_observation: Option<String> = LongText,
        pub grade: Option<String> = ShortString(50),
        pub organ: Option<String> = ShortString(100),
        pub status: Option<String> = ShortString(50),
        /// TNM staging.
        pub tnm: Option<String> = ShortString(50),
        pub patient_nhc: String = ShortString(50),
        pub registration_date: Option<NaiveDate> = Date,
        pub operation_date: Option<NaiveDate> = Date,
    }
}

impl Tumor {
    pub fn new(biobank_code: impl Into<String>, patient_nhc: impl Into<String>) -> Self {
        Self {
            biobank_code: biobank_code.into(),
            patient_nhc: patient_nhc.into(),
            ..Self::default()
        }
    }
}

entity! {
    table LIQUID_BIOPSY, key id: Uuid;
    /// Blood-derived sample; the tumor link is optional.
    pub struct LiquidBiopsy {
        pub id: Uuid = ShortString(36),
        pub has_serum: Option<bool> = Boolean,
        pub has_buffy: Option<bool> = Boolean,
        pub has_plasma: Option<bool> = Boolean,
        pub tumor_biobank_code: Option<String> = ShortString(100),
        pub biopsy_date: Option<NaiveDate> = Date,
    }
}

impl LiquidBiopsy {
    pub fn new() -> Self {
        Self::with_id(generate_id())
    }

    /// Used by import paths where identity already exists externally.
    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}
