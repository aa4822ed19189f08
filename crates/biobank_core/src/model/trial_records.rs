//! Records attached to any trial regardless of its specialization.

use super::catalog::{CRYOPRESERVATION, GENOMIC_SEQUENCING, IMAGE, MOLECULAR_DATA, USAGE_RECORD};
use super::id::generate_id;
use chrono::NaiveDate;
use uuid::Uuid;

entity! {
    table USAGE_RECORD, key id: Uuid;
    /// Log entry describing how trial material was used.
    pub struct UsageRecord {
        pub id: Uuid = ShortString(36),
        pub usage_type: Option<String> = ShortString(100),
        pub description: Option<String> = LongText,
        pub date: Option<NaiveDate> = Date,
        pub trial_id: Uuid = ShortString(36),
    }
}

entity! {
    table IMAGE, key id: Uuid;
    pub struct Image {
        pub id: Uuid = ShortString(36),
        pub date: Option<NaiveDate> = Date,
        #[serde(rename = "type")]
        pub image_type: Option<String> = ShortString(100) @ "type",
        /// Anatomical pathology review.
        pub ap_review: Option<String> = LongText,
        pub trial_id: Uuid = ShortString(36),
    }
}

entity! {
    table CRYOPRESERVATION, key id: Uuid;
    /// Frozen vials stored from a trial.
    pub struct Cryopreservation {
        pub id: Uuid = ShortString(36),
        pub location: Option<String> = ShortString(100),
        pub date: Option<NaiveDate> = Date,
        pub vial_count: Option<i32> = Integer [NonNegative],
        pub trial_id: Uuid = ShortString(36),
    }
}

entity! {
    table GENOMIC_SEQUENCING, key id: Uuid;
    pub struct GenomicSequencing {
        pub id: Uuid = ShortString(36),
        pub trial_id: Option<Uuid> = ShortString(36),
    }
}

entity! {
    table MOLECULAR_DATA, key id: Uuid;
    pub struct MolecularData {
        pub id: Uuid = ShortString(36),
        pub trial_id: Option<Uuid> = ShortString(36),
    }
}

impl UsageRecord {
    pub fn new(trial_id: Uuid) -> Self {
        Self {
            id: generate_id(),
            trial_id,
            ..Self::default()
        }
    }
}

impl Image {
    pub fn new(trial_id: Uuid) -> Self {
        Self {
            id: generate_id(),
            trial_id,
            ..Self::default()
        }
    }
}

impl Cryopreservation {
    pub fn new(trial_id: Uuid) -> Self {
        Self {
            id: generate_id(),
            trial_id,
            ..Self::default()
        }
    }
}

impl GenomicSequencing {
    pub fn new(trial_id: Option<Uuid>) -> Self {
        Self {
            id: generate_id(),
            trial_id,
        }
    }
}

impl MolecularData {
    pub fn new(trial_id: Option<Uuid>) -> Self {
        Self {
            id: generate_id(),
            trial_id,
        }
    }
}
