//! Records that only exist under a PDX trial: implants, tumor size
//! measurements and host mice.
//!
//! # Invariants
//! - `pdx_trial_id` references `pdx_trial`, never the base `trial` table, so
//!   an LC or PDO trial id is rejected by the foreign key itself.
//! - A mouse cannot die before it is born.

use super::catalog::{IMPLANT, MOUSE, SIZE_RECORD};
use super::id::generate_id;
use chrono::NaiveDate;
use uuid::Uuid;

entity! {
    table IMPLANT, key id: Uuid;
    /// Tumor fragment implanted for a PDX trial.
    pub struct Implant {
        pub id: Uuid = ShortString(36),
        pub implant_location: Option<String> = ShortString(100),
        #[serde(rename = "type")]
        pub implant_type: Option<String> = ShortString(100) @ "type",
        /// Size in mm3 at which the implant must be harvested.
        pub size_limit: Option<f64> = Float [NonNegative],
        pub pdx_trial_id: Uuid = ShortString(36),
    }
}

impl Implant {
    pub fn new(pdx_trial_id: Uuid) -> Self {
        Self::with_id(generate_id(), pdx_trial_id)
    }

    pub fn with_id(id: Uuid, pdx_trial_id: Uuid) -> Self {
        Self {
            id,
            pdx_trial_id,
            ..Self::default()
        }
    }
}

entity! {
    table SIZE_RECORD, key id: Uuid;
    /// Weekly implant size measurement.
    pub struct SizeRecord {
        pub id: Uuid = ShortString(36),
        pub week_number: Option<i32> = Integer [NonNegative],
        pub initial_size_mm3: Option<f64> = Float [NonNegative],
        pub final_size_mm3: Option<f64> = Float [NonNegative],
        pub implant_id: Uuid = ShortString(36),
    }
}

impl SizeRecord {
    pub fn new(implant_id: Uuid) -> Self {
        Self::with_id(generate_id(), implant_id)
    }

    pub fn with_id(id: Uuid, implant_id: Uuid) -> Self {
        Self {
            id,
            implant_id,
            ..Self::default()
        }
    }
}

entity! {
    table MOUSE, key id: Uuid;
    /// Host animal of a PDX trial.
    pub struct Mouse {
        pub id: Uuid = ShortString(36),
        pub birth_date: Option<NaiveDate> = Date,
        pub death_cause: Option<String> = ShortString(255),
        pub animal_facility: Option<String> = ShortString(100),
        pub proex: Option<String> = ShortString(100),
        pub strain: Option<String> = ShortString(100),
        pub sex: Option<String> = ShortString(20),
        pub death_date: Option<NaiveDate> = Date,
        pub pdx_trial_id: Uuid = ShortString(36),
    }
}

impl Mouse {
    pub fn new(pdx_trial_id: Uuid) -> Self {
        Self::with_id(generate_id(), pdx_trial_id)
    }

    pub fn with_id(id: Uuid, pdx_trial_id: Uuid) -> Self {
        Self {
            id,
            pdx_trial_id,
            ..Self::default()
        }
    }
}
