//! Biomodels derived from tumors and their passages.

use super::catalog::{BIOMODEL, PASSAGE};
use super::id::generate_id;
use chrono::NaiveDate;
use uuid::Uuid;

entity! {
    table BIOMODEL, key id: Uuid;
    /// Biological model (PDX, PDO, LC, ...) grown from a tumor.
    pub struct Biomodel {
        pub id: Uuid = ShortString(36),
        #[serde(rename = "type")]
        pub model_type: Option<String> = ShortString(100) @ "type",
        pub preclinical_trials: Option<String> = LongText,
        pub description: Option<String> = LongText,
        pub creation_date: Option<NaiveDate> = Date,
        pub status: Option<String> = ShortString(50),
        pub progresses: Option<bool> = Boolean,
        /// Fraction of viable cells in `[0, 1]`.
        pub viability: Option<f64> = Float [Fraction],
        pub tumor_biobank_code: String = ShortString(100),
    }
}

impl Biomodel {
    pub fn new(tumor_biobank_code: impl Into<String>) -> Self {
        Self::with_id(generate_id(), tumor_biobank_code)
    }

    pub fn with_id(id: Uuid, tumor_biobank_code: impl Into<String>) -> Self {
        Self {
            id,
            tumor_biobank_code: tumor_biobank_code.into(),
            ..Self::default()
        }
    }
}

entity! {
    table PASSAGE, key id: Uuid;
    /// One generational transfer of a biomodel culture.
    pub struct Passage {
        pub id: Uuid = ShortString(36),
        pub number: Option<i32> = Integer [NonNegative],
        pub status: Option<String> = ShortString(50),
        pub s_index: Option<f64> = Float,
        pub viability: Option<f64> = Float [Fraction],
        pub description: Option<String> = LongText,
        pub biomodel_id: Uuid = ShortString(36),
    }
}

impl Passage {
    pub fn new(biomodel_id: Uuid) -> Self {
        Self::with_id(generate_id(), biomodel_id)
    }

    pub fn with_id(id: Uuid, biomodel_id: Uuid) -> Self {
        Self {
            id,
            biomodel_id,
            ..Self::default()
        }
    }
}
