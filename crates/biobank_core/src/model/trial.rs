//! Trials and their table-per-subtype specializations.
//!
//! # Responsibility
//! - Define the base `Trial` record and the PDX/PDO/LC subtype records.
//! - Model the full trial as a tagged union (`TrialRecord`).
//!
//! # Invariants
//! - A subtype row reuses its trial's `id` as primary key.
//! - `Trial.kind` is the discriminator; at most one subtype row exists per
//!   trial and its kind matches `Trial.kind`.
//! - `kind` may be set before the subtype row exists (declared, not yet
//!   detailed) but never changes while a subtype row references it.

use super::catalog::{LC_TRIAL, PDO_TRIAL, PDX_TRIAL, TRIAL};
use super::id::generate_id;
use super::{Entity, FieldType};
use crate::schema::engine::DecodeReason;
use crate::schema::FieldValue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Which specialization a trial has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialKind {
    /// Patient-derived xenograft.
    Pdx,
    /// Patient-derived organoid.
    Pdo,
    /// Living-cell line culture.
    Lc,
}

impl TrialKind {
    pub const ALL: [TrialKind; 3] = [Self::Pdx, Self::Pdo, Self::Lc];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdx => "pdx",
            Self::Pdo => "pdo",
            Self::Lc => "lc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pdx" => Some(Self::Pdx),
            "pdo" => Some(Self::Pdo),
            "lc" => Some(Self::Lc),
            _ => None,
        }
    }

    /// Subtype table holding this kind's specialized fields.
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Pdx => PDX_TRIAL.name,
            Self::Pdo => PDO_TRIAL.name,
            Self::Lc => LC_TRIAL.name,
        }
    }
}

impl Display for TrialKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FieldType for TrialKind {
    const CHOICES: &'static [&'static str] = &["pdx", "pdo", "lc"];

    fn to_field(&self) -> FieldValue {
        FieldValue::Text(self.as_str().to_string())
    }

    fn from_field(value: FieldValue) -> Result<Self, DecodeReason> {
        match value {
            FieldValue::Text(text) => {
                Self::parse(&text).ok_or(DecodeReason::UnknownChoice(text))
            }
            FieldValue::Null => Err(DecodeReason::UnexpectedNull),
            _ => Err(DecodeReason::LogicalMismatch { found: "non-text" }),
        }
    }
}

impl From<TrialKind> for FieldValue {
    fn from(value: TrialKind) -> Self {
        value.to_field()
    }
}

entity! {
    table TRIAL, key id: Uuid;
    /// Base trial row shared by every specialization.
    pub struct Trial {
        pub id: Uuid = ShortString(36),
        pub success: Option<bool> = Boolean,
        pub description: Option<String> = LongText,
        pub creation_date: Option<NaiveDate> = Date,
        pub biobank_shipment: Option<bool> = Boolean,
        pub biobank_arrival_date: Option<NaiveDate> = Date,
        pub passage_id: Uuid = ShortString(36),
        /// Discriminator; `None` until the trial is specialized.
        pub kind: Option<TrialKind> = ShortString(8),
    }
}

impl Trial {
    pub fn new(passage_id: Uuid) -> Self {
        Self::with_id(generate_id(), passage_id)
    }

    pub fn with_id(id: Uuid, passage_id: Uuid) -> Self {
        Self {
            id,
            passage_id,
            ..Self::default()
        }
    }
}

entity! {
    table PDX_TRIAL, key id: Uuid;
    /// Patient-derived xenograft specialization.
    pub struct PdxTrial {
        pub id: Uuid = ShortString(36),
        /// Formalin-fixed paraffin-embedded material available.
        pub ffpe: Option<bool> = Boolean,
        /// H&E slide available.
        pub he_slide: Option<bool> = Boolean,
        /// Immunohistochemistry data.
        pub ihq_data: Option<String> = LongText,
        pub latency_weeks: Option<i32> = Integer [NonNegative],
        pub s_index: Option<f64> = Float,
        pub scanner_magnification: Option<String> = ShortString(100),
    }
}

entity! {
    table PDO_TRIAL, key id: Uuid;
    /// Patient-derived organoid specialization.
    pub struct PdoTrial {
        pub id: Uuid = ShortString(36),
        pub drop_count: Option<i32> = Integer [NonNegative],
        pub frozen_organoid_count: Option<i32> = Integer [NonNegative],
        pub organoid_count: Option<i32> = Integer [NonNegative],
        pub plate_type: Option<String> = ShortString(100),
        pub visualization_day: Option<i32> = Integer [NonNegative],
        pub assessment: Option<String> = ShortString(100),
    }
}

entity! {
    table LC_TRIAL, key id: Uuid;
    /// Cell line culture specialization.
    pub struct LcTrial {
        pub id: Uuid = ShortString(36),
        /// Covered fraction of the culture surface in `[0, 1]`.
        pub confluence: Option<f64> = Float [Fraction],
        pub spheroids: Option<bool> = Boolean,
        pub digestion_date: Option<NaiveDate> = Date,
        pub cell_line: Option<String> = ShortString(100),
        pub plate_type: Option<String> = ShortString(100),
    }
}

impl PdxTrial {
    pub fn new(trial_id: Uuid) -> Self {
        Self {
            id: trial_id,
            ..Self::default()
        }
    }
}

impl PdoTrial {
    pub fn new(trial_id: Uuid) -> Self {
        Self {
            id: trial_id,
            ..Self::default()
        }
    }
}

impl LcTrial {
    pub fn new(trial_id: Uuid) -> Self {
        Self {
            id: trial_id,
            ..Self::default()
        }
    }
}

/// Specialized payload of a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrialSubtype {
    Pdx(PdxTrial),
    Pdo(PdoTrial),
    Lc(LcTrial),
}

impl TrialSubtype {
    pub fn kind(&self) -> TrialKind {
        match self {
            Self::Pdx(_) => TrialKind::Pdx,
            Self::Pdo(_) => TrialKind::Pdo,
            Self::Lc(_) => TrialKind::Lc,
        }
    }

    /// Shared trial id carried by the subtype row.
    pub fn trial_id(&self) -> Uuid {
        match self {
            Self::Pdx(row) => row.key(),
            Self::Pdo(row) => row.key(),
            Self::Lc(row) => row.key(),
        }
    }
}

/// Full trial: base row plus its specialization, if recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: Trial,
    pub subtype: Option<TrialSubtype>,
}

impl TrialRecord {
    pub fn kind(&self) -> Option<TrialKind> {
        self.trial.kind
    }

    pub fn as_pdx(&self) -> Option<&PdxTrial> {
        match &self.subtype {
            Some(TrialSubtype::Pdx(row)) => Some(row),
            _ => None,
        }
    }

    pub fn as_pdo(&self) -> Option<&PdoTrial> {
        match &self.subtype {
            Some(TrialSubtype::Pdo(row)) => Some(row),
            _ => None,
        }
    }

    pub fn as_lc(&self) -> Option<&LcTrial> {
        match &self.subtype {
            Some(TrialSubtype::Lc(row)) => Some(row),
            _ => None,
        }
    }
}
