use super::{ClinicalNote, ImagingOrder, ImagingReport, LabPanel, VitalSignSet};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Encounter-type key used by progression stages and encounter profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitKind {
    OutpatientPcp,
    OutpatientSpecialist,
    Ed,
    Inpatient,
    Icu,
    UrgentCare,
    OutpatientCardiology,
    OutpatientGi,
    OutpatientPulmonology,
    OutpatientRheumatology,
    OutpatientHematology,
    OutpatientObgyn,
    OutpatientNeurology,
    OutpatientUrology,
}

impl VisitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutpatientPcp => "outpatient_pcp",
            Self::OutpatientSpecialist => "outpatient_specialist",
            Self::Ed => "ed",
            Self::Inpatient => "inpatient",
            Self::Icu => "icu",
            Self::UrgentCare => "urgent_care",
            Self::OutpatientCardiology => "outpatient_cardiology",
            Self::OutpatientGi => "outpatient_gi",
            Self::OutpatientPulmonology => "outpatient_pulmonology",
            Self::OutpatientRheumatology => "outpatient_rheumatology",
            Self::OutpatientHematology => "outpatient_hematology",
            Self::OutpatientObgyn => "outpatient_obgyn",
            Self::OutpatientNeurology => "outpatient_neurology",
            Self::OutpatientUrology => "outpatient_urology",
        }
    }

    pub fn is_outpatient(self) -> bool {
        !matches!(
            self,
            Self::Ed | Self::Inpatient | Self::Icu | Self::UrgentCare
        )
    }

    /// Outpatient visit with anyone other than the primary care physician.
    pub fn is_specialist_outpatient(self) -> bool {
        self.is_outpatient() && self != Self::OutpatientPcp
    }

    /// Inclusive hour-of-day window in which this kind of visit starts.
    pub fn hour_range(self) -> (u32, u32) {
        match self {
            Self::Ed | Self::UrgentCare => (0, 23),
            Self::Inpatient | Self::Icu => (6, 18),
            _ => (8, 16),
        }
    }
}

impl fmt::Display for VisitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Care setting of the presenting encounter, resolved from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClinicalSetting {
    Icu,
    Inpatient,
    UrgentCare,
    Emergency,
    Outpatient,
}

impl ClinicalSetting {
    /// Resolve a free-text setting such as "ED", "SICU" or "Emergency Department".
    ///
    /// Short abbreviations ("ed", "er") only match as whole words so that "Medical Floor" is
    /// not read as an emergency setting.
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has_word = |word: &str| {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| token == word)
        };

        if lower.contains("icu") {
            Self::Icu
        } else if lower.contains("inpatient") {
            Self::Inpatient
        } else if lower.contains("urgent") {
            Self::UrgentCare
        } else if has_word("ed") || has_word("er") || lower.contains("emergency") {
            Self::Emergency
        } else {
            Self::Outpatient
        }
    }

    pub fn visit_kind(self) -> VisitKind {
        match self {
            Self::Icu => VisitKind::Icu,
            Self::Inpatient => VisitKind::Inpatient,
            Self::UrgentCare => VisitKind::UrgentCare,
            Self::Emergency => VisitKind::Ed,
            Self::Outpatient => VisitKind::OutpatientPcp,
        }
    }

    /// Every setting except an outpatient clinic.
    pub fn is_acute(self) -> bool {
        self != Self::Outpatient
    }

    /// ED, ICU or a ward admission; urgent care does not count.
    pub fn is_ed_or_inpatient(self) -> bool {
        matches!(self, Self::Emergency | Self::Icu | Self::Inpatient)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub encounter_id: String,
    /// Display type from the encounter profile ("Outpatient", "ED", "Inpatient", ...).
    pub encounter_type: String,
    pub facility: String,
    pub admission_datetime: NaiveDateTime,
    pub discharge_datetime: Option<NaiveDateTime>,
    pub attending_provider: String,
    pub department: String,
    pub chief_complaint: String,
    pub disposition: Option<String>,
}

/// Everything produced for one timeline event. Built once and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterRecord {
    pub encounter: Encounter,
    pub vital_signs: Vec<VitalSignSet>,
    pub lab_results: Vec<LabPanel>,
    pub imaging_orders: Vec<ImagingOrder>,
    pub imaging_reports: Vec<ImagingReport>,
    pub clinical_notes: Vec<ClinicalNote>,
    pub diagnoses: Vec<String>,
}
