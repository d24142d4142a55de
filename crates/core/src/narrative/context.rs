//! Typed inputs handed to a [`super::NarrativeBackend`].
//!
//! Each context derives `Serialize` so a backend can render it into a prompt template or log
//! it verbatim.

use crate::model::Sex;
use serde::Serialize;

/// Input for structured clinical-data generation. Always carries the true diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioContext {
    pub diagnosis: String,
    pub age: u32,
    pub sex: Sex,
    pub history_summary: String,
    pub protocol_indication: String,
}

/// Input for the presenting-encounter notes (HPI, exam, assessment and plan, nursing).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterNarrativeContext {
    pub age: u32,
    pub sex: Sex,
    /// Working diagnosis shown to providers; masked when diagnosis masking is on.
    pub diagnosis: String,
    pub chief_complaint: String,
    pub protocol_indication: String,
    pub medical_history: String,
    pub medications: String,
    pub temperature: f64,
    pub heart_rate: u32,
    pub bp: String,
    pub respiratory_rate: u32,
    pub spo2: f64,
    pub pain: u32,
    pub labs_summary: String,
    pub physical_exam_findings: String,
    pub imaging_ordered: String,
    pub modality: String,
    pub body_region: String,
    pub contrast: String,
    pub indication: String,
    pub time_description: String,
    pub prior_visit_summary: String,
    pub has_prior_visits: bool,
}

/// Input for a historical office-visit or consultation note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitNoteContext {
    pub age: u32,
    pub sex: Sex,
    pub reason: String,
    pub medical_history: String,
    pub medications: String,
    pub bp: String,
    pub heart_rate: u32,
    pub labs_summary: String,
    /// Template text describing what happened at the visit.
    pub assessment: String,
    /// Set for consultation notes.
    pub referring_provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadiologyContext {
    pub modality: String,
    pub body_region: String,
    pub contrast: String,
    pub age: u32,
    pub sex: Sex,
    pub indication: String,
    pub diagnosis: String,
    /// Canned findings a prior-study report should agree with.
    pub expected_findings: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DischargeContext {
    pub age: u32,
    pub sex: Sex,
    pub diagnosis: String,
    pub medical_history: String,
    pub clinical_summary: String,
    pub discharge_meds: String,
    pub follow_up: String,
}
