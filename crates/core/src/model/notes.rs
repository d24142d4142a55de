use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteType {
    #[serde(rename = "Office Visit")]
    OfficeVisit,
    #[serde(rename = "ED Note")]
    EdNote,
    #[serde(rename = "Consultation Note")]
    Consultation,
    #[serde(rename = "HPI")]
    Hpi,
    #[serde(rename = "Physical Exam")]
    PhysicalExam,
    #[serde(rename = "Assessment & Plan")]
    AssessmentPlan,
    #[serde(rename = "Nursing Note")]
    Nursing,
    #[serde(rename = "Discharge Summary")]
    DischargeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub note_type: NoteType,
    pub encounter_id: String,
    pub timestamp: NaiveDateTime,
    pub author: String,
    pub note_text: String,
}
