use chrono::NaiveDateTime;
use longchart_types::NonEmptyText;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemStatus {
    Active,
    Resolved,
    Chronic,
}

/// One condition on the running problem list. At most one entry per condition name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemListEntry {
    pub condition: NonEmptyText,
    pub icd10: Option<String>,
    pub date_added: NaiveDateTime,
    pub date_resolved: Option<NaiveDateTime>,
    pub status: ProblemStatus,
    pub added_encounter_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allergy {
    pub allergen: String,
    #[serde(default)]
    pub allergy_type: String,
    #[serde(default)]
    pub reaction: String,
    #[serde(default)]
    pub severity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurgicalProcedure {
    pub procedure: String,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialHistory {
    pub smoking_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoking_details: Option<String>,
    pub alcohol_use: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alcohol_details: Option<String>,
    pub drug_use: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drug_details: Option<String>,
    pub occupation: Option<String>,
    pub living_situation: Option<String>,
}

impl Default for SocialHistory {
    fn default() -> Self {
        Self {
            smoking_status: "Never".into(),
            smoking_details: None,
            alcohol_use: "Social".into(),
            alcohol_details: None,
            drug_use: "None".into(),
            drug_details: None,
            occupation: None,
            living_situation: None,
        }
    }
}
