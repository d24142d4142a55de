use chrono::NaiveDateTime;
use longchart_types::NonEmptyText;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: NonEmptyText,
    pub dose: String,
    pub route: String,
    pub frequency: String,
    #[serde(default)]
    pub indication: Option<String>,
    #[serde(default)]
    pub rxnorm_code: Option<String>,
}

impl Medication {
    /// `"Metformin 500mg"`, the form used in note prompts.
    pub fn short_label(&self) -> String {
        if self.dose.is_empty() {
            self.name.to_string()
        } else {
            format!("{} {}", self.name, self.dose)
        }
    }
}

/// Home medications carried across the timeline, plus inpatient-only orders from the
/// presenting encounter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationList {
    pub home_medications: Vec<Medication>,
    pub inpatient_medications: Vec<Medication>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Started,
    Increased,
    Decreased,
    Discontinued,
    Changed,
}

/// Audit record for one medication-list mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationChange {
    /// Snapshot of the medication after the change.
    pub medication: Medication,
    pub change_type: ChangeType,
    pub change_date: NaiveDateTime,
    pub encounter_id: String,
    pub reason: Option<String>,
    pub previous_dose: Option<String>,
}
