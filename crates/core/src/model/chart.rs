use super::{
    Allergy, ClinicalVignette, EncounterRecord, MedicationChange, MedicationList,
    ParsedVignette, PatientIdentity, ProblemListEntry, SocialHistory, SurgicalProcedure,
};
use crate::{ChartError, ChartResult};
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

/// Provenance of a generated chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationMetadata {
    pub chart_id: Uuid,
    pub generator_version: String,
    pub generation_timestamp: NaiveDateTime,
    pub narrative_backend: String,
    pub model_id: Option<String>,
    pub seed: u64,
}

/// A complete multi-year synthetic chart.
///
/// `encounter_history` is in chronological order and its last element is always the presenting
/// encounter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongitudinalChart {
    pub patient: PatientIdentity,
    pub encounter_history: Vec<EncounterRecord>,
    pub problem_list: Vec<ProblemListEntry>,
    pub medication_history: Vec<MedicationChange>,
    pub current_medications: MedicationList,
    pub allergies: Vec<Allergy>,
    pub surgical_history: Vec<SurgicalProcedure>,
    pub family_history: Vec<String>,
    pub social_history: SocialHistory,
    pub source_vignette: Option<ClinicalVignette>,
    pub parsed_vignette: Option<ParsedVignette>,
    pub generation_metadata: GenerationMetadata,
}

impl LongitudinalChart {
    pub fn current_encounter(&self) -> Option<&EncounterRecord> {
        self.encounter_history.last()
    }

    pub fn prior_encounters(&self) -> &[EncounterRecord] {
        match self.encounter_history.split_last() {
            Some((_, prior)) => prior,
            None => &[],
        }
    }

    /// # Errors
    ///
    /// Returns `ChartError::Serialization` if the chart cannot be encoded.
    pub fn to_json_pretty(&self) -> ChartResult<String> {
        serde_json::to_string_pretty(self).map_err(ChartError::Serialization)
    }
}
