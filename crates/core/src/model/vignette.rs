use super::{Acuity, ClinicalSetting, Sex};
use crate::constants::DEFAULT_CLINICAL_SETTING;
use crate::ChartResult;
use longchart_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A free-text clinical case description, the usual input to chart generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalVignette {
    pub vignette_text: NonEmptyText,
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub case_name: Option<String>,
    /// Where the vignette came from ("board_exam", "case_study", "generated").
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub ground_truth_diagnosis: Option<String>,
    #[serde(default)]
    pub ground_truth_appropriate_study: Option<String>,
}

impl ClinicalVignette {
    /// # Errors
    ///
    /// Returns `ChartError::Text` if `text` is blank.
    pub fn new(text: impl AsRef<str>) -> ChartResult<Self> {
        Ok(Self {
            vignette_text: NonEmptyText::new(text)?,
            case_id: None,
            case_name: None,
            source: None,
            seed: None,
            ground_truth_diagnosis: None,
            ground_truth_appropriate_study: None,
        })
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Structured fields extracted from a vignette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedVignette {
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub diagnosis: String,
    pub differential_diagnoses: Vec<String>,
    pub chief_complaint: String,
    pub symptom_onset: Option<String>,
    pub symptom_character: Option<String>,
    pub history_conditions: Vec<String>,
    pub surgical_history: Vec<String>,
    pub presenting_symptoms: Vec<String>,
    pub pertinent_negatives: Vec<String>,
    pub exam_findings: Option<String>,
    /// Canonical vital key (`heart_rate`, `temperature_f`, ...) to value.
    pub vitals_mentioned: BTreeMap<String, f64>,
    /// Canonical lab key (`wbc`, `lipase`, ...) to value.
    pub labs_mentioned: BTreeMap<String, f64>,
    pub ordered_study: String,
    pub imaging_modality: Option<String>,
    pub imaging_body_region: Option<String>,
    pub imaging_contrast: Option<String>,
    pub clinical_setting: String,
    pub acuity: Option<Acuity>,
    pub special_populations: Vec<String>,
    pub safety_flags_mentioned: Vec<String>,
    pub extraction_confidence: f64,
}

impl Default for ParsedVignette {
    fn default() -> Self {
        Self {
            age: None,
            sex: None,
            diagnosis: String::new(),
            differential_diagnoses: Vec::new(),
            chief_complaint: String::new(),
            symptom_onset: None,
            symptom_character: None,
            history_conditions: Vec::new(),
            surgical_history: Vec::new(),
            presenting_symptoms: Vec::new(),
            pertinent_negatives: Vec::new(),
            exam_findings: None,
            vitals_mentioned: BTreeMap::new(),
            labs_mentioned: BTreeMap::new(),
            ordered_study: String::new(),
            imaging_modality: None,
            imaging_body_region: None,
            imaging_contrast: None,
            clinical_setting: DEFAULT_CLINICAL_SETTING.into(),
            acuity: None,
            special_populations: Vec::new(),
            safety_flags_mentioned: Vec::new(),
            extraction_confidence: 0.0,
        }
    }
}

impl ParsedVignette {
    pub fn setting(&self) -> ClinicalSetting {
        let text = if self.clinical_setting.trim().is_empty() {
            DEFAULT_CLINICAL_SETTING
        } else {
            self.clinical_setting.as_str()
        };
        ClinicalSetting::from_text(text)
    }
}

/// Structured scenario description, turned into a vignette sentence before generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalScenario {
    pub diagnosis: String,
    pub history_summary: String,
    pub ordered_study: String,
    pub protocol_indication: String,
    pub age_hint: Option<u32>,
    pub sex_hint: Option<Sex>,
    pub seed: Option<u64>,
    pub case_id: Option<String>,
    pub case_name: Option<String>,
}

impl ClinicalScenario {
    /// One-paragraph vignette in the style of a board-exam stem.
    pub fn to_vignette_text(&self) -> String {
        let person = match self.sex_hint {
            Some(Sex::Female) => "woman",
            Some(Sex::Male) => "man",
            None => "patient",
        };
        let history = non_empty_or(&self.history_summary, "no significant PMH");
        let presentation = non_empty_or(&self.protocol_indication, &self.diagnosis);
        let study = non_empty_or(&self.ordered_study, "imaging");
        format!(
            "A {}-year-old {person} with a history of {history} presents with {presentation}. \
             The provider orders {study}.",
            self.age_hint.unwrap_or(55)
        )
    }

    pub fn to_vignette(&self) -> ChartResult<ClinicalVignette> {
        let mut vignette = ClinicalVignette::new(self.to_vignette_text())?;
        vignette.case_id = self.case_id.clone();
        vignette.case_name = self.case_name.clone();
        vignette.seed = self.seed;
        Ok(vignette)
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
