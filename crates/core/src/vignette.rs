//! Free-text vignette parsing.
//!
//! The narrative backend does the extraction; this module coerces its loosely shaped JSON into
//! a [`ParsedVignette`], normalizes vital and lab key synonyms, and reads imaging modality,
//! body region and contrast out of the ordered study.

use crate::constants::DEFAULT_CLINICAL_SETTING;
use crate::model::{Acuity, ClinicalVignette, ParsedVignette, Sex};
use crate::narrative::{array, as_number, number_map, string_field, JsonObject, NarrativeBackend};
use crate::ChartResult;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fields counted towards `extraction_confidence`.
const CONFIDENCE_FIELDS: f64 = 7.0;

const VITAL_SYNONYMS: &[(&str, &str)] = &[
    ("temp", "temperature_f"),
    ("temperature", "temperature_f"),
    ("t", "temperature_f"),
    ("hr", "heart_rate"),
    ("pulse", "heart_rate"),
    ("bp_systolic", "blood_pressure_systolic"),
    ("sbp", "blood_pressure_systolic"),
    ("bp_diastolic", "blood_pressure_diastolic"),
    ("dbp", "blood_pressure_diastolic"),
    ("rr", "respiratory_rate"),
    ("spo2", "oxygen_saturation"),
    ("o2_sat", "oxygen_saturation"),
    ("pain", "pain_scale"),
];

const LAB_SYNONYMS: &[(&str, &str)] = &[
    ("white_blood_cell", "wbc"),
    ("white_count", "wbc"),
    ("hgb", "hemoglobin"),
    ("hb", "hemoglobin"),
    ("hct", "hematocrit"),
    ("plt", "platelets"),
    ("na", "sodium"),
    ("k", "potassium"),
    ("cl", "chloride"),
    ("bicarb", "co2"),
    ("bicarbonate", "co2"),
    ("cr", "creatinine"),
    ("glu", "glucose"),
    ("ca", "calcium"),
    ("sgot", "ast"),
    ("sgpt", "alt"),
    ("alkaline_phosphatase", "alp"),
    ("alk_phos", "alp"),
    ("t_bili", "bilirubin_total"),
    ("total_bilirubin", "bilirubin_total"),
    ("tbili", "bilirubin_total"),
    ("d_bili", "bilirubin_direct"),
    ("direct_bilirubin", "bilirubin_direct"),
    ("alb", "albumin"),
    ("troponin", "troponin_i"),
    ("trop", "troponin_i"),
    ("d-dimer", "d_dimer"),
    ("a1c", "hba1c"),
    ("egfr", "gfr"),
];

/// Turns vignette text into a [`ParsedVignette`] using a narrative backend for extraction.
#[derive(Clone)]
pub struct VignetteParser {
    backend: Arc<dyn NarrativeBackend>,
}

impl VignetteParser {
    pub fn new(backend: Arc<dyn NarrativeBackend>) -> Self {
        Self { backend }
    }

    /// Extract structured fields from a vignette.
    ///
    /// # Errors
    ///
    /// Returns `ChartError::Narrative` if the backend call fails. An unusable extraction is
    /// not an error: it produces a mostly empty vignette with low confidence.
    pub fn parse(&self, vignette: &ClinicalVignette) -> ChartResult<ParsedVignette> {
        let raw = self
            .backend
            .generate_vignette_extraction(vignette.vignette_text.as_str())?;
        let parsed = parsed_from_extraction(&raw);
        tracing::debug!(
            diagnosis = %parsed.diagnosis,
            confidence = parsed.extraction_confidence,
            "vignette parsed"
        );
        Ok(parsed)
    }
}

/// Coerce a raw extraction object into a [`ParsedVignette`].
pub fn parsed_from_extraction(raw: &JsonObject) -> ParsedVignette {
    let mut parsed = ParsedVignette {
        age: raw
            .get("age")
            .and_then(as_number)
            .filter(|age| *age >= 0.0)
            .map(|age| age.round() as u32),
        sex: raw.get("sex").and_then(Value::as_str).and_then(Sex::from_loose),
        diagnosis: string_field(raw, "diagnosis").unwrap_or_default(),
        differential_diagnoses: strings(raw, "differential_diagnoses"),
        chief_complaint: string_field(raw, "chief_complaint").unwrap_or_default(),
        symptom_onset: string_field(raw, "symptom_onset"),
        symptom_character: string_field(raw, "symptom_character"),
        history_conditions: strings(raw, "history_conditions"),
        surgical_history: strings(raw, "surgical_history"),
        presenting_symptoms: strings(raw, "presenting_symptoms"),
        pertinent_negatives: strings(raw, "pertinent_negatives"),
        exam_findings: string_field(raw, "exam_findings"),
        vitals_mentioned: normalize_keys(number_map(raw.get("vitals")), VITAL_SYNONYMS),
        labs_mentioned: normalize_keys(
            number_map(raw.get("labs"))
                .into_iter()
                .map(|(k, v)| (k.replace(' ', "_"), v))
                .collect(),
            LAB_SYNONYMS,
        ),
        ordered_study: string_field(raw, "ordered_study").unwrap_or_default(),
        clinical_setting: string_field(raw, "clinical_setting")
            .unwrap_or_else(|| DEFAULT_CLINICAL_SETTING.to_string()),
        acuity: raw
            .get("acuity")
            .and_then(Value::as_str)
            .and_then(Acuity::from_loose),
        special_populations: strings(raw, "special_populations"),
        safety_flags_mentioned: strings(raw, "safety_flags"),
        ..ParsedVignette::default()
    };

    if !parsed.ordered_study.is_empty() {
        parsed.imaging_modality = Some(modality(&parsed.ordered_study));
        parsed.imaging_body_region = Some(body_region(&parsed.ordered_study).to_string());
        parsed.imaging_contrast = Some(contrast(&parsed.ordered_study).to_string());
    }

    let filled = [
        parsed.age.is_some(),
        parsed.sex.is_some(),
        !parsed.diagnosis.is_empty(),
        !parsed.ordered_study.is_empty(),
        !parsed.chief_complaint.is_empty(),
        !parsed.vitals_mentioned.is_empty(),
        !parsed.labs_mentioned.is_empty(),
    ]
    .iter()
    .filter(|f| **f)
    .count();
    parsed.extraction_confidence = (filled as f64 / CONFIDENCE_FIELDS).min(1.0);
    parsed
}

fn strings(raw: &JsonObject, key: &str) -> Vec<String> {
    array(raw.get(key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_keys(
    values: BTreeMap<String, f64>,
    synonyms: &[(&str, &str)],
) -> BTreeMap<String, f64> {
    values
        .into_iter()
        .map(|(key, value)| {
            let canonical = synonyms
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, canonical)| canonical.to_string())
                .unwrap_or(key);
            (canonical, value)
        })
        .collect()
}

/// Imaging modality named by an ordered study, e.g. "CT abdomen/pelvis with contrast" -> "CT".
///
/// Short abbreviations match whole words only ("us" is not found in "pus").
pub fn modality(ordered_study: &str) -> String {
    let lower = ordered_study.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let word = |candidates: &[&str]| words.iter().any(|w| candidates.contains(w));
    let has = |needle: &str| lower.contains(needle);

    let named = if has("ercp") {
        "ERCP"
    } else if word(&["pet"]) {
        "PET/CT"
    } else if has("laparoscop") {
        "Diagnostic Laparoscopy"
    } else if word(&["ct", "cta", "ctpa"]) {
        "CT"
    } else if word(&["mri", "mr", "mrcp", "mra"]) {
        "MRI"
    } else if word(&["eus"]) || has("endoscopic") {
        "EUS"
    } else if word(&["us"]) || has("ultrasound") || has("sono") {
        "Ultrasound"
    } else if has("x-ray") || has("xray") || word(&["cxr"]) || has("radiograph") {
        "X-ray"
    } else if has("hida") || has("hepatobiliary") {
        "Nuclear Medicine (HIDA)"
    } else {
        return ordered_study
            .split_whitespace()
            .next()
            .unwrap_or("Imaging")
            .to_string();
    };
    named.to_string()
}

pub fn body_region(ordered_study: &str) -> &'static str {
    let lower = ordered_study.to_lowercase();
    if lower.contains("abdomen") && lower.contains("pelvis") {
        "Abdomen and Pelvis"
    } else if lower.contains("abdomen") {
        "Abdomen"
    } else if lower.contains("chest") || lower.contains("cxr") {
        "Chest"
    } else if lower.contains("head") || lower.contains("brain") {
        "Head"
    } else if lower.contains("spine") {
        "Spine"
    } else {
        "Abdomen"
    }
}

/// Contrast phrase for an ordered study, or an empty string when none is stated.
pub fn contrast(ordered_study: &str) -> &'static str {
    let lower = ordered_study.to_lowercase();
    if lower.contains("without and with") || lower.contains("w/o and w/") {
        "without and with IV contrast"
    } else if lower.contains("with contrast")
        || lower.contains("w/ contrast")
        || lower.contains("w/contrast")
    {
        "with IV contrast"
    } else if lower.contains("without contrast") || lower.contains("w/o contrast") {
        "without contrast"
    } else if lower.contains("pe protocol") {
        "with IV contrast"
    } else {
        ""
    }
}
