//! Typed view of the structured clinical data a backend returns for the presenting encounter.
//!
//! Backend JSON is loosely shaped: numbers sometimes arrive as strings, lists contain stray
//! scalars and keys vary between models. Coercion happens here, once, and anything that does
//! not fit is dropped.

use super::JsonObject;
use crate::knowledge::DiagnosisSeed;
use crate::model::{Acuity, Allergy, SocialHistory};
use longchart_types::NonEmptyText;
use serde_json::Value;
use std::collections::BTreeMap;

/// Medication ordered during the presenting encounter.
#[derive(Debug, Clone, PartialEq)]
pub struct InpatientMedication {
    pub name: NonEmptyText,
    pub dose: String,
    pub route: String,
    pub frequency: String,
    pub indication: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClinicalData {
    pub acuity: Option<Acuity>,
    pub vitals: BTreeMap<String, f64>,
    pub labs: BTreeMap<String, f64>,
    pub inpatient_medications: Vec<InpatientMedication>,
    pub additional_conditions: Vec<DiagnosisSeed>,
    pub allergies: Vec<Allergy>,
    pub physical_exam_findings: String,
    pub family_history: Vec<String>,
    pub social_history: Option<SocialHistory>,
}

impl ClinicalData {
    pub fn from_json(object: &JsonObject) -> Self {
        Self {
            acuity: object
                .get("acuity")
                .and_then(Value::as_str)
                .and_then(Acuity::from_loose),
            vitals: number_map(object.get("vitals")),
            labs: number_map(object.get("labs")),
            inpatient_medications: objects(object.get("inpatient_medications"))
                .filter_map(inpatient_medication)
                .collect(),
            additional_conditions: array(object.get("additional_conditions"))
                .filter_map(condition)
                .collect(),
            allergies: objects(object.get("allergies")).filter_map(allergy).collect(),
            physical_exam_findings: string_field(object, "physical_exam_findings")
                .unwrap_or_default(),
            family_history: array(object.get("family_history"))
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            social_history: object
                .get("social_history")
                .and_then(Value::as_object)
                .filter(|sh| !sh.is_empty())
                .map(social_history),
        }
    }
}

/// A JSON number, or a string that parses as one.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Numeric entries of an object, keyed by lower-cased key. Nulls and non-numbers are dropped.
pub(crate) fn number_map(value: Option<&Value>) -> BTreeMap<String, f64> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| as_number(v).map(|n| (k.to_lowercase(), n)))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn array(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter())
        .into_iter()
        .flatten()
}

fn objects(value: Option<&Value>) -> impl Iterator<Item = &JsonObject> {
    array(value).filter_map(Value::as_object)
}

pub(crate) fn string_field(object: &JsonObject, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn inpatient_medication(object: &JsonObject) -> Option<InpatientMedication> {
    let name = NonEmptyText::new(string_field(object, "name")?).ok()?;
    Some(InpatientMedication {
        name,
        dose: string_field(object, "dose").unwrap_or_default(),
        route: string_field(object, "route").unwrap_or_default(),
        frequency: string_field(object, "frequency").unwrap_or_default(),
        indication: string_field(object, "indication"),
    })
}

fn condition(value: &Value) -> Option<DiagnosisSeed> {
    match value {
        Value::String(s) => Some(DiagnosisSeed {
            condition: NonEmptyText::new(s).ok()?,
            icd10: None,
        }),
        Value::Object(object) => Some(DiagnosisSeed {
            condition: NonEmptyText::new(string_field(object, "condition")?).ok()?,
            icd10: string_field(object, "icd10"),
        }),
        _ => None,
    }
}

fn allergy(object: &JsonObject) -> Option<Allergy> {
    Some(Allergy {
        allergen: string_field(object, "allergen")?,
        allergy_type: string_field(object, "allergy_type")
            .or_else(|| string_field(object, "type"))
            .unwrap_or_default(),
        reaction: string_field(object, "reaction").unwrap_or_default(),
        severity: string_field(object, "severity").unwrap_or_default(),
    })
}

fn social_history(object: &JsonObject) -> SocialHistory {
    let defaults = SocialHistory::default();
    SocialHistory {
        smoking_status: string_field(object, "smoking_status").unwrap_or(defaults.smoking_status),
        smoking_details: string_field(object, "smoking_details"),
        alcohol_use: string_field(object, "alcohol_use").unwrap_or(defaults.alcohol_use),
        alcohol_details: string_field(object, "alcohol_details"),
        drug_use: string_field(object, "drug_use").unwrap_or(defaults.drug_use),
        drug_details: string_field(object, "drug_details"),
        occupation: string_field(object, "occupation"),
        living_situation: string_field(object, "living_situation"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn coerces_loose_backend_payload() {
        let raw = object(json!({
            "acuity": "Febrile",
            "vitals": {"heart_rate": "104", "temperature_f": 101.2, "pain_scale": null},
            "labs": {"WBC": 15.1, "lipase": "45"},
            "inpatient_medications": [
                {"name": "Ceftriaxone", "dose": "1g", "route": "IV", "frequency": "daily"},
                {"dose": "no name"},
                "Morphine"
            ],
            "additional_conditions": [{"condition": "Sepsis", "icd10": "A41.9"}, "Dehydration", 7],
            "allergies": [{"allergen": "Penicillin", "type": "Drug", "reaction": "Rash"}],
            "physical_exam_findings": " +Murphy's sign ",
            "family_history": ["Mother with gallstones", "", 3],
            "social_history": {"smoking_status": "Former"},
            "unexpected": {"ignored": true}
        }));

        let data = ClinicalData::from_json(&raw);
        assert_eq!(data.acuity, Some(Acuity::Febrile));
        assert_eq!(data.vitals.get("heart_rate"), Some(&104.0));
        assert!(!data.vitals.contains_key("pain_scale"));
        assert_eq!(data.labs.get("wbc"), Some(&15.1));
        assert_eq!(data.labs.get("lipase"), Some(&45.0));
        assert_eq!(data.inpatient_medications.len(), 1);
        assert_eq!(data.inpatient_medications[0].name.as_str(), "Ceftriaxone");
        assert_eq!(data.additional_conditions.len(), 2);
        assert_eq!(data.allergies[0].allergy_type, "Drug");
        assert_eq!(data.physical_exam_findings, "+Murphy's sign");
        assert_eq!(data.family_history, vec!["Mother with gallstones".to_string()]);

        let social = data.social_history.expect("social history");
        assert_eq!(social.smoking_status, "Former");
        assert_eq!(social.alcohol_use, "Social");
    }

    #[test]
    fn empty_object_gives_defaults() {
        let data = ClinicalData::from_json(&JsonObject::new());
        assert_eq!(data, ClinicalData::default());
    }
}
