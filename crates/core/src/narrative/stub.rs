use super::{
    DischargeContext, EncounterNarrativeContext, JsonObject, NarrativeBackend, NarrativeResult,
    RadiologyContext, ScenarioContext, VisitNoteContext,
};
use serde_json::{json, Value};

/// Deterministic offline backend.
///
/// Prose is assembled from the context fields, so it always mentions the diagnosis and history
/// it was given. Structured calls return the configured payloads; vignette extraction falls
/// back to a pattern-based reading of board-exam style stems ("A 47-year-old woman with a
/// history of ... presents with ... The provider orders ...").
#[derive(Debug, Clone, Default)]
pub struct StubNarrativeBackend {
    extraction: Option<JsonObject>,
    clinical_data: JsonObject,
}

impl StubNarrativeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `extraction` from every vignette extraction call.
    pub fn with_extraction(mut self, extraction: JsonObject) -> Self {
        self.extraction = Some(extraction);
        self
    }

    /// Return `clinical_data` from every clinical-data call.
    pub fn with_clinical_data(mut self, clinical_data: JsonObject) -> Self {
        self.clinical_data = clinical_data;
        self
    }
}

impl NarrativeBackend for StubNarrativeBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn generate_clinical_data(&self, _context: &ScenarioContext) -> NarrativeResult<JsonObject> {
        Ok(self.clinical_data.clone())
    }

    fn generate_hpi(&self, context: &EncounterNarrativeContext) -> NarrativeResult<String> {
        let mut hpi = format!(
            "{}-year-old {} presenting with {}. Working diagnosis: {}. Medical history: {}. \
             Current medications: {}. Labs: {}.",
            context.age,
            context.sex.as_str().to_lowercase(),
            context.chief_complaint,
            context.diagnosis,
            context.medical_history,
            context.medications,
            context.labs_summary
        );
        if context.has_prior_visits {
            hpi.push_str("\n\nPrior visits:\n");
            hpi.push_str(&context.prior_visit_summary);
        }
        Ok(hpi)
    }

    fn generate_physical_exam(
        &self,
        context: &EncounterNarrativeContext,
    ) -> NarrativeResult<String> {
        let findings = if context.physical_exam_findings.is_empty() {
            "No focal findings"
        } else {
            context.physical_exam_findings.as_str()
        };
        Ok(format!(
            "GENERAL: Alert, in no acute distress. Temp {}F, HR {}, BP {}, RR {}, SpO2 {}%.\n\
             ABDOMEN: {findings}.",
            context.temperature, context.heart_rate, context.bp, context.respiratory_rate, context.spo2
        ))
    }

    fn generate_assessment_plan(
        &self,
        context: &EncounterNarrativeContext,
    ) -> NarrativeResult<String> {
        Ok(format!(
            "ASSESSMENT:\n{}-year-old {} with {}.\n\nPLAN:\n1. {} - {} ordered.\n2. Continue home \
             medications: {}.\n3. Disposition pending workup.",
            context.age,
            context.sex.as_str().to_lowercase(),
            context.diagnosis,
            context.diagnosis,
            context.imaging_ordered,
            context.medications
        ))
    }

    fn generate_radiology_report(&self, context: &RadiologyContext) -> NarrativeResult<String> {
        let findings = context
            .expected_findings
            .clone()
            .unwrap_or_else(|| format!("Findings consistent with {}.", context.diagnosis));
        Ok(format!(
            "TECHNIQUE:\n{} of the {} performed {}.\n\nFINDINGS:\n{findings}\n\nIMPRESSION:\n1. {}",
            context.modality,
            context.body_region.to_lowercase(),
            context.contrast,
            context.indication
        ))
    }

    fn generate_nursing_notes(
        &self,
        context: &EncounterNarrativeContext,
    ) -> NarrativeResult<Vec<String>> {
        Ok(vec![format!(
            "Patient resting. Pain {}/10. Vitals: Temp {}F, HR {}, BP {}. {}. Will continue to monitor.",
            context.pain, context.temperature, context.heart_rate, context.bp, context.time_description
        )])
    }

    fn generate_discharge_summary(&self, context: &DischargeContext) -> NarrativeResult<String> {
        Ok(format!(
            "Admitted for {}. {} Discharge medications: {}. Follow-up: {}.",
            context.diagnosis, context.clinical_summary, context.discharge_meds, context.follow_up
        ))
    }

    fn generate_vignette_extraction(&self, vignette_text: &str) -> NarrativeResult<JsonObject> {
        match &self.extraction {
            Some(extraction) => Ok(extraction.clone()),
            None => Ok(read_stem(vignette_text)),
        }
    }

    fn generate_office_visit_note(&self, context: &VisitNoteContext) -> NarrativeResult<String> {
        Ok(format!(
            "SUBJECTIVE: {}-year-old {} seen for {}.\nOBJECTIVE: BP {}, HR {}. Labs: {}.\n\
             ASSESSMENT: {}\nPLAN: Medications: {}. History: {}.",
            context.age,
            context.sex.as_str().to_lowercase(),
            context.reason,
            context.bp,
            context.heart_rate,
            context.labs_summary,
            context.assessment,
            context.medications,
            context.medical_history
        ))
    }

    fn generate_consultation_note(&self, context: &VisitNoteContext) -> NarrativeResult<String> {
        let referrer = context.referring_provider.as_deref().unwrap_or("primary care");
        Ok(format!(
            "REASON FOR CONSULTATION: {} (referred by {referrer}).\nASSESSMENT: {}\n\
             RECOMMENDATIONS: Continue {}. Will update referring provider.",
            context.reason, context.assessment, context.medications
        ))
    }
}

/// Pattern-based extraction for the stems produced by `ClinicalScenario::to_vignette_text`.
fn read_stem(text: &str) -> JsonObject {
    let mut out = JsonObject::new();
    let lower = text.to_lowercase();

    if let Some(age) = age_before_year_old(&lower) {
        out.insert("age".into(), json!(age));
    }

    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();
    let sex = if words.iter().any(|w| matches!(*w, "woman" | "female" | "girl")) {
        Some("Female")
    } else if words.iter().any(|w| matches!(*w, "man" | "male" | "boy")) {
        Some("Male")
    } else {
        None
    };
    if let Some(sex) = sex {
        out.insert("sex".into(), json!(sex));
    }

    if let Some(history) = between(text, "history of ", " presents with") {
        let conditions: Vec<Value> = history
            .split(", ")
            .flat_map(|part| part.split(" and "))
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("no significant PMH"))
            .map(|c| json!(c))
            .collect();
        out.insert("history_conditions".into(), Value::Array(conditions));
    }

    if let Some(presentation) = between(text, "presents with ", ".") {
        out.insert("diagnosis".into(), json!(presentation.trim()));
        out.insert("chief_complaint".into(), json!(presentation.trim()));
    }

    if let Some(study) = between(text, "orders ", ".") {
        out.insert("ordered_study".into(), json!(study.trim()));
    }

    out.insert("clinical_setting".into(), json!("ED"));
    out
}

fn age_before_year_old(lower: &str) -> Option<u32> {
    let end = lower.find("-year-old")?;
    let digits: String = lower[..end]
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    let to = rest.find(end)?;
    Some(&rest[..to])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClinicalScenario;
    use crate::model::Sex;

    #[test]
    fn reads_scenario_stem() {
        let scenario = ClinicalScenario {
            diagnosis: "Acute cholecystitis".into(),
            history_summary: "female, metabolic syndrome, GERD".into(),
            ordered_study: "RUQ ultrasound".into(),
            age_hint: Some(52),
            sex_hint: Some(Sex::Female),
            ..ClinicalScenario::default()
        };
        let backend = StubNarrativeBackend::new();
        let raw = backend
            .generate_vignette_extraction(&scenario.to_vignette_text())
            .expect("stub extraction");

        assert_eq!(raw["age"], 52);
        assert_eq!(raw["sex"], "Female");
        assert_eq!(raw["diagnosis"], "Acute cholecystitis");
        assert_eq!(raw["ordered_study"], "RUQ ultrasound");
        let history = raw["history_conditions"].as_array().expect("history array");
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], "metabolic syndrome");
    }

    #[test]
    fn configured_extraction_wins() {
        let mut fixed = JsonObject::new();
        fixed.insert("diagnosis".into(), json!("Appendicitis"));
        let backend = StubNarrativeBackend::new().with_extraction(fixed);
        let raw = backend
            .generate_vignette_extraction("A 30-year-old man presents with pain.")
            .expect("stub extraction");
        assert_eq!(raw.len(), 1);
        assert_eq!(raw["diagnosis"], "Appendicitis");
    }

    #[test]
    fn radiology_report_has_sections() {
        let backend = StubNarrativeBackend::new();
        let report = backend
            .generate_radiology_report(&RadiologyContext {
                modality: "Ultrasound".into(),
                body_region: "Abdomen".into(),
                contrast: "without contrast".into(),
                age: 50,
                sex: Sex::Male,
                indication: "RUQ pain".into(),
                diagnosis: "Cholelithiasis".into(),
                expected_findings: Some("Gallstones.".into()),
            })
            .expect("report");
        assert!(report.starts_with("TECHNIQUE:"));
        assert!(report.contains("FINDINGS:\nGallstones."));
        assert!(report.contains("IMPRESSION:"));
    }
}
