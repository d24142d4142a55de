//! Narrative text generation.
//!
//! Free text (notes, reports, structured clinical data and vignette extraction) comes from a
//! [`NarrativeBackend`]. The core never inspects which backend it was given; it is injected
//! at construction as an `Arc<dyn NarrativeBackend>`.

mod clinical_data;
mod context;
mod stub;

pub use clinical_data::{ClinicalData, InpatientMedication};
pub(crate) use clinical_data::{array, as_number, number_map, string_field};
pub use context::{
    DischargeContext, EncounterNarrativeContext, RadiologyContext, ScenarioContext,
    VisitNoteContext,
};
pub use stub::StubNarrativeBackend;

/// Loosely-typed JSON object as returned by a backend.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("narrative transport failed: {0}")]
    Transport(String),
    #[error("narrative service returned an unusable response: {0}")]
    InvalidResponse(String),
}

pub type NarrativeResult<T> = std::result::Result<T, NarrativeError>;

/// Source of generated clinical prose and structured data.
///
/// Calls are blocking. Structured responses that cannot be parsed should degrade to an empty
/// object (see [`parse_json_response`]); transport failures are returned as errors.
pub trait NarrativeBackend: Send + Sync {
    /// Short identifier recorded in the chart metadata.
    fn name(&self) -> &str;

    /// Model identifier recorded in the chart metadata, if the backend has one.
    fn model_id(&self) -> Option<&str> {
        None
    }

    /// Diagnosis-specific vitals, labs, medications and history for the presenting encounter.
    fn generate_clinical_data(&self, context: &ScenarioContext) -> NarrativeResult<JsonObject>;

    fn generate_hpi(&self, context: &EncounterNarrativeContext) -> NarrativeResult<String>;

    fn generate_physical_exam(&self, context: &EncounterNarrativeContext)
        -> NarrativeResult<String>;

    fn generate_assessment_plan(
        &self,
        context: &EncounterNarrativeContext,
    ) -> NarrativeResult<String>;

    /// Report text with TECHNIQUE, FINDINGS and IMPRESSION sections.
    fn generate_radiology_report(&self, context: &RadiologyContext) -> NarrativeResult<String>;

    fn generate_nursing_notes(
        &self,
        context: &EncounterNarrativeContext,
    ) -> NarrativeResult<Vec<String>>;

    fn generate_discharge_summary(&self, context: &DischargeContext) -> NarrativeResult<String>;

    /// Structured fields pulled out of a free-text vignette.
    fn generate_vignette_extraction(&self, vignette_text: &str) -> NarrativeResult<JsonObject>;

    fn generate_office_visit_note(&self, context: &VisitNoteContext) -> NarrativeResult<String>;

    fn generate_consultation_note(&self, context: &VisitNoteContext) -> NarrativeResult<String>;
}

/// Parse a JSON object out of model output.
///
/// Tries, in order: the whole text, the first fenced code block, and the span from the first
/// `{` to the last `}`. Anything else yields an empty object.
pub fn parse_json_response(response: &str) -> JsonObject {
    let response = response.trim();
    if response.is_empty() {
        return JsonObject::new();
    }

    if let Some(object) = parse_object(response) {
        return object;
    }

    if let Some(object) = fenced_block(response).and_then(parse_object) {
        return object;
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if start < end {
            if let Some(object) = parse_object(&response[start..=end]) {
                return object;
            }
        }
    }

    tracing::warn!(
        response_len = response.len(),
        "could not parse JSON from narrative response; using empty object"
    );
    JsonObject::new()
}

fn parse_object(text: &str) -> Option<JsonObject> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Body of the first ```` ``` ```` block, with an optional `json` language tag removed.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let close = rest.find("```")?;
    Some(rest[..close].trim())
}

const SENTENCE_END: &[char] = &['.', '!', '?'];

/// Cut text back to its last complete sentence.
///
/// Output that hits a token limit often stops mid-sentence. Text that already ends in `.`,
/// `!` or `?`, or that has no sentence boundary after its first character, is returned as is.
pub fn trim_to_last_sentence(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() || trimmed.ends_with(SENTENCE_END) {
        return text.to_string();
    }
    match text.rfind(SENTENCE_END) {
        Some(boundary) if boundary > 0 => text[..=boundary].to_string(),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_object() {
        let parsed = parse_json_response(r#"{"acuity": "febrile"}"#);
        assert_eq!(parsed["acuity"], "febrile");
    }

    #[test]
    fn parses_fenced_block() {
        let parsed = parse_json_response("Here you go:\n```json\n{\"age\": 52}\n```\nThanks");
        assert_eq!(parsed["age"], 52);
    }

    #[test]
    fn parses_outermost_braces() {
        let parsed = parse_json_response("Result: {\"labs\": {\"wbc\": 14.2}} -- end");
        assert_eq!(parsed["labs"]["wbc"], 14.2);
    }

    #[test]
    fn garbage_becomes_empty_object() {
        assert!(parse_json_response("no json here").is_empty());
        assert!(parse_json_response("{not: valid").is_empty());
        assert!(parse_json_response("").is_empty());
        assert!(parse_json_response("[1, 2, 3]").is_empty());
    }

    #[test]
    fn trims_to_last_sentence() {
        assert_eq!(
            trim_to_last_sentence("Patient stable. Pain improving with anal"),
            "Patient stable."
        );
        assert_eq!(trim_to_last_sentence("Complete sentence!"), "Complete sentence!");
        assert_eq!(trim_to_last_sentence("no boundary at all"), "no boundary at all");
    }
}
