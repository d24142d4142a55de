use crate::prompts;
use longchart_core::narrative::{
    parse_json_response, trim_to_last_sentence, DischargeContext, EncounterNarrativeContext,
    JsonObject, NarrativeBackend, NarrativeError, NarrativeResult, RadiologyContext,
    ScenarioContext, VisitNoteContext,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local Ollama server.
pub const DEFAULT_NARRATIVE_URL: &str = "http://localhost:11434";

const GENERATE_PATH: &str = "/api/generate";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Generation of a long note on a local model can take minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const STRUCTURED_MAX_TOKENS: u32 = 1200;
const NOTE_MAX_TOKENS: u32 = 600;
const REPORT_MAX_TOKENS: u32 = 800;
const NURSING_MAX_TOKENS: u32 = 200;

#[derive(Debug, thiserror::Error)]
pub enum HttpBackendError {
    #[error("invalid narrative service URL: {0}")]
    InvalidUrl(String),
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Blocking narrative backend for an Ollama-compatible text generation service.
///
/// Sampling is greedy (`temperature` 0) so a given prompt reproduces the same text on the
/// same model.
pub struct HttpNarrativeBackend {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl HttpNarrativeBackend {
    /// # Errors
    ///
    /// Returns `HttpBackendError::InvalidUrl` unless `base_url` is an http or https URL, or
    /// `HttpBackendError::Client` if the HTTP client cannot be built.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, HttpBackendError> {
        let cleaned = base_url.trim().trim_end_matches('/');
        let parsed = reqwest::Url::parse(cleaned)
            .map_err(|e| HttpBackendError::InvalidUrl(format!("{cleaned:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HttpBackendError::InvalidUrl(format!(
                "{cleaned:?}: scheme must be http or https, got {}",
                parsed.scheme()
            )));
        }

        let http = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let model = model.into();
        tracing::info!(endpoint = cleaned, model = %model, "narrative service configured");

        Ok(Self {
            http,
            endpoint: format!("{cleaned}{GENERATE_PATH}"),
            model,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn complete(&self, prompt: &str, max_tokens: u32) -> NarrativeResult<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: max_tokens,
                temperature: 0.0,
            },
        };
        tracing::debug!(prompt_len = prompt.len(), max_tokens, "narrative request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(NarrativeError::Transport(format!(
                "{} returned {status}: {}",
                self.endpoint,
                detail.trim()
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .map_err(|e| NarrativeError::InvalidResponse(e.to_string()))?;
        Ok(generated.response.trim().to_string())
    }

    fn prose(&self, prompt: &str, max_tokens: u32) -> NarrativeResult<String> {
        self.complete(prompt, max_tokens)
            .map(|text| trim_to_last_sentence(&text))
    }

    fn structured(&self, prompt: &str) -> NarrativeResult<JsonObject> {
        self.complete(prompt, STRUCTURED_MAX_TOKENS)
            .map(|text| parse_json_response(&text))
    }
}

impl NarrativeBackend for HttpNarrativeBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn model_id(&self) -> Option<&str> {
        Some(&self.model)
    }

    fn generate_clinical_data(&self, context: &ScenarioContext) -> NarrativeResult<JsonObject> {
        self.structured(&prompts::clinical_data(context))
    }

    fn generate_hpi(&self, context: &EncounterNarrativeContext) -> NarrativeResult<String> {
        self.prose(&prompts::hpi(context), NOTE_MAX_TOKENS)
    }

    fn generate_physical_exam(
        &self,
        context: &EncounterNarrativeContext,
    ) -> NarrativeResult<String> {
        self.prose(&prompts::physical_exam(context), NOTE_MAX_TOKENS)
    }

    fn generate_assessment_plan(
        &self,
        context: &EncounterNarrativeContext,
    ) -> NarrativeResult<String> {
        self.prose(&prompts::assessment_plan(context), NOTE_MAX_TOKENS)
    }

    fn generate_radiology_report(&self, context: &RadiologyContext) -> NarrativeResult<String> {
        self.complete(&prompts::radiology_report(context), REPORT_MAX_TOKENS)
    }

    fn generate_nursing_notes(
        &self,
        context: &EncounterNarrativeContext,
    ) -> NarrativeResult<Vec<String>> {
        let note = self.prose(&prompts::nursing_note(context), NURSING_MAX_TOKENS)?;
        Ok(vec![note])
    }

    fn generate_discharge_summary(&self, context: &DischargeContext) -> NarrativeResult<String> {
        self.complete(&prompts::discharge_summary(context), REPORT_MAX_TOKENS)
    }

    fn generate_vignette_extraction(&self, vignette_text: &str) -> NarrativeResult<JsonObject> {
        self.structured(&prompts::vignette_extraction(vignette_text))
    }

    fn generate_office_visit_note(&self, context: &VisitNoteContext) -> NarrativeResult<String> {
        self.prose(&prompts::office_visit_note(context), NOTE_MAX_TOKENS)
    }

    fn generate_consultation_note(&self, context: &VisitNoteContext) -> NarrativeResult<String> {
        self.prose(&prompts::consultation_note(context), NOTE_MAX_TOKENS)
    }
}
