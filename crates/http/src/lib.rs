//! # Longchart HTTP
//!
//! Narrative backend that calls a text-generation service over HTTP.
//!
//! Contains:
//! - [`HttpNarrativeBackend`], a blocking client for Ollama-style `/api/generate` endpoints
//! - Prompt templates for every [`longchart_core::NarrativeBackend`] method (`prompts` module)
//!
//! Chart assembly and sampling stay in `longchart-core`; this crate only turns typed
//! contexts into prompts and model output back into text or JSON.

mod client;
pub mod prompts;

pub use client::{HttpBackendError, HttpNarrativeBackend, DEFAULT_NARRATIVE_URL};
