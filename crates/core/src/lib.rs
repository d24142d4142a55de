//! # Longchart Core
//!
//! Longitudinal synthetic patient chart generation.
//!
//! Given a clinical vignette, this crate builds a multi-year chart for a synthetic patient:
//! - a timeline of past visits driven by disease progression templates
//! - trending labs, vitals and an evolving problem and medication list
//! - a fully detailed presenting encounter with generated clinical notes
//!
//! **No transport concerns**: free text comes from an injected [`NarrativeBackend`]. HTTP
//! backends live in `longchart-http`; the command line lives in `longchart-cli`.

pub mod assembler;
pub mod config;
pub mod constants;
pub mod demographics;
pub mod encounter;
pub mod error;
pub mod generator;
pub mod knowledge;
pub mod model;
pub mod narrative;
pub mod state;
pub mod timeline;
pub mod values;
pub mod vignette;

pub use config::{resolve_knowledge_base, seed_from_env_value, GeneratorConfig};
pub use error::{ChartError, ChartResult};
pub use generator::{ChartGenerator, ChartGeneratorBuilder};
pub use knowledge::KnowledgeBase;
pub use model::{
    ClinicalScenario, ClinicalVignette, LongitudinalChart, ParsedVignette,
};
pub use narrative::{NarrativeBackend, NarrativeError, NarrativeResult, StubNarrativeBackend};
pub use vignette::VignetteParser;
