//! Generator runtime configuration.
//!
//! Everything that would otherwise be read from the process environment or the wall clock
//! (seed, "now", feature toggles, the knowledge base location) is resolved once at startup
//! and passed into [`crate::ChartGenerator`]. Core code never reads environment variables or
//! calls `Utc::now()`, which keeps chart generation reproducible.

use crate::knowledge::KnowledgeBase;
use crate::{ChartError, ChartResult};
use chrono::NaiveDateTime;
use std::path::PathBuf;

/// Generator configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    seed: Option<u64>,
    reference_time: NaiveDateTime,
    mask_diagnosis: bool,
    narrate_prior_imaging: bool,
    include_discharge_summary: bool,
}

impl GeneratorConfig {
    /// Create a configuration anchored at `reference_time`.
    ///
    /// `reference_time` plays the role of "now": timeline offsets are measured from it and it
    /// is stamped into the chart metadata as the generation timestamp.
    pub fn new(reference_time: NaiveDateTime) -> Self {
        Self {
            seed: None,
            reference_time,
            mask_diagnosis: false,
            narrate_prior_imaging: false,
            include_discharge_summary: false,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Provider-facing notes see a symptom-based working diagnosis instead of the real one.
    pub fn with_mask_diagnosis(mut self, enabled: bool) -> Self {
        self.mask_diagnosis = enabled;
        self
    }

    /// Ask the narrative backend to write reports for historical imaging instead of using the
    /// canned template text.
    pub fn with_prior_imaging_narration(mut self, enabled: bool) -> Self {
        self.narrate_prior_imaging = enabled;
        self
    }

    /// Add a discharge summary to inpatient and ICU presenting encounters.
    pub fn with_discharge_summary(mut self, enabled: bool) -> Self {
        self.include_discharge_summary = enabled;
        self
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn reference_time(&self) -> NaiveDateTime {
        self.reference_time
    }

    pub fn mask_diagnosis(&self) -> bool {
        self.mask_diagnosis
    }

    pub fn narrate_prior_imaging(&self) -> bool {
        self.narrate_prior_imaging
    }

    pub fn include_discharge_summary(&self) -> bool {
        self.include_discharge_summary
    }
}

/// Load the knowledge base without reading environment variables.
///
/// If `override_path` is provided it must point at a readable YAML file; otherwise the copy
/// embedded at compile time is used.
///
/// # Errors
///
/// Returns `ChartError::InvalidInput` if the override is not a file, and propagates read,
/// schema and consistency errors from [`KnowledgeBase`].
pub fn resolve_knowledge_base(override_path: Option<PathBuf>) -> ChartResult<KnowledgeBase> {
    match override_path {
        Some(path) => {
            if !path.is_file() {
                return Err(ChartError::InvalidInput(format!(
                    "knowledge base override {} is not a file",
                    path.display()
                )));
            }
            KnowledgeBase::from_path(&path)
        }
        None => KnowledgeBase::embedded(),
    }
}

/// Parse a chart seed from an optional string value.
///
/// `None` or empty/whitespace means "no fixed seed".
pub fn seed_from_env_value(value: Option<String>) -> ChartResult<Option<u64>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    value
        .map(|v| {
            v.parse::<u64>()
                .map_err(|e| ChartError::InvalidInput(format!("invalid seed {v:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EMBEDDED_KNOWLEDGE_BASE;
    use std::io::Write;

    #[test]
    fn seed_parsing_accepts_blank_and_numbers() {
        assert_eq!(seed_from_env_value(None).expect("none is fine"), None);
        assert_eq!(seed_from_env_value(Some("  ".into())).expect("blank is fine"), None);
        assert_eq!(
            seed_from_env_value(Some(" 42 ".into())).expect("should parse"),
            Some(42)
        );
    }

    #[test]
    fn seed_parsing_rejects_garbage() {
        match seed_from_env_value(Some("forty-two".into())) {
            Err(ChartError::InvalidInput(msg)) => assert!(msg.contains("forty-two")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn override_must_be_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        match resolve_knowledge_base(Some(dir.path().to_path_buf())) {
            Err(ChartError::InvalidInput(msg)) => assert!(msg.contains("not a file")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn override_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(EMBEDDED_KNOWLEDGE_BASE.as_bytes())
            .expect("write knowledge base");

        let kb = resolve_knowledge_base(Some(file.path().to_path_buf()))
            .expect("override should load");
        assert!(kb.progression("metabolic_syndrome").is_some());
    }

    #[test]
    fn builder_methods_set_flags() {
        let now = chrono::NaiveDate::from_ymd_opt(2025, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date");
        let cfg = GeneratorConfig::new(now)
            .with_seed(Some(7))
            .with_mask_diagnosis(true)
            .with_discharge_summary(true);

        assert_eq!(cfg.seed(), Some(7));
        assert!(cfg.mask_diagnosis());
        assert!(cfg.include_discharge_summary());
        assert!(!cfg.narrate_prior_imaging());
        assert_eq!(cfg.reference_time(), now);
    }
}
