//! Static clinical reference data.
//!
//! The knowledge base is a single YAML document (normal lab ranges, panels, vital-sign acuity
//! bands, encounter profiles, progression templates and demographic pools). It is parsed once
//! into an immutable [`KnowledgeBase`] and shared between generations behind an `Arc`.

mod tables;

pub use tables::{
    AnnualVariant, DemographicPools, DiagnosisSeed, EncounterProfile, ImagingDirective,
    LabPanelDefinition, LabRange, MedicationChangeSeed, MedicationSeed, Progression,
    ProgressionKeyword, ProgressionStage, ProviderPool, RxNormEntry, ValueRange, VitalBand,
    VitalBands,
};

use crate::constants::{
    EMBEDDED_KNOWLEDGE_BASE, EMERGENCY_MEDICINE, FAMILY_MEDICINE, INTERNAL_MEDICINE, NURSING,
    RADIOLOGY,
};
use crate::model::{Acuity, Sex, VisitKind};
use crate::{ChartError, ChartResult};
use std::collections::BTreeMap;
use std::path::Path;
use tables::KnowledgeDocument;

/// Panel set used when a visit key has no entry of its own.
pub const DEFAULT_PANEL_KEY: &str = "annual_physical";

/// Specialties that encounter synthesis draws from directly.
const REQUIRED_SPECIALTIES: [&str; 5] = [
    FAMILY_MEDICINE,
    EMERGENCY_MEDICINE,
    INTERNAL_MEDICINE,
    RADIOLOGY,
    NURSING,
];

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    document: KnowledgeDocument,
    default_profile: EncounterProfile,
}

impl KnowledgeBase {
    /// Load the copy compiled into the crate.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded document itself is broken, which the crate's tests rule out.
    pub fn embedded() -> ChartResult<Self> {
        Self::from_yaml(EMBEDDED_KNOWLEDGE_BASE)
    }

    /// Read and parse a knowledge base file.
    ///
    /// # Errors
    ///
    /// Returns `ChartError::KnowledgeBaseRead` if the file cannot be read, otherwise the
    /// errors of [`KnowledgeBase::from_yaml`].
    pub fn from_path(path: &Path) -> ChartResult<Self> {
        let text = std::fs::read_to_string(path).map_err(ChartError::KnowledgeBaseRead)?;
        Self::from_yaml(&text)
    }

    /// Parse a knowledge base from YAML text.
    ///
    /// This uses `serde_path_to_error` to surface a best-effort "path" (e.g.
    /// `progressions[0].stages[2].encounter_type`) to the failing field when the YAML does
    /// not match the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError`] if:
    /// - the YAML does not match the schema (`KnowledgeBase`),
    /// - a keyword names an unknown template, the default outpatient profile is missing, a
    ///   demographic pool is empty, or a required provider specialty has no names
    ///   (`KnowledgeBaseInconsistent`).
    pub fn from_yaml(yaml_text: &str) -> ChartResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let document = match serde_path_to_error::deserialize::<_, KnowledgeDocument>(deserializer)
        {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>".to_string()
                } else {
                    path
                };
                return Err(ChartError::KnowledgeBase {
                    path,
                    message: source.to_string(),
                });
            }
        };

        let default_profile = validate(&document)?;
        Ok(Self {
            document,
            default_profile,
        })
    }

    /// Reference range for a lab test, preferring the entry for `sex`.
    pub fn lab_range(&self, key: &str, sex: Sex) -> Option<&LabRange> {
        let ranges = &self.document.lab_ranges;
        ranges
            .iter()
            .find(|r| r.key == key && r.sex == Some(sex))
            .or_else(|| ranges.iter().find(|r| r.key == key && r.sex.is_none()))
            .or_else(|| ranges.iter().find(|r| r.key == key))
    }

    /// RxNorm code for a medication name, case-insensitive.
    pub fn rxnorm_code(&self, medication_name: &str) -> Option<&str> {
        let needle = medication_name.trim();
        self.document
            .rxnorm_codes
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(needle))
            .map(|entry| entry.code.as_str())
    }

    /// Test keys making up a named panel.
    pub fn panel_tests(&self, panel_name: &str) -> Option<&[String]> {
        self.document
            .lab_panels
            .iter()
            .find(|p| p.name == panel_name)
            .map(|p| p.tests.as_slice())
    }

    /// Panel names drawn at a visit of the given key (`dm_followup`, `ed_abdominal`, ...).
    ///
    /// Unknown keys fall back to the annual physical set.
    pub fn panels_for_visit(&self, key: &str) -> &[String] {
        let panels = &self.document.panels_by_visit_kind;
        panels
            .get(key)
            .or_else(|| panels.get(DEFAULT_PANEL_KEY))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn vital_band(&self, acuity: Acuity) -> &VitalBand {
        let bands = &self.document.vital_bands;
        match acuity {
            Acuity::Stable => &bands.stable,
            Acuity::Mild => &bands.mild,
            Acuity::Febrile => &bands.febrile,
            Acuity::Septic => &bands.septic,
            Acuity::Shock => &bands.shock,
        }
    }

    /// Encounter profile for a visit kind, falling back to the PCP profile.
    pub fn encounter_profile(&self, kind: VisitKind) -> &EncounterProfile {
        self.document
            .encounter_profiles
            .get(&kind)
            .unwrap_or(&self.default_profile)
    }

    pub fn progression(&self, id: &str) -> Option<&Progression> {
        self.document.progressions.iter().find(|p| p.id == id)
    }

    pub fn progressions(&self) -> &[Progression] {
        &self.document.progressions
    }

    /// Templates whose keyword occurs in `text`.
    ///
    /// Keywords are scanned in document order and each template is returned at most once, at
    /// the position of its first matching keyword.
    pub fn matching_progressions(&self, text: &str) -> Vec<&Progression> {
        let text = text.to_lowercase();
        let mut matched: Vec<&Progression> = Vec::new();
        for entry in &self.document.progression_keywords {
            if !text.contains(&entry.keyword.to_lowercase()) {
                continue;
            }
            if matched.iter().any(|p| p.id == entry.template) {
                continue;
            }
            if let Some(progression) = self.progression(&entry.template) {
                matched.push(progression);
            }
        }
        matched
    }

    pub fn annual_variants(&self) -> &[AnnualVariant] {
        &self.document.annual_physical_variants
    }

    pub fn demographics(&self) -> &DemographicPools {
        &self.document.demographics
    }

    /// Provider names for a specialty, falling back to Internal Medicine.
    pub fn providers(&self, specialty: &str) -> &[String] {
        let pools = &self.document.providers;
        pools
            .iter()
            .find(|p| p.specialty == specialty)
            .or_else(|| pools.iter().find(|p| p.specialty == INTERNAL_MEDICINE))
            .map(|p| p.names.as_slice())
            .unwrap_or(&[])
    }

    /// Display name for a lab key ("bilirubin_total" -> "Bilirubin, Total").
    pub fn display_name(&self, key: &str) -> String {
        self.document
            .lab_display_names
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_uppercase())
    }

    /// Keyword list grouped by template id, in document order within each template.
    pub fn keywords_by_template(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for entry in &self.document.progression_keywords {
            grouped
                .entry(entry.template.as_str())
                .or_default()
                .push(entry.keyword.as_str());
        }
        grouped
    }
}

/// Check cross-table references and return the fallback encounter profile.
fn validate(document: &KnowledgeDocument) -> ChartResult<EncounterProfile> {
    let default_profile = document
        .encounter_profiles
        .get(&VisitKind::OutpatientPcp)
        .cloned()
        .ok_or_else(|| {
            ChartError::KnowledgeBaseInconsistent("missing encounter profile outpatient_pcp".into())
        })?;

    for entry in &document.progression_keywords {
        if !document.progressions.iter().any(|p| p.id == entry.template) {
            return Err(ChartError::KnowledgeBaseInconsistent(format!(
                "keyword {:?} references unknown template {:?}",
                entry.keyword, entry.template
            )));
        }
    }

    for panel in document.panels_by_visit_kind.values().flatten() {
        if !document.lab_panels.iter().any(|p| &p.name == panel) {
            return Err(ChartError::KnowledgeBaseInconsistent(format!(
                "visit panel list references unknown panel {panel:?}"
            )));
        }
    }

    let pools = &document.demographics;
    let named_pools = [
        ("first_names_female", &pools.first_names_female),
        ("first_names_male", &pools.first_names_male),
        ("last_names", &pools.last_names),
        ("races", &pools.races),
        ("ethnicities", &pools.ethnicities),
        ("insurance_plans", &pools.insurance_plans),
        ("hospitals", &pools.hospitals),
        ("family_history", &pools.family_history),
        ("contact_relations", &pools.contact_relations),
    ];
    if let Some((name, _)) = named_pools.iter().find(|(_, pool)| pool.is_empty()) {
        return Err(ChartError::KnowledgeBaseInconsistent(format!(
            "demographic pool {name} is empty"
        )));
    }
    if document.annual_physical_variants.is_empty() {
        return Err(ChartError::KnowledgeBaseInconsistent(
            "annual_physical_variants is empty".into(),
        ));
    }

    for specialty in REQUIRED_SPECIALTIES {
        let has_names = document
            .providers
            .iter()
            .any(|p| p.specialty == specialty && !p.names.is_empty());
        if !has_names {
            return Err(ChartError::KnowledgeBaseInconsistent(format!(
                "no providers listed for {specialty}"
            )));
        }
    }

    Ok(default_profile)
}
