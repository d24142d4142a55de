//! Wire shapes of the knowledge base YAML document.
//!
//! Every table is `deny_unknown_fields` so a misspelt key fails the load with a field path
//! instead of silently falling back to a default.

use crate::model::{ChangeType, LabReference, Sex, VisitKind};
use longchart_types::NonEmptyText;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Inclusive `[low, high]` pair, written as a two-element sequence in YAML.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ValueRange(pub f64, pub f64);

impl ValueRange {
    pub fn low(self) -> f64 {
        self.0
    }

    pub fn high(self) -> f64 {
        self.1
    }

    pub fn width(self) -> f64 {
        self.1 - self.0
    }

    pub fn midpoint(self) -> f64 {
        (self.0 + self.1) / 2.0
    }

    /// Move both ends `fraction` of the way toward `other`.
    pub fn blend_toward(self, other: ValueRange, fraction: f64) -> ValueRange {
        ValueRange(
            self.0 + fraction * (other.0 - self.0),
            self.1 + fraction * (other.1 - self.1),
        )
    }

    /// This range widened by `fraction` of its width on each side.
    pub fn widened(self, fraction: f64) -> ValueRange {
        let pad = self.width() * fraction;
        ValueRange(self.0 - pad, self.1 + pad)
    }

    pub fn contains(self, value: f64) -> bool {
        value >= self.0 && value <= self.1
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabRange {
    pub key: String,
    #[serde(default)]
    pub sex: Option<Sex>,
    pub low: f64,
    pub high: f64,
    pub unit: String,
    #[serde(default)]
    pub critical_low: Option<f64>,
    #[serde(default)]
    pub critical_high: Option<f64>,
    #[serde(default)]
    pub loinc: Option<String>,
}

impl LabRange {
    pub fn reference(&self) -> LabReference {
        LabReference::new(self.low, self.high).with_critical(self.critical_low, self.critical_high)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RxNormEntry {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabPanelDefinition {
    pub name: String,
    pub tests: Vec<String>,
}

/// Sampling ranges for one acuity tier.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VitalBand {
    pub temperature_f: ValueRange,
    pub heart_rate: ValueRange,
    pub blood_pressure_systolic: ValueRange,
    pub blood_pressure_diastolic: ValueRange,
    pub respiratory_rate: ValueRange,
    pub oxygen_saturation: ValueRange,
    pub pain_scale: ValueRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VitalBands {
    pub stable: VitalBand,
    pub mild: VitalBand,
    pub febrile: VitalBand,
    pub septic: VitalBand,
    pub shock: VitalBand,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncounterProfile {
    /// Display type written onto the encounter ("Outpatient", "ED", ...).
    pub encounter_type: String,
    pub department: String,
    pub provider_specialty: String,
    pub duration_hours: ValueRange,
    pub vitals_count: usize,
    pub disposition: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressionKeyword {
    pub keyword: String,
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosisSeed {
    pub condition: NonEmptyText,
    #[serde(default)]
    pub icd10: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MedicationSeed {
    pub name: NonEmptyText,
    pub dose: String,
    pub route: String,
    pub frequency: String,
    #[serde(default)]
    pub indication: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MedicationChangeSeed {
    pub medication_name: NonEmptyText,
    pub change_type: ChangeType,
    #[serde(default)]
    pub new_dose: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Canned prior imaging study attached to a progression stage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagingDirective {
    pub modality: String,
    pub body_region: String,
    #[serde(default)]
    pub contrast: String,
    pub findings: String,
    pub impression: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressionStage {
    pub year_offset: i64,
    #[serde(default)]
    pub month_offset: i64,
    pub encounter_type: VisitKind,
    pub reason: String,
    #[serde(default)]
    pub new_diagnoses: Vec<DiagnosisSeed>,
    #[serde(default)]
    pub new_medications: Vec<MedicationSeed>,
    #[serde(default)]
    pub medication_changes: Vec<MedicationChangeSeed>,
    /// Lab key (optionally suffixed `_male`/`_female`) to target sub-range.
    #[serde(default)]
    pub lab_targets: BTreeMap<String, ValueRange>,
    #[serde(default)]
    pub gfr_target: Option<ValueRange>,
    #[serde(default)]
    pub vitals_bp_systolic: Option<ValueRange>,
    #[serde(default)]
    pub imaging: Option<ImagingDirective>,
    #[serde(default)]
    pub note_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Progression {
    pub id: String,
    pub timeline_years: u32,
    pub stages: Vec<ProgressionStage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnualVariant {
    pub reason: String,
    pub note_template: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemographicPools {
    pub first_names_female: Vec<String>,
    pub first_names_male: Vec<String>,
    pub last_names: Vec<String>,
    pub races: Vec<String>,
    pub ethnicities: Vec<String>,
    pub insurance_plans: Vec<String>,
    pub hospitals: Vec<String>,
    pub family_history: Vec<String>,
    pub contact_relations: Vec<String>,
}

impl DemographicPools {
    pub fn first_names(&self, sex: Sex) -> &[String] {
        match sex {
            Sex::Female => &self.first_names_female,
            Sex::Male => &self.first_names_male,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderPool {
    pub specialty: String,
    pub names: Vec<String>,
}

/// The whole document as written on disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct KnowledgeDocument {
    pub lab_ranges: Vec<LabRange>,
    pub rxnorm_codes: Vec<RxNormEntry>,
    pub lab_panels: Vec<LabPanelDefinition>,
    pub panels_by_visit_kind: BTreeMap<String, Vec<String>>,
    pub vital_bands: VitalBands,
    pub encounter_profiles: BTreeMap<VisitKind, EncounterProfile>,
    pub progression_keywords: Vec<ProgressionKeyword>,
    pub progressions: Vec<Progression>,
    pub annual_physical_variants: Vec<AnnualVariant>,
    pub demographics: DemographicPools,
    pub providers: Vec<ProviderPool>,
    #[serde(default)]
    pub lab_display_names: BTreeMap<String, String>,
}
