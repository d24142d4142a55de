//! Constants shared across timeline construction and encounter synthesis.

/// Knowledge base compiled into the crate and used unless an override path is configured.
pub const EMBEDDED_KNOWLEDGE_BASE: &str = include_str!("../knowledge/knowledge_base.yaml");

/// Version stamped into every chart's generation metadata.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DAYS_PER_YEAR: i64 = 365;
pub const DAYS_PER_MONTH: i64 = 30;

/// Stage events land within this many days either side of their nominal offset.
pub const STAGE_JITTER_DAYS: i64 = 30;
/// Annual fill events land within this many days either side of the anniversary.
pub const ANNUAL_JITTER_DAYS: i64 = 60;
/// An annual physical is skipped if any other event falls within this window.
pub const ANNUAL_PROXIMITY_DAYS: i64 = 60;
/// Years of annual physicals generated when no progression template matches.
pub const DEFAULT_FILL_YEARS: i64 = 3;
/// The presenting encounter happened between 1 and this many days before "now".
pub const CURRENT_ENCOUNTER_MAX_DAYS_AGO: i64 = 14;

/// Timelines spanning longer than this hand the patient over to a second PCP at the midpoint.
pub const PCP_ROTATION_SPAN_DAYS: i64 = 4 * DAYS_PER_YEAR;
/// Redraw attempts when two random picks from a pool must differ.
pub const MAX_DISTINCT_DRAW_ATTEMPTS: usize = 5;

pub const EGFR_TEST_NAME: &str = "eGFR";
pub const EGFR_UNIT: &str = "mL/min/1.73m2";
pub const EGFR_LOINC: &str = "33914-3";
pub const EGFR_REFERENCE_LOW: f64 = 90.0;
pub const EGFR_REFERENCE_HIGH: f64 = 120.0;
pub const CREATININE_KEY: &str = "creatinine";

pub const DEFAULT_CLINICAL_SETTING: &str = "ED";
pub const DEFAULT_CHIEF_COMPLAINT: &str = "Abdominal pain";
pub const UNDOCUMENTED_DIAGNOSIS: &str = "(Not documented)";
pub const NO_PMH: &str = "No significant PMH";

/// Fraction by which reassessment vital ranges move toward the stable band.
pub const REASSESSMENT_BLEND: f64 = 0.3;
/// Probability that a diabetic patient has an HbA1c drawn at the presenting encounter.
pub const HBA1C_ORDER_PROBABILITY: f64 = 0.6;

pub const FAMILY_MEDICINE: &str = "Family Medicine";
pub const EMERGENCY_MEDICINE: &str = "Emergency Medicine";
pub const INTERNAL_MEDICINE: &str = "Internal Medicine";
pub const CRITICAL_CARE: &str = "Critical Care";
pub const RADIOLOGY: &str = "Radiology";
pub const NURSING: &str = "Nursing";
