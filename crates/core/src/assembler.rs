//! Final chart assembly: history sections and generation metadata around the encounters.

use crate::knowledge::KnowledgeBase;
use crate::model::{
    Allergy, ClinicalVignette, EncounterRecord, GenerationMetadata, LongitudinalChart,
    Medication, MedicationList, ParsedVignette, PatientIdentity, SocialHistory,
    SurgicalProcedure,
};
use crate::narrative::ClinicalData;
use crate::state::StateTracker;
use chrono::{Datelike, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::Rng;

/// Everything the generator has produced once the last encounter is built.
pub struct ChartParts {
    pub patient: PatientIdentity,
    pub encounters: Vec<EncounterRecord>,
    pub state: StateTracker,
    pub inpatient_medications: Vec<Medication>,
    pub clinical_data: ClinicalData,
    pub surgical_history: Vec<SurgicalProcedure>,
    pub source_vignette: Option<ClinicalVignette>,
    pub parsed_vignette: ParsedVignette,
}

/// Who generated the chart, and when.
pub struct ChartProvenance<'a> {
    pub generator_version: &'a str,
    pub generated_at: NaiveDateTime,
    pub backend_name: &'a str,
    pub model_id: Option<&'a str>,
    pub seed: u64,
}

/// Fill in the history sections and metadata and return the finished chart.
///
/// Draws, in order: the family history sample (only when the backend gave none), then the
/// chart id.
pub fn assemble_chart<R: Rng + ?Sized>(
    kb: &KnowledgeBase,
    parts: ChartParts,
    provenance: &ChartProvenance<'_>,
    rng: &mut R,
) -> LongitudinalChart {
    let ChartParts {
        patient,
        encounters,
        state,
        inpatient_medications,
        clinical_data,
        surgical_history,
        source_vignette,
        parsed_vignette,
    } = parts;

    let mut allergies = safety_flag_allergies(&parsed_vignette.safety_flags_mentioned);
    merge_allergies(&mut allergies, clinical_data.allergies);

    let family_history = if clinical_data.family_history.is_empty() {
        sample_family_history(&kb.demographics().family_history, rng)
    } else {
        clinical_data.family_history
    };
    let social_history = clinical_data.social_history.unwrap_or_default();

    let chart_id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
    let (problem_list, home_medications, medication_history) = state.into_parts();

    LongitudinalChart {
        patient,
        encounter_history: encounters,
        problem_list,
        medication_history,
        current_medications: MedicationList {
            home_medications,
            inpatient_medications,
        },
        allergies,
        surgical_history,
        family_history,
        social_history,
        source_vignette,
        parsed_vignette: Some(parsed_vignette),
        generation_metadata: GenerationMetadata {
            chart_id,
            generator_version: provenance.generator_version.to_string(),
            generation_timestamp: provenance.generated_at,
            narrative_backend: provenance.backend_name.to_string(),
            model_id: provenance.model_id.map(str::to_string),
            seed: provenance.seed,
        },
    }
}

/// Allergies implied by safety flags such as "contrast allergy" or "shellfish allergy".
pub fn safety_flag_allergies(flags: &[String]) -> Vec<Allergy> {
    let mut allergies: Vec<Allergy> = Vec::new();
    for flag in flags {
        let lower = flag.to_lowercase();
        let (allergen, allergy_type, reaction, severity) =
            if lower.contains("contrast") || lower.contains("iodinated") {
                ("Iodinated contrast", "Drug", "Anaphylaxis/urticaria", "Severe")
            } else if lower.contains("gadolinium") {
                ("Gadolinium", "Drug", "Nephrogenic systemic fibrosis risk", "Severe")
            } else if lower.contains("shellfish") {
                ("Shellfish", "Food", "Allergic reaction", "Moderate")
            } else {
                continue;
            };
        if allergies.iter().any(|a| a.allergen == allergen) {
            continue;
        }
        allergies.push(Allergy {
            allergen: allergen.into(),
            allergy_type: allergy_type.into(),
            reaction: reaction.into(),
            severity: severity.into(),
        });
    }
    allergies
}

/// Append allergies whose allergen is not already listed (case-insensitive).
pub fn merge_allergies(allergies: &mut Vec<Allergy>, extra: Vec<Allergy>) {
    for allergy in extra {
        let known = allergies
            .iter()
            .any(|a| a.allergen.eq_ignore_ascii_case(&allergy.allergen));
        if !known {
            allergies.push(allergy);
        }
    }
}

/// Parse entries like "Cholecystectomy (2018)". Entries without a year get one 2 to 10 years
/// before `now`.
pub fn surgical_history<R: Rng + ?Sized>(
    entries: &[String],
    now: NaiveDateTime,
    rng: &mut R,
) -> Vec<SurgicalProcedure> {
    entries
        .iter()
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| match parenthesized_year(entry) {
            Some((procedure, year)) => SurgicalProcedure {
                procedure,
                year,
                notes: None,
            },
            None => SurgicalProcedure {
                procedure: entry.trim().to_string(),
                year: now.year() - rng.gen_range(2..=10),
                notes: None,
            },
        })
        .collect()
}

/// Split "name (YYYY) rest" into ("name rest", YYYY).
fn parenthesized_year(entry: &str) -> Option<(String, i32)> {
    let open = entry.find('(')?;
    let close = open + entry[open..].find(')')?;
    let inner = &entry[open + 1..close];
    if inner.len() != 4 || !inner.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = inner.parse().ok()?;
    let procedure = format!("{} {}", entry[..open].trim(), entry[close + 1..].trim());
    Some((procedure.trim().to_string(), year))
}

fn sample_family_history<R: Rng + ?Sized>(pool: &[String], rng: &mut R) -> Vec<String> {
    let count = rng.gen_range(2..=4).min(pool.len());
    pool.choose_multiple(rng, count).cloned().collect()
}
