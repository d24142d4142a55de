//! The presenting encounter, built in full detail.

use super::panels::{apply_panel_rules, core_panels, LabDraw, PanelContext};
use super::{
    encounter_id, history_summary, imaging_order_id, medication_summary, prior_visit_summary,
    provider, summarize_labs,
};
use crate::constants::{
    CRITICAL_CARE, DEFAULT_CHIEF_COMPLAINT, EMERGENCY_MEDICINE, INTERNAL_MEDICINE, NURSING,
    REASSESSMENT_BLEND, UNDOCUMENTED_DIAGNOSIS,
};
use crate::knowledge::{KnowledgeBase, ValueRange, VitalBand};
use crate::model::{
    Acuity, ClinicalNote, ClinicalSetting, Encounter, EncounterRecord, ImagingOrder,
    ImagingUrgency, Medication, NoteType, OrderStatus, ParsedVignette, PatientIdentity,
    ProblemListEntry, VitalSignSet, VitalSource,
};
use crate::narrative::{
    ClinicalData, DischargeContext, EncounterNarrativeContext, NarrativeBackend, ScenarioContext,
};
use crate::timeline::TimelineEvent;
use crate::values::{self, round1};
use crate::ChartResult;
use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use std::collections::BTreeMap;

/// Supplied vitals are accepted up to this fraction of the band width outside the band.
const VITAL_TOLERANCE: f64 = 0.5;

/// Encounter metadata that depends only on the care setting.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SettingProfile {
    encounter_type: &'static str,
    department: String,
    specialty: &'static str,
    disposition: &'static str,
}

fn setting_profile(setting: ClinicalSetting, setting_text: &str) -> SettingProfile {
    let named_or = |fallback: &str| {
        if setting_text.trim().is_empty() {
            fallback.to_string()
        } else {
            setting_text.trim().to_string()
        }
    };
    match setting {
        ClinicalSetting::Icu => SettingProfile {
            encounter_type: "Inpatient",
            department: named_or("Intensive Care Unit"),
            specialty: CRITICAL_CARE,
            disposition: "Admitted to ICU",
        },
        ClinicalSetting::Inpatient => SettingProfile {
            encounter_type: "Inpatient",
            department: "Medical Floor".into(),
            specialty: INTERNAL_MEDICINE,
            disposition: "Admitted to Medicine",
        },
        ClinicalSetting::UrgentCare => SettingProfile {
            encounter_type: "Urgent Care",
            department: "Urgent Care".into(),
            specialty: EMERGENCY_MEDICINE,
            disposition: "Discharged with follow-up",
        },
        ClinicalSetting::Emergency => SettingProfile {
            encounter_type: "ED",
            department: "Emergency Department".into(),
            specialty: EMERGENCY_MEDICINE,
            disposition: "Admitted to Medicine",
        },
        ClinicalSetting::Outpatient => SettingProfile {
            encounter_type: "Outpatient",
            department: named_or("Outpatient Clinic"),
            specialty: INTERNAL_MEDICINE,
            disposition: "Follow-up as needed",
        },
    }
}

/// The presenting event and the patient state accumulated from every earlier visit.
pub struct PresentingVisit<'a> {
    pub event: &'a TimelineEvent,
    pub parsed: &'a ParsedVignette,
    pub patient: &'a PatientIdentity,
    pub hospital: &'a str,
    pub problems: &'a [ProblemListEntry],
    pub medications: &'a [Medication],
    pub prior_encounter_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrentOptions {
    pub mask_diagnosis: bool,
    pub include_discharge_summary: bool,
}

/// Output of [`synthesize_current`].
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentEncounter {
    pub record: EncounterRecord,
    pub inpatient_medications: Vec<Medication>,
    pub clinical_data: ClinicalData,
}

/// Build the presenting encounter.
///
/// A blank or undocumented diagnosis is replaced by the chief complaint. Structured clinical
/// data is always requested with the true diagnosis. With
/// `mask_diagnosis`, every provider-facing note and the visit's diagnosis list see a
/// symptom-based working diagnosis instead.
///
/// # Errors
///
/// Returns `ChartError::Narrative` if the backend fails.
pub fn synthesize_current<R: Rng + ?Sized>(
    kb: &KnowledgeBase,
    backend: &dyn NarrativeBackend,
    visit: &PresentingVisit<'_>,
    options: CurrentOptions,
    rng: &mut R,
) -> ChartResult<CurrentEncounter> {
    let parsed = visit.parsed;
    let patient = visit.patient;
    let admitted = visit.event.date;
    let setting = parsed.setting();
    let profile = setting_profile(setting, &parsed.clinical_setting);

    let attending = provider(kb, profile.specialty, rng);
    let id = encounter_id(admitted, rng);

    let true_diagnosis = if parsed.diagnosis.trim().is_empty()
        || parsed.diagnosis == UNDOCUMENTED_DIAGNOSIS
    {
        non_empty_or(&parsed.chief_complaint, "Abdominal pain, etiology unknown").to_string()
    } else {
        parsed.diagnosis.clone()
    };
    let working_diagnosis = if options.mask_diagnosis {
        format!(
            "{}, etiology under evaluation",
            non_empty_or(&parsed.chief_complaint, DEFAULT_CHIEF_COMPLAINT)
        )
    } else {
        true_diagnosis.clone()
    };
    let chief_complaint = first_non_empty(&[&parsed.chief_complaint, &working_diagnosis]);

    let encounter = Encounter {
        encounter_id: id.clone(),
        encounter_type: profile.encounter_type.to_string(),
        facility: visit.hospital.to_string(),
        admission_datetime: admitted,
        discharge_datetime: None,
        attending_provider: attending.clone(),
        department: profile.department.clone(),
        chief_complaint: chief_complaint.clone(),
        disposition: Some(profile.disposition.to_string()),
    };

    let medical_history = history_summary(visit.problems);
    let medications = medication_summary(visit.medications);

    let scenario = ScenarioContext {
        diagnosis: true_diagnosis.clone(),
        age: patient.age,
        sex: patient.sex,
        history_summary: if parsed.history_conditions.is_empty() {
            medical_history.clone()
        } else {
            parsed.history_conditions.join(", ")
        },
        protocol_indication: non_empty_or(&parsed.chief_complaint, &true_diagnosis).to_string(),
    };
    let clinical_data = ClinicalData::from_json(&backend.generate_clinical_data(&scenario)?);

    let acuity = parsed
        .acuity
        .or(clinical_data.acuity)
        .unwrap_or(Acuity::Mild);
    let supplied_vitals = overlay(&clinical_data.vitals, &parsed.vitals_mentioned);
    let vital_signs = presenting_vitals(
        kb.vital_band(acuity),
        kb.vital_band(Acuity::Stable),
        &supplied_vitals,
        admitted,
        &id,
        rng,
    );

    let supplied_labs = overlay(&clinical_data.labs, &parsed.labs_mentioned);
    let draw = LabDraw {
        kb,
        sex: patient.sex,
        age: patient.age,
        supplied: &supplied_labs,
        timestamp: admitted + Duration::minutes(rng.gen_range(20..=45)),
        encounter_id: &id,
        ordering_provider: &attending,
    };
    let mut lab_results = core_panels(&draw, rng);
    apply_panel_rules(
        &mut lab_results,
        &draw,
        &PanelContext {
            acuity,
            setting,
            diagnosis: &true_diagnosis,
            history: &parsed.history_conditions,
        },
        rng,
    );

    let inpatient_medications: Vec<Medication> = clinical_data
        .inpatient_medications
        .iter()
        .map(|m| Medication {
            name: m.name.clone(),
            dose: m.dose.clone(),
            route: m.route.clone(),
            frequency: m.frequency.clone(),
            indication: m.indication.clone(),
            rxnorm_code: kb.rxnorm_code(m.name.as_str()).map(str::to_string),
        })
        .collect();

    let indication = non_empty_or(&parsed.chief_complaint, &working_diagnosis).to_string();
    let mut imaging_orders = Vec::new();
    if !parsed.ordered_study.trim().is_empty() {
        let order_time = admitted + Duration::hours(1) + Duration::minutes(rng.gen_range(0..=30));
        imaging_orders.push(ImagingOrder {
            order_id: imaging_order_id(order_time, rng),
            modality: option_or(&parsed.imaging_modality, "Imaging"),
            body_region: option_or(&parsed.imaging_body_region, "Abdomen"),
            contrast: option_or(&parsed.imaging_contrast, ""),
            indication: first_non_empty(&[&parsed.chief_complaint, &parsed.diagnosis]),
            ordering_provider: attending.clone(),
            order_datetime: order_time,
            urgency: if setting.is_acute() {
                ImagingUrgency::Urgent
            } else {
                ImagingUrgency::Routine
            },
            status: OrderStatus::Ordered,
        });
    }

    let triage = &vital_signs[0];
    let labs_summary = summarize_labs(&lab_results);
    let narrative = EncounterNarrativeContext {
        age: patient.age,
        sex: patient.sex,
        diagnosis: working_diagnosis.clone(),
        chief_complaint: chief_complaint.clone(),
        protocol_indication: indication.clone(),
        medical_history: medical_history.clone(),
        medications: medications.clone(),
        temperature: triage.temperature_f,
        heart_rate: triage.heart_rate,
        bp: triage.blood_pressure(),
        respiratory_rate: triage.respiratory_rate,
        spo2: triage.oxygen_saturation,
        pain: triage.pain_scale,
        labs_summary: labs_summary.clone(),
        physical_exam_findings: merge_exam_findings(
            parsed.exam_findings.as_deref(),
            &clinical_data.physical_exam_findings,
        ),
        imaging_ordered: non_empty_or(&parsed.ordered_study, "Imaging").to_string(),
        modality: option_or(&parsed.imaging_modality, "Imaging"),
        body_region: option_or(&parsed.imaging_body_region, "Abdomen"),
        contrast: option_or(&parsed.imaging_contrast, ""),
        indication,
        time_description: "4 hours post-admission".into(),
        prior_visit_summary: prior_visit_summary(visit.problems, visit.medications),
        has_prior_visits: visit.prior_encounter_count > 0,
    };

    let provider_note = |note_type: NoteType, note_text: String| ClinicalNote {
        note_type,
        encounter_id: id.clone(),
        timestamp: admitted,
        author: attending.clone(),
        note_text,
    };
    let mut clinical_notes = vec![
        provider_note(NoteType::Hpi, backend.generate_hpi(&narrative)?),
        provider_note(NoteType::PhysicalExam, backend.generate_physical_exam(&narrative)?),
        provider_note(
            NoteType::AssessmentPlan,
            backend.generate_assessment_plan(&narrative)?,
        ),
    ];
    for note_text in backend.generate_nursing_notes(&narrative)? {
        clinical_notes.push(ClinicalNote {
            note_type: NoteType::Nursing,
            encounter_id: id.clone(),
            timestamp: admitted + Duration::hours(4),
            author: provider(kb, NURSING, rng),
            note_text,
        });
    }

    let admitted_setting = matches!(setting, ClinicalSetting::Inpatient | ClinicalSetting::Icu);
    if options.include_discharge_summary && admitted_setting {
        let stay = kb.encounter_profile(setting.visit_kind()).duration_hours;
        let summary = backend.generate_discharge_summary(&DischargeContext {
            age: patient.age,
            sex: patient.sex,
            diagnosis: working_diagnosis.clone(),
            medical_history,
            clinical_summary: format!(
                "Presented with {chief_complaint}. {labs_summary}. Imaging: {}.",
                non_empty_or(&parsed.ordered_study, "none")
            ),
            discharge_meds: medications,
            follow_up: "Primary care follow-up in 1-2 weeks".into(),
        })?;
        clinical_notes.push(ClinicalNote {
            note_type: NoteType::DischargeSummary,
            encounter_id: id.clone(),
            timestamp: admitted + Duration::minutes((stay.midpoint() * 60.0).round() as i64),
            author: attending.clone(),
            note_text: summary,
        });
    }

    let mut diagnoses = vec![working_diagnosis];
    for condition in &clinical_data.additional_conditions {
        let name = condition.condition.as_str();
        let known = visit.problems.iter().any(|p| p.condition == name);
        if !known && !diagnoses.iter().any(|d| d == name) {
            diagnoses.push(name.to_string());
        }
    }

    tracing::debug!(
        encounter_id = %id,
        acuity = %acuity,
        panels = lab_results.len(),
        notes = clinical_notes.len(),
        "presenting encounter built"
    );

    Ok(CurrentEncounter {
        record: EncounterRecord {
            encounter,
            vital_signs,
            lab_results,
            imaging_orders,
            imaging_reports: Vec::new(),
            clinical_notes,
            diagnoses,
        },
        inpatient_medications,
        clinical_data,
    })
}

/// Triage vitals from the acuity band (supplied values kept when plausible), then a
/// reassessment four hours later drawn from the band moved toward stable.
fn presenting_vitals<R: Rng + ?Sized>(
    band: &VitalBand,
    stable: &VitalBand,
    supplied: &BTreeMap<String, f64>,
    admitted: NaiveDateTime,
    encounter_id: &str,
    rng: &mut R,
) -> Vec<VitalSignSet> {
    let triage_time = admitted + Duration::minutes(rng.gen_range(3..=15));
    let vital = |key: &str, range: ValueRange, rng: &mut R| {
        accept_or_sample(key, supplied.get(key).copied(), range, rng)
    };
    let triage = VitalSignSet {
        timestamp: triage_time,
        encounter_id: encounter_id.to_string(),
        temperature_f: vital("temperature_f", band.temperature_f, rng),
        heart_rate: whole(vital("heart_rate", band.heart_rate, rng)),
        blood_pressure_systolic: whole(vital(
            "blood_pressure_systolic",
            band.blood_pressure_systolic,
            rng,
        )),
        blood_pressure_diastolic: whole(vital(
            "blood_pressure_diastolic",
            band.blood_pressure_diastolic,
            rng,
        )),
        respiratory_rate: whole(vital("respiratory_rate", band.respiratory_rate, rng)),
        oxygen_saturation: vital("oxygen_saturation", band.oxygen_saturation, rng),
        pain_scale: whole(vital("pain_scale", band.pain_scale, rng)),
        source: VitalSource::Triage,
    };

    let toward_stable = |range: ValueRange, stable: ValueRange| {
        range.blend_toward(stable, REASSESSMENT_BLEND)
    };
    let reassessment_time =
        admitted + Duration::hours(4) + Duration::minutes(rng.gen_range(0..=30));
    let blended_int = |range: ValueRange, stable_range: ValueRange, rng: &mut R| {
        let blended = toward_stable(range, stable_range);
        whole(values::uniform(blended.low(), blended.high(), rng))
    };
    let temperature_f = values::value_in_band(band.temperature_f, rng);
    let heart_rate = blended_int(band.heart_rate, stable.heart_rate, rng);
    let blood_pressure_systolic =
        blended_int(band.blood_pressure_systolic, stable.blood_pressure_systolic, rng);
    let blood_pressure_diastolic =
        blended_int(band.blood_pressure_diastolic, stable.blood_pressure_diastolic, rng);
    let respiratory_rate = blended_int(band.respiratory_rate, stable.respiratory_rate, rng);
    let spo2_range = toward_stable(band.oxygen_saturation, stable.oxygen_saturation);
    let oxygen_saturation = round1(values::uniform(spo2_range.low(), spo2_range.high(), rng));
    let pain_scale = triage.pain_scale.saturating_sub(rng.gen_range(1..=3));

    let reassessment = VitalSignSet {
        timestamp: reassessment_time,
        encounter_id: encounter_id.to_string(),
        temperature_f,
        heart_rate,
        blood_pressure_systolic,
        blood_pressure_diastolic,
        respiratory_rate,
        oxygen_saturation,
        pain_scale,
        source: VitalSource::Nursing,
    };
    vec![triage, reassessment]
}

/// Keep a supplied vital within half a band-width of the band, otherwise sample the band.
fn accept_or_sample<R: Rng + ?Sized>(
    key: &str,
    supplied: Option<f64>,
    band: ValueRange,
    rng: &mut R,
) -> f64 {
    if let Some(value) = supplied {
        if band.widened(VITAL_TOLERANCE).contains(value) {
            return round1(value);
        }
        tracing::warn!(vital = key, value, "supplied vital out of range; sampling instead");
    }
    values::value_in_band(band, rng)
}

fn whole(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

/// `base` with every entry of `overrides` written over it.
fn overlay(base: &BTreeMap<String, f64>, overrides: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
    merged
}

/// Vignette exam findings first so the exam prompt sees them explicitly.
fn merge_exam_findings(vignette: Option<&str>, generated: &str) -> String {
    let vignette = vignette.unwrap_or_default().trim();
    let generated = generated.trim();
    match (vignette.is_empty(), generated.is_empty()) {
        (false, false) => format!("{vignette}. {generated}"),
        (false, true) => vignette.to_string(),
        _ => generated.to_string(),
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn first_non_empty(candidates: &[&str]) -> String {
    candidates
        .iter()
        .find(|c| !c.trim().is_empty())
        .map(|c| c.to_string())
        .unwrap_or_default()
}

fn option_or(value: &Option<String>, fallback: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(fallback)
        .to_string()
}
