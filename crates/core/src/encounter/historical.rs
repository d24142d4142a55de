//! Historical encounters, built from timeline templates.

use super::{
    encounter_id, history_summary, imaging_order_id, medication_summary, provider, summarize_labs,
};
use crate::constants::{
    CREATININE_KEY, EGFR_LOINC, EGFR_REFERENCE_HIGH, EGFR_REFERENCE_LOW, EGFR_TEST_NAME,
    EGFR_UNIT, EMERGENCY_MEDICINE, RADIOLOGY,
};
use crate::knowledge::{ImagingDirective, KnowledgeBase, VitalBand};
use crate::model::{
    Acuity, ClinicalNote, Encounter, EncounterRecord, ImagingOrder, ImagingReport,
    ImagingUrgency, LabPanel, LabReference, LabResult, Medication, NoteType, OrderStatus,
    PatientIdentity, ProblemListEntry, ReportSections, VisitKind, VitalSignSet, VitalSource,
};
use crate::narrative::{NarrativeBackend, RadiologyContext, VisitNoteContext};
use crate::timeline::TimelineEvent;
use crate::values::{self, round1, round2, uniform, uniform_int};
use crate::ChartResult;
use chrono::{Duration, NaiveDateTime};
use rand::Rng;

/// Minutes between consecutive vital-sign sets at one visit.
const VITALS_INTERVAL_MINUTES: i64 = 240;

/// Which panel set a historical visit draws, first match wins.
///
/// Each rule lists substrings of the event source tag and of the lower-cased visit reason.
const PANEL_RULES: &[PanelRule] = &[
    PanelRule::new("dm_followup", &["dm", "metabolic"], &["diabetes"]),
    PanelRule::new("ckd_followup", &["ckd"], &["kidney"]),
    PanelRule::new("thyroid_followup", &["thyroid"], &[]),
    PanelRule::new("hep_followup", &["hepat", "liver", "nafld"], &[]),
    PanelRule::new("cardiology_clinic", &["cad", "chf"], &["cardiac"]),
    PanelRule::new("ed_dvt_pe", &["dvt", "pe_history"], &[]),
    PanelRule::new("rheumatology_clinic", &["lupus"], &["sle"]),
    PanelRule::new("pulmonology_clinic", &["asthma", "osa", "copd"], &[]),
    PanelRule::new("gi_clinic", &["ibs", "divertic"], &["gi"]),
    PanelRule::new("iron_studies", &["iron_deficiency", "anemia"], &[]),
    PanelRule::new("urology_clinic", &["gout"], &[]),
    PanelRule::new("neurology_clinic", &["migraine"], &["neuro"]),
];

struct PanelRule {
    visit_key: &'static str,
    source_cues: &'static [&'static str],
    reason_cues: &'static [&'static str],
}

impl PanelRule {
    const fn new(
        visit_key: &'static str,
        source_cues: &'static [&'static str],
        reason_cues: &'static [&'static str],
    ) -> Self {
        Self {
            visit_key,
            source_cues,
            reason_cues,
        }
    }

    fn matches(&self, source: &str, reason: &str) -> bool {
        self.source_cues.iter().any(|cue| source.contains(cue))
            || self.reason_cues.iter().any(|cue| reason.contains(cue))
    }
}

/// Panel set key for a historical event.
pub(crate) fn panel_key(event: &TimelineEvent) -> &'static str {
    if event.kind == VisitKind::Ed {
        return "ed_abdominal";
    }
    let source = event.source.tag().to_lowercase();
    let reason = event.reason.to_lowercase();
    PANEL_RULES
        .iter()
        .find(|rule| rule.matches(&source, &reason))
        .map(|rule| rule.visit_key)
        .unwrap_or(crate::knowledge::DEFAULT_PANEL_KEY)
}

/// One past visit and the patient state as it stood before it.
pub struct HistoricalVisit<'a> {
    pub event: &'a TimelineEvent,
    pub patient: &'a PatientIdentity,
    pub hospital: &'a str,
    pub pcp: &'a str,
    pub problems: &'a [ProblemListEntry],
    pub medications: &'a [Medication],
}

/// Build the record for a past visit.
///
/// # Arguments
///
/// * `kb` - Knowledge base for profiles, panels and reference ranges.
/// * `backend` - Writes the visit note, and the imaging report when `narrate_imaging` is set.
/// * `visit` - The event with its provider context.
/// * `narrate_imaging` - Request imaging reports from the backend instead of canned text.
/// * `rng` - The chart's random source.
///
/// # Errors
///
/// Returns `ChartError::Narrative` if the backend fails.
pub fn synthesize_historical<R: Rng + ?Sized>(
    kb: &KnowledgeBase,
    backend: &dyn NarrativeBackend,
    visit: &HistoricalVisit<'_>,
    narrate_imaging: bool,
    rng: &mut R,
) -> ChartResult<EncounterRecord> {
    let event = visit.event;
    let patient = visit.patient;
    let date = event.date;
    let profile = kb.encounter_profile(event.kind);

    let attending = match event.kind {
        VisitKind::OutpatientPcp => visit.pcp.to_string(),
        VisitKind::Ed => provider(kb, EMERGENCY_MEDICINE, rng),
        _ => provider(kb, &profile.provider_specialty, rng),
    };
    let id = encounter_id(date, rng);
    let duration_hours = round2(uniform(
        profile.duration_hours.low(),
        profile.duration_hours.high(),
        rng,
    ));
    let discharge = date + Duration::seconds((duration_hours * 3600.0).round() as i64);

    let encounter = Encounter {
        encounter_id: id.clone(),
        encounter_type: profile.encounter_type.clone(),
        facility: visit.hospital.to_string(),
        admission_datetime: date,
        discharge_datetime: Some(discharge),
        attending_provider: attending.clone(),
        department: profile.department.clone(),
        chief_complaint: event.reason.clone(),
        disposition: Some(profile.disposition.clone()),
    };

    let acuity = if event.kind.is_outpatient() {
        Acuity::Stable
    } else {
        Acuity::Mild
    };
    let band = kb.vital_band(acuity);
    let vital_signs: Vec<VitalSignSet> = (0..profile.vitals_count)
        .map(|index| {
            let taken_at = date + Duration::minutes(5 + index as i64 * VITALS_INTERVAL_MINUTES);
            let source = if index == 0 {
                VitalSource::Triage
            } else {
                VitalSource::Nursing
            };
            routine_vitals(band, event, &id, taken_at, source, rng)
        })
        .collect();

    let lab_results = prior_labs(kb, event, patient, &id, &attending, rng);

    let (imaging_orders, imaging_reports) = match &event.imaging {
        Some(directive) => {
            let (order, report) = prior_imaging(
                kb,
                backend,
                directive,
                event,
                patient,
                &attending,
                narrate_imaging,
                rng,
            )?;
            (vec![order], vec![report])
        }
        None => (Vec::new(), Vec::new()),
    };

    let (bp, heart_rate) = vital_signs
        .first()
        .map(|v| (v.blood_pressure(), v.heart_rate))
        .unwrap_or_else(|| ("120/80".to_string(), 80));
    let mut note_context = VisitNoteContext {
        age: patient.age,
        sex: patient.sex,
        reason: event.reason.clone(),
        medical_history: history_summary(visit.problems),
        medications: medication_summary(visit.medications),
        bp,
        heart_rate,
        labs_summary: summarize_labs(&lab_results),
        assessment: event
            .note_template
            .clone()
            .unwrap_or_else(|| "Stable.".to_string()),
        referring_provider: None,
    };
    let (note_type, note_text) = if event.kind.is_specialist_outpatient() {
        note_context.referring_provider = Some(visit.pcp.to_string());
        (
            NoteType::Consultation,
            backend.generate_consultation_note(&note_context)?,
        )
    } else if event.kind == VisitKind::Ed {
        (NoteType::EdNote, backend.generate_office_visit_note(&note_context)?)
    } else {
        (
            NoteType::OfficeVisit,
            backend.generate_office_visit_note(&note_context)?,
        )
    };
    let clinical_notes = vec![ClinicalNote {
        note_type,
        encounter_id: id.clone(),
        timestamp: date,
        author: attending,
        note_text,
    }];

    let mut diagnoses: Vec<String> = event
        .new_diagnoses
        .iter()
        .map(|d| d.condition.to_string())
        .collect();
    if !event.reason.is_empty() {
        diagnoses.push(event.reason.clone());
    }

    Ok(EncounterRecord {
        encounter,
        vital_signs,
        lab_results,
        imaging_orders,
        imaging_reports,
        clinical_notes,
        diagnoses,
    })
}

/// Uniform draws across the band; a stage systolic override replaces the band's systolic range.
fn routine_vitals<R: Rng + ?Sized>(
    band: &VitalBand,
    event: &TimelineEvent,
    encounter_id: &str,
    timestamp: NaiveDateTime,
    source: VitalSource,
    rng: &mut R,
) -> VitalSignSet {
    let systolic = event.bp_systolic.unwrap_or(band.blood_pressure_systolic);
    VitalSignSet {
        timestamp,
        encounter_id: encounter_id.to_string(),
        temperature_f: round1(uniform(
            band.temperature_f.low(),
            band.temperature_f.high(),
            rng,
        )),
        heart_rate: uniform_int(band.heart_rate, rng),
        blood_pressure_systolic: uniform_int(systolic, rng),
        blood_pressure_diastolic: uniform_int(band.blood_pressure_diastolic, rng),
        respiratory_rate: uniform_int(band.respiratory_rate, rng),
        oxygen_saturation: round1(uniform(
            band.oxygen_saturation.low(),
            band.oxygen_saturation.high(),
            rng,
        )),
        pain_scale: uniform_int(band.pain_scale, rng),
        source,
    }
}

/// Panels for a past visit. Stage targets steer values; everything else is a normal draw.
fn prior_labs<R: Rng + ?Sized>(
    kb: &KnowledgeBase,
    event: &TimelineEvent,
    patient: &PatientIdentity,
    encounter_id: &str,
    ordering_provider: &str,
    rng: &mut R,
) -> Vec<LabPanel> {
    let draw_time = event.date + Duration::minutes(rng.gen_range(10..=30));
    let mut panels = Vec::new();

    for panel_name in kb.panels_for_visit(panel_key(event)) {
        let tests = kb.panel_tests(panel_name).unwrap_or(&[]);
        let mut results = Vec::new();
        let mut creatinine = None;
        for key in tests {
            let Some(range) = kb.lab_range(key, patient.sex) else {
                continue;
            };
            let reference = range.reference();
            let value = match event.lab_target(key, patient.sex) {
                Some(target) => values::value_in_target_range(target.low(), target.high(), rng),
                None => values::value_in_range(&reference, rng),
            };
            if key == CREATININE_KEY {
                creatinine = Some(value);
            }
            results.push(LabResult::new(
                kb.display_name(key),
                value,
                range.unit.clone(),
                reference,
                range.loinc.clone(),
            ));
        }

        if let Some(creatinine) = creatinine.filter(|cr| *cr > 0.0) {
            let gfr = match event.gfr_target {
                Some(target) => values::value_in_target_range(target.low(), target.high(), rng),
                None => values::estimated_gfr(creatinine, patient.age, patient.sex),
            };
            results.push(LabResult::new(
                EGFR_TEST_NAME,
                gfr,
                EGFR_UNIT,
                LabReference::new(EGFR_REFERENCE_LOW, EGFR_REFERENCE_HIGH),
                Some(EGFR_LOINC.to_string()),
            ));
        }

        if !results.is_empty() {
            panels.push(LabPanel {
                panel_name: panel_name.clone(),
                timestamp: draw_time,
                encounter_id: encounter_id.to_string(),
                results,
                ordering_provider: ordering_provider.to_string(),
            });
        }
    }
    panels
}

/// Completed study for a stage imaging directive: order at +1 h, report at +3 h.
#[allow(clippy::too_many_arguments)]
fn prior_imaging<R: Rng + ?Sized>(
    kb: &KnowledgeBase,
    backend: &dyn NarrativeBackend,
    directive: &ImagingDirective,
    event: &TimelineEvent,
    patient: &PatientIdentity,
    ordering_provider: &str,
    narrate: bool,
    rng: &mut R,
) -> ChartResult<(ImagingOrder, ImagingReport)> {
    let order_time = event.date + Duration::hours(1);
    let order_id = imaging_order_id(order_time, rng);
    let order = ImagingOrder {
        order_id: order_id.clone(),
        modality: directive.modality.clone(),
        body_region: directive.body_region.clone(),
        contrast: directive.contrast.clone(),
        indication: event.reason.clone(),
        ordering_provider: ordering_provider.to_string(),
        order_datetime: order_time,
        urgency: ImagingUrgency::Routine,
        status: OrderStatus::Completed,
    };

    let canned = ReportSections {
        technique: canned_technique(directive),
        findings: directive.findings.clone(),
        impression: directive.impression.clone(),
    };
    let sections = if narrate {
        let text = backend.generate_radiology_report(&RadiologyContext {
            modality: directive.modality.clone(),
            body_region: directive.body_region.clone(),
            contrast: directive.contrast.clone(),
            age: patient.age,
            sex: patient.sex,
            indication: event.reason.clone(),
            diagnosis: event.reason.clone(),
            expected_findings: Some(directive.findings.clone()),
        })?;
        let parsed = ReportSections::parse(&text);
        ReportSections {
            technique: non_empty_or(parsed.technique, canned.technique),
            findings: non_empty_or(parsed.findings, canned.findings),
            impression: non_empty_or(parsed.impression, canned.impression),
        }
    } else {
        canned
    };

    let report = ImagingReport {
        order_id,
        modality: format!("{} {}", directive.modality, directive.body_region),
        report_datetime: order_time + Duration::hours(2),
        radiologist: provider(kb, RADIOLOGY, rng),
        technique: sections.technique,
        findings: sections.findings,
        impression: sections.impression,
    };
    Ok((order, report))
}

fn canned_technique(directive: &ImagingDirective) -> String {
    let region = directive.body_region.to_lowercase();
    if directive.contrast.trim().is_empty() {
        format!("{} of the {region} was performed.", directive.modality)
    } else {
        format!(
            "{} of the {region} was performed {}.",
            directive.modality, directive.contrast
        )
    }
}

fn non_empty_or(value: String, fallback: String) -> String {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demographics::generate_identity;
    use crate::model::{ClinicalSetting, Sex};
    use crate::narrative::StubNarrativeBackend;
    use crate::timeline::{build_timeline, EventSource, TimelineRequest};
    use crate::values::chart_rng;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date")
    }

    fn timeline(kb: &KnowledgeBase, history: &[String], diagnosis: &str) -> Vec<TimelineEvent> {
        let request = TimelineRequest {
            history_conditions: history,
            diagnosis,
            setting: ClinicalSetting::Emergency,
            presenting_reason: "Abdominal pain",
            now: now(),
        };
        build_timeline(kb, &request, &mut chart_rng(5))
    }

    fn patient(kb: &KnowledgeBase) -> PatientIdentity {
        generate_identity(kb, Some(Sex::Female), Some(52), now(), &mut chart_rng(5))
    }

    #[test]
    fn panel_rules_follow_source_and_reason() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let events = timeline(&kb, &["metabolic syndrome".to_string()], "");
        let stage = events
            .iter()
            .find(|e| e.source == EventSource::Template("metabolic_syndrome".into()))
            .expect("metabolic stage");
        assert_eq!(panel_key(stage), "dm_followup");

        let annual = events
            .iter()
            .find(|e| e.source == EventSource::Annual)
            .cloned()
            .unwrap_or_else(|| TimelineEvent {
                source: EventSource::Annual,
                reason: "Annual physical exam".into(),
                kind: VisitKind::OutpatientPcp,
                ..stage.clone()
            });
        assert_eq!(panel_key(&annual), "annual_physical");

        let ed = TimelineEvent {
            kind: VisitKind::Ed,
            ..stage.clone()
        };
        assert_eq!(panel_key(&ed), "ed_abdominal");
    }

    #[test]
    fn historical_record_is_self_consistent() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let backend = StubNarrativeBackend::new();
        let patient = patient(&kb);
        let events = timeline(&kb, &["metabolic syndrome".to_string()], "");
        let mut rng = chart_rng(9);

        for event in events.iter().filter(|e| !e.is_current()) {
            let visit = HistoricalVisit {
                event,
                patient: &patient,
                hospital: "Memorial General Hospital",
                pcp: "Dr. Steven Brown",
                problems: &[],
                medications: &[],
            };
            let record = synthesize_historical(&kb, &backend, &visit, false, &mut rng)
                .expect("historical record");

            let id = &record.encounter.encounter_id;
            assert!(id.starts_with(&format!("ENC-{}-", event.date.format("%Y%m%d"))));
            assert_eq!(record.encounter.admission_datetime, event.date);
            assert_eq!(
                record.vital_signs.len(),
                kb.encounter_profile(event.kind).vitals_count
            );
            assert_eq!(record.vital_signs[0].source, VitalSource::Triage);
            assert!(record.lab_results.iter().all(|p| &p.encounter_id == id));
            assert_eq!(record.clinical_notes.len(), 1);
            assert!(record.diagnoses.contains(&event.reason));
            if event.kind == VisitKind::OutpatientPcp {
                assert_eq!(record.encounter.attending_provider, "Dr. Steven Brown");
                assert_eq!(record.clinical_notes[0].note_type, NoteType::OfficeVisit);
            }
            if event.kind.is_specialist_outpatient() {
                assert_eq!(record.clinical_notes[0].note_type, NoteType::Consultation);
            }
        }
    }

    #[test]
    fn creatinine_panels_carry_egfr_and_targets_apply() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let patient = patient(&kb);
        let events = timeline(&kb, &["metabolic syndrome".to_string()], "");
        let mut event = events[0].clone();
        event.lab_targets.insert(
            "glucose".into(),
            crate::knowledge::ValueRange(180.0, 220.0),
        );
        event.gfr_target = Some(crate::knowledge::ValueRange(40.0, 45.0));

        let panels = prior_labs(&kb, &event, &patient, "ENC-1", "Dr. A", &mut chart_rng(1));
        let chemistry = panels
            .iter()
            .find(|p| p.result("Creatinine").is_some())
            .expect("a panel with creatinine");
        let gfr = chemistry.result("eGFR").expect("egfr");
        assert!((40.0..=45.0).contains(&gfr.value()));
        let glucose = chemistry.result("Glucose").expect("glucose");
        assert!((180.0..=220.0).contains(&glucose.value()));
        assert!(glucose.flag().is_some());
    }

    #[test]
    fn narrated_imaging_falls_back_to_canned_sections() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let patient = patient(&kb);
        let events = timeline(&kb, &[], "");
        let directive = ImagingDirective {
            modality: "Ultrasound".into(),
            body_region: "Abdomen".into(),
            contrast: String::new(),
            findings: "Multiple gallstones without wall thickening.".into(),
            impression: "Cholelithiasis.".into(),
        };

        let (order, report) = prior_imaging(
            &kb,
            &StubNarrativeBackend::new(),
            &directive,
            &events[0],
            &patient,
            "Dr. A",
            true,
            &mut chart_rng(2),
        )
        .expect("imaging");

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(report.report_datetime, order.order_datetime + Duration::hours(2));
        assert_eq!(report.findings, "Multiple gallstones without wall thickening.");
        assert!(!report.impression.is_empty());
        assert_eq!(
            canned_technique(&directive),
            "Ultrasound of the abdomen was performed."
        );
    }
}
