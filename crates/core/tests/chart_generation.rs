use chrono::{NaiveDate, NaiveDateTime};
use longchart_core::knowledge::KnowledgeBase;
use longchart_core::model::{ClinicalSetting, NoteType, Sex};
use longchart_core::timeline::{build_timeline, EventSource, TimelineRequest};
use longchart_core::values::chart_rng;
use longchart_core::{
    ChartGenerator, ClinicalScenario, GeneratorConfig, LongitudinalChart, ParsedVignette,
    StubNarrativeBackend,
};
use std::collections::HashSet;
use std::sync::Arc;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 15)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid date")
}

fn cholecystitis_scenario(seed: u64) -> ClinicalScenario {
    ClinicalScenario {
        diagnosis: "Acute cholecystitis".into(),
        history_summary: "female, metabolic syndrome, GERD".into(),
        ordered_study: "RUQ ultrasound".into(),
        protocol_indication: "Acute cholecystitis".into(),
        age_hint: Some(52),
        sex_hint: Some(Sex::Female),
        seed: Some(seed),
        ..ClinicalScenario::default()
    }
}

fn generator(cfg: GeneratorConfig) -> ChartGenerator {
    ChartGenerator::builder(cfg)
        .narrative_backend(Arc::new(StubNarrativeBackend::new()))
        .build()
        .expect("generator should build")
}

fn generate(seed: u64) -> LongitudinalChart {
    generator(GeneratorConfig::new(now()))
        .generate_from_scenario(&cholecystitis_scenario(seed))
        .expect("chart should generate")
}

#[test]
fn same_seed_gives_identical_json() {
    let first = generate(42).to_json_pretty().expect("serialize");
    let second = generate(42).to_json_pretty().expect("serialize");
    assert_eq!(first, second);

    let other = generate(43).to_json_pretty().expect("serialize");
    assert_ne!(first, other);
}

#[test]
fn encounters_are_strictly_chronological_with_current_last() {
    for seed in [1, 7, 99] {
        let chart = generate(seed);
        let admissions: Vec<NaiveDateTime> = chart
            .encounter_history
            .iter()
            .map(|r| r.encounter.admission_datetime)
            .collect();
        assert!(
            admissions.windows(2).all(|w| w[0] < w[1]),
            "seed {seed}: admissions out of order: {admissions:?}"
        );

        let current = chart.current_encounter().expect("current encounter");
        assert_eq!(current.encounter.encounter_type, "ED");
        assert!(current.encounter.admission_datetime < now());
        assert!(current
            .clinical_notes
            .iter()
            .any(|n| n.note_type == NoteType::Hpi));
        assert!(chart
            .prior_encounters()
            .iter()
            .all(|r| r.clinical_notes.iter().all(|n| n.note_type != NoteType::Hpi)));
    }
}

#[test]
fn problem_list_and_medications_are_unique() {
    let chart = generate(5);
    let conditions: HashSet<&str> = chart
        .problem_list
        .iter()
        .map(|p| p.condition.as_str())
        .collect();
    assert_eq!(conditions.len(), chart.problem_list.len());

    let meds: HashSet<&str> = chart
        .current_medications
        .home_medications
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(meds.len(), chart.current_medications.home_medications.len());
}

#[test]
fn metabolic_history_reaches_problem_list() {
    let chart = generate(11);
    for expected in [
        "Type 2 Diabetes Mellitus",
        "Essential Hypertension",
        "Hyperlipidemia",
        "Obesity",
    ] {
        assert!(
            chart.problem_list.iter().any(|p| p.condition == expected),
            "missing {expected} in {:?}",
            chart.problem_list
        );
    }
    assert!(chart.patient.age == 52 && chart.patient.sex == Sex::Female);
    assert!(chart
        .medication_history
        .iter()
        .any(|c| c.medication.name == "Metformin"));
}

#[test]
fn timeline_combines_templates_and_annual_fill() {
    let kb = KnowledgeBase::embedded().expect("knowledge base");
    let history = vec![
        "female".to_string(),
        "metabolic syndrome".to_string(),
        "GERD".to_string(),
    ];
    let request = TimelineRequest {
        history_conditions: &history,
        diagnosis: "Acute cholecystitis",
        setting: ClinicalSetting::Emergency,
        presenting_reason: "Acute cholecystitis",
        now: now(),
    };

    let mut saw_annual = false;
    for seed in 0..20 {
        let events = build_timeline(&kb, &request, &mut chart_rng(seed));
        let templates: HashSet<&str> = events
            .iter()
            .filter_map(|e| match &e.source {
                EventSource::Template(id) => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert!(templates.contains("metabolic_syndrome"));
        assert!(templates.contains("cholelithiasis_to_cholecystitis"));

        let stage_events = events
            .iter()
            .filter(|e| matches!(e.source, EventSource::Template(_)))
            .count();
        assert!(stage_events >= 5, "seed {seed}: only {stage_events} stage events");
        assert_eq!(events.iter().filter(|e| e.is_current()).count(), 1);
        assert!(events.last().is_some_and(|e| e.is_current()));

        saw_annual |= events.iter().any(|e| e.source == EventSource::Annual);
    }
    assert!(saw_annual, "no seed produced an annual physical");
}

#[test]
fn masked_chart_keeps_true_diagnosis_out_of_current_notes() {
    let cfg = GeneratorConfig::new(now()).with_mask_diagnosis(true);
    let parsed = ParsedVignette {
        age: Some(52),
        sex: Some(Sex::Female),
        diagnosis: "Acute cholecystitis".into(),
        chief_complaint: "RUQ pain".into(),
        history_conditions: vec!["metabolic syndrome".into()],
        ordered_study: "RUQ ultrasound".into(),
        ..ParsedVignette::default()
    };
    let chart = generator(cfg)
        .generate_from_parsed(parsed, None, Some(8))
        .expect("chart should generate");

    let current = chart.current_encounter().expect("current encounter");
    assert_eq!(current.diagnoses[0], "RUQ pain, etiology under evaluation");
    for note in &current.clinical_notes {
        assert!(
            !note.note_text.to_lowercase().contains("acute cholecystitis"),
            "{:?} mentions the diagnosis",
            note.note_type
        );
    }
}

#[test]
fn metadata_records_backend_seed_and_time() {
    let chart = generate(21);
    let meta = &chart.generation_metadata;
    assert_eq!(meta.seed, 21);
    assert_eq!(meta.narrative_backend, "stub");
    assert_eq!(meta.generation_timestamp, now());
    assert!(meta.model_id.is_none());
    assert!(chart.source_vignette.is_some());
    assert!((2..=4).contains(&chart.family_history.len()));
}
