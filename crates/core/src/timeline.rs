//! Timeline construction.
//!
//! Turns the patient's history and presenting diagnosis into a dated, strictly ordered list of
//! encounter events. Template stages supply the disease course, annual physicals fill the gaps
//! and the presenting encounter always comes last.

use crate::constants::{
    ANNUAL_JITTER_DAYS, ANNUAL_PROXIMITY_DAYS, DAYS_PER_MONTH, DAYS_PER_YEAR, DEFAULT_FILL_YEARS,
    CURRENT_ENCOUNTER_MAX_DAYS_AGO, STAGE_JITTER_DAYS,
};
use crate::knowledge::{
    DiagnosisSeed, ImagingDirective, KnowledgeBase, MedicationChangeSeed, MedicationSeed,
    ProgressionStage, ValueRange,
};
use crate::model::{ClinicalSetting, Sex, VisitKind};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Where a timeline event came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    /// A stage of the named progression template.
    Template(String),
    /// Gap-filling annual physical.
    Annual,
    /// The presenting encounter.
    Current,
}

impl EventSource {
    /// Lower-cased tag used by the panel selection rules.
    pub fn tag(&self) -> &str {
        match self {
            Self::Template(id) => id,
            Self::Annual => "annual",
            Self::Current => "current",
        }
    }
}

/// A dated state diff: one future encounter plus what changes at it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    pub date: NaiveDateTime,
    pub kind: VisitKind,
    pub reason: String,
    pub new_diagnoses: Vec<DiagnosisSeed>,
    pub new_medications: Vec<MedicationSeed>,
    pub medication_changes: Vec<MedicationChangeSeed>,
    pub lab_targets: BTreeMap<String, ValueRange>,
    pub gfr_target: Option<ValueRange>,
    pub bp_systolic: Option<ValueRange>,
    pub imaging: Option<ImagingDirective>,
    pub note_template: Option<String>,
    pub source: EventSource,
}

impl TimelineEvent {
    fn bare(date: NaiveDateTime, kind: VisitKind, reason: String, source: EventSource) -> Self {
        Self {
            date,
            kind,
            reason,
            new_diagnoses: Vec::new(),
            new_medications: Vec::new(),
            medication_changes: Vec::new(),
            lab_targets: BTreeMap::new(),
            gfr_target: None,
            bp_systolic: None,
            imaging: None,
            note_template: None,
            source,
        }
    }

    fn from_stage(stage: &ProgressionStage, date: NaiveDateTime, template_id: &str) -> Self {
        Self {
            date,
            kind: stage.encounter_type,
            reason: stage.reason.clone(),
            new_diagnoses: stage.new_diagnoses.clone(),
            new_medications: stage.new_medications.clone(),
            medication_changes: stage.medication_changes.clone(),
            lab_targets: stage.lab_targets.clone(),
            gfr_target: stage.gfr_target,
            bp_systolic: stage.vitals_bp_systolic,
            imaging: stage.imaging.clone(),
            note_template: stage.note_template.clone(),
            source: EventSource::Template(template_id.to_string()),
        }
    }

    pub fn is_current(&self) -> bool {
        self.source == EventSource::Current
    }

    /// Target range for a lab key, preferring the sex-specific `{key}_{sex}` entry.
    pub fn lab_target(&self, key: &str, sex: Sex) -> Option<ValueRange> {
        let sex_key = format!("{key}_{}", sex.key_suffix());
        self.lab_targets
            .get(&sex_key)
            .or_else(|| self.lab_targets.get(key))
            .copied()
    }
}

/// Inputs to [`build_timeline`].
#[derive(Debug, Clone)]
pub struct TimelineRequest<'a> {
    pub history_conditions: &'a [String],
    pub diagnosis: &'a str,
    pub setting: ClinicalSetting,
    /// Reason recorded on the presenting event.
    pub presenting_reason: &'a str,
    /// "Now"; every offset is measured from it.
    pub now: NaiveDateTime,
}

/// Build the ordered event list for one chart.
///
/// The returned list is strictly increasing by date and its last element is the presenting
/// encounter. Random draws happen in a fixed order: stage jitter, annual fill, the presenting
/// date, then hour and minute for every earlier event.
pub fn build_timeline<R: Rng + ?Sized>(
    kb: &KnowledgeBase,
    request: &TimelineRequest<'_>,
    rng: &mut R,
) -> Vec<TimelineEvent> {
    let now = request.now;
    let mut events: Vec<TimelineEvent> = Vec::new();

    let search_text = format!(
        "{} {}",
        request.history_conditions.join(" ").to_lowercase(),
        request.diagnosis.to_lowercase()
    );
    let matched = kb.matching_progressions(&search_text);
    for progression in &matched {
        for stage in &progression.stages {
            let offset_days = stage.year_offset * DAYS_PER_YEAR
                + stage.month_offset * DAYS_PER_MONTH
                + rng.gen_range(-STAGE_JITTER_DAYS..=STAGE_JITTER_DAYS);
            let date = now + Duration::days(offset_days);
            events.push(TimelineEvent::from_stage(stage, date, &progression.id));
        }
    }
    tracing::debug!(
        templates = ?matched.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        stage_events = events.len(),
        "matched progression templates"
    );

    let years_back = match events.iter().map(|e| e.date).min() {
        Some(earliest) => ((now - earliest).num_days() / DAYS_PER_YEAR).max(1),
        None => DEFAULT_FILL_YEARS,
    };
    for year in (1..=years_back).rev() {
        let jitter = rng.gen_range(-ANNUAL_JITTER_DAYS..=ANNUAL_JITTER_DAYS);
        let candidate = now - Duration::days(year * DAYS_PER_YEAR + jitter);
        let crowded = events
            .iter()
            .any(|e| (e.date - candidate).num_days().abs() < ANNUAL_PROXIMITY_DAYS);
        if crowded {
            continue;
        }
        if let Some(variant) = kb.annual_variants().choose(rng) {
            let mut event = TimelineEvent::bare(
                candidate,
                VisitKind::OutpatientPcp,
                variant.reason.clone(),
                EventSource::Annual,
            );
            event.note_template = Some(variant.note_template.clone());
            events.push(event);
        }
    }

    let current_kind = request.setting.visit_kind();
    let days_ago = rng.gen_range(1..=CURRENT_ENCOUNTER_MAX_DAYS_AGO);
    let current_date = with_clock_time(now - Duration::days(days_ago), current_kind, rng);
    let current = TimelineEvent::bare(
        current_date,
        current_kind,
        request.presenting_reason.to_string(),
        EventSource::Current,
    );

    for event in &mut events {
        event.date = with_clock_time(event.date, event.kind, rng);
    }

    let mut ordered = order_before(events, current.date);
    ordered.push(current);
    tracing::debug!(events = ordered.len(), "timeline built");
    ordered
}

/// Replace the time of day with a draw from the visit kind's opening hours.
fn with_clock_time<R: Rng + ?Sized>(
    date: NaiveDateTime,
    kind: VisitKind,
    rng: &mut R,
) -> NaiveDateTime {
    let (first_hour, last_hour) = kind.hour_range();
    let hour = rng.gen_range(first_hour..=last_hour);
    let minute = rng.gen_range(0..=59);
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    date.date().and_time(time)
}

/// Sort events ascending and make every date strictly earlier than `current` and strictly
/// later than its predecessor.
fn order_before(mut events: Vec<TimelineEvent>, current: NaiveDateTime) -> Vec<TimelineEvent> {
    let latest_allowed = current - Duration::days(1);
    for event in &mut events {
        if event.date >= current {
            event.date = latest_allowed;
        }
    }
    events.sort_by_key(|e| e.date);

    let mut previous: Option<NaiveDateTime> = None;
    for event in &mut events {
        if let Some(prev) = previous {
            if event.date <= prev {
                event.date = prev + Duration::minutes(1);
            }
        }
        previous = Some(event.date);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::chart_rng;
    use chrono::{NaiveDate, Timelike};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("valid date")
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::embedded().expect("knowledge base")
    }

    fn assert_strictly_ordered(events: &[TimelineEvent]) {
        for pair in events.windows(2) {
            assert!(
                pair[0].date < pair[1].date,
                "{} is not before {}",
                pair[0].date,
                pair[1].date
            );
        }
    }

    #[test]
    fn no_template_gives_three_annuals_and_current() {
        let kb = kb();
        let history: Vec<String> = Vec::new();
        let request = TimelineRequest {
            history_conditions: &history,
            diagnosis: "Appendicitis",
            setting: ClinicalSetting::Emergency,
            presenting_reason: "RLQ pain",
            now: now(),
        };
        let events = build_timeline(&kb, &request, &mut chart_rng(3));

        assert_eq!(events.len(), 4);
        assert!(events[..3].iter().all(|e| e.source == EventSource::Annual));
        let current = events.last().expect("current event");
        assert!(current.is_current());
        assert_eq!(current.kind, VisitKind::Ed);
        assert_eq!(current.reason, "RLQ pain");
        assert_strictly_ordered(&events);
    }

    #[test]
    fn matched_templates_expand_every_stage_once() {
        let kb = kb();
        let history = vec!["metabolic syndrome".to_string(), "GERD".to_string()];
        let request = TimelineRequest {
            history_conditions: &history,
            diagnosis: "Acute cholecystitis",
            setting: ClinicalSetting::Emergency,
            presenting_reason: "RUQ pain",
            now: now(),
        };
        let events = build_timeline(&kb, &request, &mut chart_rng(17));

        let from = |id: &str| {
            events
                .iter()
                .filter(|e| e.source == EventSource::Template(id.into()))
                .count()
        };
        assert_eq!(from("metabolic_syndrome"), 5);
        assert_eq!(from("cholelithiasis_to_cholecystitis"), 2);
        assert_eq!(events.iter().filter(|e| e.is_current()).count(), 1);
        assert!(events.last().expect("current").is_current());
        assert_strictly_ordered(&events);
    }

    #[test]
    fn prior_events_respect_clinic_hours() {
        let kb = kb();
        let history = vec!["hypertension".to_string()];
        let request = TimelineRequest {
            history_conditions: &history,
            diagnosis: "Pneumonia",
            setting: ClinicalSetting::Icu,
            presenting_reason: "Dyspnea",
            now: now(),
        };
        for seed in 0..20 {
            let events = build_timeline(&kb, &request, &mut chart_rng(seed));
            for event in &events {
                let (lo, hi) = event.kind.hour_range();
                assert!((lo..=hi).contains(&event.date.hour()), "{event:?}");
            }
            let current = events.last().expect("current");
            assert!(current.date < now());
            assert!(current.date >= now() - Duration::days(15));
        }
    }

    #[test]
    fn sex_specific_lab_target_wins() {
        let mut event = TimelineEvent::bare(now(), VisitKind::OutpatientPcp, "x".into(), EventSource::Annual);
        event
            .lab_targets
            .insert("creatinine_female".into(), ValueRange(0.7, 0.9));
        event
            .lab_targets
            .insert("creatinine".into(), ValueRange(1.0, 1.2));

        assert_eq!(
            event.lab_target("creatinine", Sex::Female),
            Some(ValueRange(0.7, 0.9))
        );
        assert_eq!(
            event.lab_target("creatinine", Sex::Male),
            Some(ValueRange(1.0, 1.2))
        );
        assert_eq!(event.lab_target("glucose", Sex::Male), None);
    }

    #[test]
    fn late_events_are_pulled_before_current_and_ties_split() {
        let current = now();
        let same = current - Duration::days(3);
        let events = vec![
            TimelineEvent::bare(current + Duration::days(2), VisitKind::OutpatientPcp, "a".into(), EventSource::Annual),
            TimelineEvent::bare(same, VisitKind::OutpatientPcp, "b".into(), EventSource::Annual),
            TimelineEvent::bare(same, VisitKind::OutpatientPcp, "c".into(), EventSource::Annual),
        ];
        let ordered = order_before(events, current);

        assert_eq!(ordered[0].date, same);
        assert_eq!(ordered[1].date, same + Duration::minutes(1));
        assert_eq!(ordered[2].date, current - Duration::days(1));
        assert_strictly_ordered(&ordered);
    }
}
