//! Encounter synthesis.
//!
//! Historical events become compact template-driven records; the presenting event becomes a
//! fully detailed record with backend-written notes. Both modes share the care team, id
//! formats and the summary strings handed to note prompts.

mod current;
mod historical;
mod panels;

pub use current::{synthesize_current, CurrentEncounter, CurrentOptions, PresentingVisit};
pub use historical::{synthesize_historical, HistoricalVisit};

use crate::constants::{
    FAMILY_MEDICINE, MAX_DISTINCT_DRAW_ATTEMPTS, NO_PMH, PCP_ROTATION_SPAN_DAYS,
};
use crate::knowledge::KnowledgeBase;
use crate::model::{LabPanel, Medication, ProblemListEntry, VisitKind};
use crate::timeline::TimelineEvent;
use crate::values::pick;
use chrono::{Duration, NaiveDateTime};
use rand::Rng;

/// Hospitals and primary care physicians that stay fixed for the whole chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareTeam {
    pub primary_hospital: String,
    pub specialist_hospital: String,
    pub pcp: String,
    /// Second PCP who takes over at the timeline midpoint on long timelines.
    pub secondary_pcp: Option<(String, NaiveDateTime)>,
}

impl CareTeam {
    /// Draw the hospitals and PCPs for a timeline.
    ///
    /// The specialist hospital and secondary PCP are redrawn a few times to differ from their
    /// primary counterparts; a single-entry pool leaves them equal.
    pub fn assemble<R: Rng + ?Sized>(
        kb: &KnowledgeBase,
        events: &[TimelineEvent],
        rng: &mut R,
    ) -> Self {
        let hospitals = &kb.demographics().hospitals;
        let primary_hospital = pick(hospitals, rng).unwrap_or_default().to_string();
        let specialist_hospital = pick_distinct(hospitals, &primary_hospital, rng);

        let pcps = kb.providers(FAMILY_MEDICINE);
        let pcp = pick(pcps, rng).unwrap_or_default().to_string();

        let first = events.iter().map(|e| e.date).min();
        let last = events.iter().map(|e| e.date).max();
        let secondary_pcp = match (first, last) {
            (Some(first), Some(last)) if (last - first).num_days() > PCP_ROTATION_SPAN_DAYS => {
                let span_days = (last - first).num_days();
                let successor = pick_distinct(pcps, &pcp, rng);
                Some((successor, first + Duration::days(span_days / 2)))
            }
            _ => None,
        };

        Self {
            primary_hospital,
            specialist_hospital,
            pcp,
            secondary_pcp,
        }
    }

    /// The PCP responsible for the patient on `date`.
    pub fn pcp_on(&self, date: NaiveDateTime) -> &str {
        match &self.secondary_pcp {
            Some((successor, switch_date)) if date > *switch_date => successor,
            _ => &self.pcp,
        }
    }

    /// Specialist outpatient visits happen at the specialist hospital, everything else at the
    /// primary one.
    pub fn hospital_for(&self, kind: VisitKind) -> &str {
        if kind.is_specialist_outpatient() {
            &self.specialist_hospital
        } else {
            &self.primary_hospital
        }
    }
}

fn pick_distinct<R: Rng + ?Sized>(pool: &[String], avoid: &str, rng: &mut R) -> String {
    let mut drawn = pick(pool, rng).unwrap_or_default();
    let mut attempts = 0;
    while drawn == avoid && attempts < MAX_DISTINCT_DRAW_ATTEMPTS {
        drawn = pick(pool, rng).unwrap_or_default();
        attempts += 1;
    }
    drawn.to_string()
}

/// Random provider name from a specialty pool.
pub(crate) fn provider<R: Rng + ?Sized>(kb: &KnowledgeBase, specialty: &str, rng: &mut R) -> String {
    pick(kb.providers(specialty), rng)
        .unwrap_or(specialty)
        .to_string()
}

/// `ENC-YYYYMMDD-NNN`.
pub fn encounter_id<R: Rng + ?Sized>(date: NaiveDateTime, rng: &mut R) -> String {
    format!("ENC-{}-{}", date.format("%Y%m%d"), rng.gen_range(100..=999))
}

/// `IMG-YYYYMMDD-NNN`.
pub fn imaging_order_id<R: Rng + ?Sized>(date: NaiveDateTime, rng: &mut R) -> String {
    format!("IMG-{}-{}", date.format("%Y%m%d"), rng.gen_range(100..=999))
}

/// One-line lab summary for note prompts, listing abnormal results only.
pub fn summarize_labs(panels: &[LabPanel]) -> String {
    if panels.is_empty() {
        return "No labs available".into();
    }
    let abnormal: Vec<String> = panels
        .iter()
        .flat_map(|panel| panel.results.iter())
        .filter_map(|result| {
            result.flag().map(|flag| {
                format!("{} {} ({})", result.test_name(), result.value(), flag.as_str())
            })
        })
        .collect();
    if abnormal.is_empty() {
        "Labs within normal limits".into()
    } else {
        format!("Abnormal: {}", abnormal.join(", "))
    }
}

/// Bullet list of known problems with their diagnosis month, plus current medications.
pub fn prior_visit_summary(problems: &[ProblemListEntry], medications: &[Medication]) -> String {
    if problems.is_empty() {
        return "No prior visits on record.".into();
    }
    let mut lines: Vec<String> = problems
        .iter()
        .map(|p| format!("- {} (diagnosed {})", p.condition, p.date_added.format("%B %Y")))
        .collect();
    if !medications.is_empty() {
        lines.push(format!("- Current medications: {}", medication_summary(medications)));
    }
    lines.join("\n")
}

/// `"Metformin 500mg, Lisinopril 10mg"`, or `"None"`.
pub fn medication_summary(medications: &[Medication]) -> String {
    if medications.is_empty() {
        return "None".into();
    }
    medications
        .iter()
        .map(Medication::short_label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Comma-separated problem list, or "No significant PMH".
pub fn history_summary(problems: &[ProblemListEntry]) -> String {
    if problems.is_empty() {
        return NO_PMH.into();
    }
    problems
        .iter()
        .map(|p| p.condition.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LabReference, LabResult, ProblemStatus};
    use crate::values::chart_rng;
    use chrono::NaiveDate;
    use longchart_types::NonEmptyText;

    fn at(year: i32, month: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, 10)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("valid date")
    }

    fn problem(condition: &str, date: NaiveDateTime) -> ProblemListEntry {
        ProblemListEntry {
            condition: NonEmptyText::new(condition).expect("condition"),
            icd10: None,
            date_added: date,
            date_resolved: None,
            status: ProblemStatus::Active,
            added_encounter_id: "ENC-1".into(),
        }
    }

    #[test]
    fn ids_have_fixed_shape() {
        let mut rng = chart_rng(3);
        let id = encounter_id(at(2024, 2), &mut rng);
        assert!(id.starts_with("ENC-20240210-"));
        assert_eq!(id.len(), "ENC-20240210-123".len());
        assert!(imaging_order_id(at(2024, 2), &mut rng).starts_with("IMG-20240210-"));
    }

    #[test]
    fn lab_summary_lists_only_abnormal_results() {
        let panel = |value: f64| LabPanel {
            panel_name: "CBC".into(),
            timestamp: at(2024, 1),
            encounter_id: "ENC-1".into(),
            results: vec![LabResult::new(
                "WBC",
                value,
                "x10^3/uL",
                LabReference::new(4.5, 11.0),
                None,
            )],
            ordering_provider: "Dr. A".into(),
        };
        assert_eq!(summarize_labs(&[]), "No labs available");
        assert_eq!(summarize_labs(&[panel(7.0)]), "Labs within normal limits");
        assert_eq!(summarize_labs(&[panel(14.2)]), "Abnormal: WBC 14.2 (H)");
    }

    #[test]
    fn prior_visit_summary_dates_each_problem() {
        assert_eq!(prior_visit_summary(&[], &[]), "No prior visits on record.");

        let metformin = Medication {
            name: NonEmptyText::new("Metformin").expect("name"),
            dose: "500mg".into(),
            route: "PO".into(),
            frequency: "BID".into(),
            indication: None,
            rxnorm_code: None,
        };
        let summary = prior_visit_summary(
            &[problem("Type 2 diabetes mellitus", at(2022, 3))],
            &[metformin],
        );
        assert_eq!(
            summary,
            "- Type 2 diabetes mellitus (diagnosed March 2022)\n- Current medications: Metformin 500mg"
        );
    }

    #[test]
    fn empty_lists_have_placeholders() {
        assert_eq!(medication_summary(&[]), "None");
        assert_eq!(history_summary(&[]), "No significant PMH");
    }

    #[test]
    fn long_timelines_rotate_pcp_at_midpoint() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let first = crate::timeline::TimelineEvent {
            date: at(2018, 1),
            ..sample_event()
        };
        let last = crate::timeline::TimelineEvent {
            date: at(2024, 1),
            ..sample_event()
        };
        let team = CareTeam::assemble(&kb, &[first, last], &mut chart_rng(11));

        let (successor, switch) = team.secondary_pcp.clone().expect("secondary pcp");
        assert_eq!(team.pcp_on(at(2019, 1)), team.pcp);
        assert_eq!(team.pcp_on(switch + Duration::days(1)), successor);
        assert_ne!(team.primary_hospital, team.specialist_hospital);
        assert_eq!(team.hospital_for(VisitKind::OutpatientGi), team.specialist_hospital);
        assert_eq!(team.hospital_for(VisitKind::Ed), team.primary_hospital);
    }

    #[test]
    fn short_timelines_keep_one_pcp() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let team = CareTeam::assemble(&kb, &[sample_event()], &mut chart_rng(11));
        assert!(team.secondary_pcp.is_none());
    }

    fn sample_event() -> TimelineEvent {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let request = crate::timeline::TimelineRequest {
            history_conditions: &[],
            diagnosis: "",
            setting: crate::model::ClinicalSetting::Emergency,
            presenting_reason: "Abdominal pain",
            now: at(2025, 6),
        };
        crate::timeline::build_timeline(&kb, &request, &mut chart_rng(1))
            .pop()
            .expect("current event")
    }
}
