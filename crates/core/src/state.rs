//! Running patient state.
//!
//! The problem list, the current home medication list and the medication audit log, updated
//! event by event as the timeline is walked.

use crate::knowledge::{DiagnosisSeed, KnowledgeBase, MedicationChangeSeed, MedicationSeed};
use crate::model::{
    ChangeType, Medication, MedicationChange, ProblemListEntry, ProblemStatus,
};
use crate::timeline::TimelineEvent;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    problem_list: Vec<ProblemListEntry>,
    medications: Vec<Medication>,
    history: Vec<MedicationChange>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event's diff: diagnoses, then new medications, then dose changes.
    pub fn apply(
        &mut self,
        event: &TimelineEvent,
        encounter_id: &str,
        date: NaiveDateTime,
        kb: &KnowledgeBase,
    ) {
        for diagnosis in &event.new_diagnoses {
            self.add_diagnosis(diagnosis, encounter_id, date);
        }
        for seed in &event.new_medications {
            self.start_medication(seed, encounter_id, date, kb);
        }
        for change in &event.medication_changes {
            self.change_medication(change, encounter_id, date, kb);
        }
    }

    /// Add an Active problem unless the condition is already listed.
    ///
    /// Returns `true` if the list changed.
    pub fn add_diagnosis(
        &mut self,
        diagnosis: &DiagnosisSeed,
        encounter_id: &str,
        date: NaiveDateTime,
    ) -> bool {
        if self.has_condition(diagnosis.condition.as_str()) {
            return false;
        }
        self.problem_list.push(ProblemListEntry {
            condition: diagnosis.condition.clone(),
            icd10: diagnosis.icd10.clone(),
            date_added: date,
            date_resolved: None,
            status: ProblemStatus::Active,
            added_encounter_id: encounter_id.to_string(),
        });
        true
    }

    /// Start a home medication unless one with the same name is already active.
    ///
    /// Returns `true` if the list changed.
    pub fn start_medication(
        &mut self,
        seed: &MedicationSeed,
        encounter_id: &str,
        date: NaiveDateTime,
        kb: &KnowledgeBase,
    ) -> bool {
        if self.medication(seed.name.as_str()).is_some() {
            return false;
        }
        let medication = Medication {
            name: seed.name.clone(),
            dose: seed.dose.clone(),
            route: seed.route.clone(),
            frequency: seed.frequency.clone(),
            indication: seed.indication.clone(),
            rxnorm_code: kb.rxnorm_code(seed.name.as_str()).map(str::to_string),
        };
        self.history.push(MedicationChange {
            medication: medication.clone(),
            change_type: ChangeType::Started,
            change_date: date,
            encounter_id: encounter_id.to_string(),
            reason: seed.indication.clone(),
            previous_dose: None,
        });
        self.medications.push(medication);
        true
    }

    /// Change the dose of an active medication, matched by name ignoring case.
    ///
    /// A `Discontinued` change records the audit entry and then removes the medication from
    /// the current list, so a stopped drug never appears among the home medications. A change
    /// for a medication that is not active is ignored and `false` is returned.
    pub fn change_medication(
        &mut self,
        change: &MedicationChangeSeed,
        encounter_id: &str,
        date: NaiveDateTime,
        kb: &KnowledgeBase,
    ) -> bool {
        let Some(index) = self
            .medications
            .iter()
            .position(|m| m.name.eq_ignore_case(change.medication_name.as_str()))
        else {
            tracing::debug!(
                medication = change.medication_name.as_str(),
                "dropping change for medication not on the list"
            );
            return false;
        };

        let medication = &mut self.medications[index];
        let previous_dose = medication.dose.clone();
        if let Some(new_dose) = &change.new_dose {
            medication.dose = new_dose.clone();
        }
        if medication.rxnorm_code.is_none() {
            medication.rxnorm_code = kb.rxnorm_code(medication.name.as_str()).map(str::to_string);
        }
        self.history.push(MedicationChange {
            medication: medication.clone(),
            change_type: change.change_type,
            change_date: date,
            encounter_id: encounter_id.to_string(),
            reason: change.reason.clone(),
            previous_dose: Some(previous_dose),
        });

        if change.change_type == ChangeType::Discontinued {
            self.medications.remove(index);
        }
        true
    }

    pub fn has_condition(&self, condition: &str) -> bool {
        self.problem_list
            .iter()
            .any(|p| p.condition.eq_ignore_case(condition))
    }

    pub fn medication(&self, name: &str) -> Option<&Medication> {
        self.medications.iter().find(|m| m.name.eq_ignore_case(name))
    }

    pub fn problem_list(&self) -> &[ProblemListEntry] {
        &self.problem_list
    }

    pub fn medications(&self) -> &[Medication] {
        &self.medications
    }

    pub fn medication_history(&self) -> &[MedicationChange] {
        &self.history
    }

    pub fn into_parts(self) -> (Vec<ProblemListEntry>, Vec<Medication>, Vec<MedicationChange>) {
        (self.problem_list, self.medications, self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use longchart_types::NonEmptyText;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .expect("valid date")
    }

    fn text(value: &str) -> NonEmptyText {
        NonEmptyText::new(value).expect("non-empty")
    }

    fn metformin() -> MedicationSeed {
        MedicationSeed {
            name: text("Metformin"),
            dose: "500mg".into(),
            route: "PO".into(),
            frequency: "BID".into(),
            indication: Some("Type 2 DM".into()),
        }
    }

    fn change(kind: ChangeType, dose: Option<&str>) -> MedicationChangeSeed {
        MedicationChangeSeed {
            medication_name: text("Metformin"),
            change_type: kind,
            new_dose: dose.map(str::to_string),
            reason: Some("A1c above target".into()),
        }
    }

    #[test]
    fn diagnoses_are_unique_by_condition() {
        let mut state = StateTracker::new();
        let htn = DiagnosisSeed {
            condition: text("Essential Hypertension"),
            icd10: Some("I10".into()),
        };
        assert!(state.add_diagnosis(&htn, "ENC-1", at(1)));
        assert!(!state.add_diagnosis(&htn, "ENC-2", at(2)));

        assert_eq!(state.problem_list().len(), 1);
        let entry = &state.problem_list()[0];
        assert_eq!(entry.status, ProblemStatus::Active);
        assert_eq!(entry.added_encounter_id, "ENC-1");
        assert_eq!(entry.date_added, at(1));
    }

    #[test]
    fn names_match_regardless_of_case() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let mut state = StateTracker::new();
        assert!(state.start_medication(&metformin(), "ENC-1", at(1), &kb));

        let lower = MedicationSeed {
            name: text("metformin"),
            ..metformin()
        };
        assert!(!state.start_medication(&lower, "ENC-2", at(2), &kb));
        assert_eq!(state.medications().len(), 1);

        let shouted = MedicationChangeSeed {
            medication_name: text("METFORMIN"),
            ..change(ChangeType::Increased, Some("1000mg"))
        };
        assert!(state.change_medication(&shouted, "ENC-3", at(3), &kb));
        assert_eq!(state.medication("metformin").expect("listed").dose, "1000mg");

        let htn = DiagnosisSeed {
            condition: text("Essential Hypertension"),
            icd10: Some("I10".into()),
        };
        let htn_lower = DiagnosisSeed {
            condition: text("essential hypertension"),
            icd10: Some("I10".into()),
        };
        assert!(state.add_diagnosis(&htn, "ENC-1", at(1)));
        assert!(!state.add_diagnosis(&htn_lower, "ENC-2", at(2)));
        assert_eq!(state.problem_list().len(), 1);
    }

    #[test]
    fn started_medication_gets_rxnorm_and_audit_entry() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let mut state = StateTracker::new();
        assert!(state.start_medication(&metformin(), "ENC-1", at(1), &kb));
        assert!(!state.start_medication(&metformin(), "ENC-2", at(2), &kb));

        let med = state.medication("Metformin").expect("metformin listed");
        assert_eq!(med.rxnorm_code.as_deref(), Some("6809"));
        assert_eq!(state.medication_history().len(), 1);
        let audit = &state.medication_history()[0];
        assert_eq!(audit.change_type, ChangeType::Started);
        assert_eq!(audit.reason.as_deref(), Some("Type 2 DM"));
    }

    #[test]
    fn dose_increase_is_reflected_and_audited() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let mut state = StateTracker::new();
        state.start_medication(&metformin(), "ENC-1", at(1), &kb);
        assert!(state.change_medication(
            &change(ChangeType::Increased, Some("1000mg")),
            "ENC-2",
            at(2),
            &kb
        ));

        assert_eq!(state.medication("Metformin").expect("listed").dose, "1000mg");
        let audit = state.medication_history().last().expect("audit entry");
        assert_eq!(audit.change_type, ChangeType::Increased);
        assert_eq!(audit.previous_dose.as_deref(), Some("500mg"));
        assert_eq!(audit.medication.dose, "1000mg");
    }

    #[test]
    fn change_for_absent_medication_is_dropped() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let mut state = StateTracker::new();
        assert!(!state.change_medication(
            &change(ChangeType::Increased, Some("1000mg")),
            "ENC-2",
            at(2),
            &kb
        ));
        assert!(state.medications().is_empty());
        assert!(state.medication_history().is_empty());
    }

    #[test]
    fn discontinued_removes_from_current_list() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let mut state = StateTracker::new();
        state.start_medication(&metformin(), "ENC-1", at(1), &kb);
        assert!(state.change_medication(&change(ChangeType::Discontinued, None), "ENC-2", at(2), &kb));

        assert!(state.medication("Metformin").is_none());
        let audit = state.medication_history().last().expect("audit entry");
        assert_eq!(audit.change_type, ChangeType::Discontinued);
        assert_eq!(audit.previous_dose.as_deref(), Some("500mg"));
    }
}
