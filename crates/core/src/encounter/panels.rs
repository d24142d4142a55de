//! Lab panels for the presenting encounter.
//!
//! CBC and a combined chemistry panel are always drawn. Further panels come from values the
//! backend or vignette supplied, then from context rules (acuity, setting, diagnosis and past
//! history). Every rule checks its panel name first, so running the rules again never adds a
//! duplicate panel.

use crate::constants::{
    CREATININE_KEY, EGFR_LOINC, EGFR_REFERENCE_HIGH, EGFR_REFERENCE_LOW, EGFR_TEST_NAME,
    EGFR_UNIT, HBA1C_ORDER_PROBABILITY,
};
use crate::knowledge::KnowledgeBase;
use crate::model::{Acuity, ClinicalSetting, LabPanel, LabReference, LabResult, Sex};
use crate::values::{self, round1};
use chrono::NaiveDateTime;
use rand::Rng;
use std::collections::BTreeMap;

const CBC_TESTS: &[&str] = &["wbc", "hemoglobin", "hematocrit", "platelets"];
const CHEMISTRY_TESTS: &[&str] = &[
    "sodium",
    "potassium",
    "chloride",
    "co2",
    "bun",
    "creatinine",
    "glucose",
    "calcium",
    "ast",
    "alt",
    "alp",
    "bilirubin_total",
    "bilirubin_direct",
    "albumin",
];
const CHEMISTRY_PANEL: &str = "CMP + LFT";

const COAGULATION_DIAGNOSIS_CUES: &[&str] = &[
    "cholangitis",
    "liver",
    "hepat",
    "cirrhosis",
    "coagulopathy",
    "bleeding",
    "varices",
    "pancreatitis",
];
const THROMBOTIC_CUES: &[&str] = &["embolism", "dvt", "thrombo"];
const DIABETES_CUES: &[&str] = &["diabetes", "dm", "a1c"];
const HEART_FAILURE_CUES: &[&str] = &["heart failure", "chf", "cardiomyopathy"];
const THYROID_CUES: &[&str] = &["thyroid", "hypothyroid", "hyperthyroid"];

/// Everything needed to turn a lab key into a result on this draw.
pub(crate) struct LabDraw<'a> {
    pub kb: &'a KnowledgeBase,
    pub sex: Sex,
    pub age: u32,
    /// Values supplied by the backend or vignette, keyed by canonical lab key.
    pub supplied: &'a BTreeMap<String, f64>,
    pub timestamp: NaiveDateTime,
    pub encounter_id: &'a str,
    pub ordering_provider: &'a str,
}

/// Context the injection rules look at.
pub(crate) struct PanelContext<'a> {
    pub acuity: Acuity,
    pub setting: ClinicalSetting,
    pub diagnosis: &'a str,
    pub history: &'a [String],
}

impl LabDraw<'_> {
    fn reference(&self, key: &str) -> Option<(LabReference, &str, Option<String>)> {
        self.kb
            .lab_range(key, self.sex)
            .map(|range| (range.reference(), range.unit.as_str(), range.loinc.clone()))
    }

    fn supplied(&self, key: &str) -> Option<f64> {
        self.supplied.get(key).copied()
    }

    /// Result for `key` with a fixed value. `None` if the test has no reference range.
    fn result_with(&self, key: &str, value: f64) -> Option<LabResult> {
        let (reference, unit, loinc) = self.reference(key)?;
        Some(LabResult::new(
            self.kb.display_name(key),
            value,
            unit,
            reference,
            loinc,
        ))
    }

    /// Result for `key`, using the supplied value when plausible and a normal draw otherwise.
    fn result<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> Option<LabResult> {
        let (reference, _, _) = self.reference(key)?;
        let value = accept_or_sample(key, self.supplied(key), &reference, rng);
        self.result_with(key, value)
    }

    fn panel(&self, name: &str, results: Vec<LabResult>) -> Option<LabPanel> {
        if results.is_empty() {
            return None;
        }
        Some(LabPanel {
            panel_name: name.to_string(),
            timestamp: self.timestamp,
            encounter_id: self.encounter_id.to_string(),
            results,
            ordering_provider: self.ordering_provider.to_string(),
        })
    }

    fn egfr(&self, creatinine: f64) -> LabResult {
        LabResult::new(
            EGFR_TEST_NAME,
            values::estimated_gfr(creatinine, self.age, self.sex),
            EGFR_UNIT,
            LabReference::new(EGFR_REFERENCE_LOW, EGFR_REFERENCE_HIGH),
            Some(EGFR_LOINC.to_string()),
        )
    }
}

/// Keep a supplied value if it lies between the critical bounds (or 0.1x low and 5x high when
/// a bound is missing); otherwise draw a normal value.
fn accept_or_sample<R: Rng + ?Sized>(
    key: &str,
    supplied: Option<f64>,
    reference: &LabReference,
    rng: &mut R,
) -> f64 {
    if let Some(value) = supplied {
        let floor = reference.critical_low.unwrap_or(reference.low * 0.1);
        let ceiling = reference.critical_high.unwrap_or(reference.high * 5.0);
        if (floor..=ceiling).contains(&value) {
            return round1(value);
        }
        tracing::warn!(test = key, value, "supplied lab value out of range; sampling instead");
    }
    values::value_in_range(reference, rng)
}

/// CBC, chemistry with eGFR, and the single-test panels whose values were supplied.
pub(crate) fn core_panels<R: Rng + ?Sized>(draw: &LabDraw<'_>, rng: &mut R) -> Vec<LabPanel> {
    let mut panels = Vec::new();

    let cbc: Vec<LabResult> = CBC_TESTS
        .iter()
        .filter_map(|key| draw.result(key, rng))
        .collect();
    panels.extend(draw.panel("CBC", cbc));

    let mut chemistry = Vec::new();
    let mut creatinine = None;
    for key in CHEMISTRY_TESTS {
        if let Some(result) = draw.result(key, rng) {
            if *key == CREATININE_KEY {
                creatinine = Some(result.value());
            }
            chemistry.push(result);
        }
    }
    if let Some(creatinine) = creatinine.filter(|cr| *cr > 0.0) {
        chemistry.push(draw.egfr(creatinine));
    }
    panels.extend(draw.panel(CHEMISTRY_PANEL, chemistry));

    for (panel_name, key) in [
        ("Lipase", "lipase"),
        ("Lactate", "lactate"),
        ("Cardiac Markers", "troponin_i"),
    ] {
        if draw.supplied(key).is_some() {
            let result = draw.result(key, rng);
            panels.extend(draw.panel(panel_name, result.into_iter().collect()));
        }
    }
    panels
}

/// Add context-driven panels that are not already present.
pub(crate) fn apply_panel_rules<R: Rng + ?Sized>(
    panels: &mut Vec<LabPanel>,
    draw: &LabDraw<'_>,
    context: &PanelContext<'_>,
    rng: &mut R,
) {
    let diagnosis = context.diagnosis.to_lowercase();
    let history = context.history.join(" ").to_lowercase();
    let acute_care = context.setting.is_ed_or_inpatient();
    let critical = context.acuity.is_critical();
    let mut added: Vec<&str> = Vec::new();

    let needs_coagulation = acute_care
        && (mentions(&diagnosis, COAGULATION_DIAGNOSIS_CUES)
            || draw.supplied("inr").is_some()
            || critical);
    if needs_coagulation && !has_panel(panels, "Coagulation") {
        let results = ["inr", "pt", "ptt"]
            .iter()
            .filter_map(|key| draw.result(key, rng))
            .collect();
        if let Some(panel) = draw.panel("Coagulation", results) {
            panels.push(panel);
            added.push("Coagulation");
        }
    }

    if context.acuity.is_inflammatory() && !has_panel(panels, "Inflammatory Markers") {
        let results = ["crp", "esr", "procalcitonin"]
            .iter()
            .filter_map(|key| inflammatory_result(draw, key, context.acuity, rng))
            .collect();
        if let Some(panel) = draw.panel("Inflammatory Markers", results) {
            panels.push(panel);
            added.push("Inflammatory Markers");
        }
    }

    let has_lipase = panels
        .iter()
        .any(|p| p.results.iter().any(|r| r.test_name() == "Lipase"));
    if has_lipase && !has_panel(panels, "Amylase") {
        let elevated_lipase = draw.supplied("lipase").is_some_and(|v| v > 60.0);
        let result = match draw.supplied("amylase") {
            None if elevated_lipase => {
                draw.result_with("amylase", values::uniform(120.0, 350.0, rng).round())
            }
            _ => draw.result("amylase", rng),
        };
        if let Some(panel) = draw.panel("Amylase", result.into_iter().collect()) {
            panels.push(panel);
            added.push("Amylase");
        }
    }

    let has_lactate = panels
        .iter()
        .any(|p| p.panel_name == "Lactate" || p.results.iter().any(|r| r.test_name() == "Lactate"));
    if !has_lactate && critical && acute_care {
        let value = match context.acuity {
            Acuity::Shock => values::value_in_target_range(4.0, 8.0, rng),
            _ => values::value_in_target_range(2.0, 4.5, rng),
        };
        if let Some(panel) = draw.panel("Lactate", draw.result_with("lactate", value).into_iter().collect()) {
            panels.push(panel);
            added.push("Lactate");
        }
    }

    if mentions(&diagnosis, THROMBOTIC_CUES) && !has_panel(panels, "D-dimer") {
        let value = values::uniform(600.0, 4000.0, rng).round();
        if let Some(panel) = draw.panel("D-dimer", draw.result_with("d_dimer", value).into_iter().collect()) {
            panels.push(panel);
            added.push("D-dimer");
        }
    }

    if acute_care && !has_panel(panels, "Magnesium") {
        if let Some(panel) = draw.panel("Magnesium", draw.result("magnesium", rng).into_iter().collect()) {
            panels.push(panel);
            added.push("Magnesium");
        }
    }

    if mentions(&history, DIABETES_CUES)
        && !has_panel(panels, "HbA1c")
        && rng.gen_bool(HBA1C_ORDER_PROBABILITY)
    {
        let result = match draw.supplied("hba1c") {
            Some(_) => draw.result("hba1c", rng),
            None => draw.result_with("hba1c", values::value_in_target_range(6.5, 9.0, rng)),
        };
        if let Some(panel) = draw.panel("HbA1c", result.into_iter().collect()) {
            panels.push(panel);
            added.push("HbA1c");
        }
    }

    if mentions(&history, HEART_FAILURE_CUES) && !has_panel(panels, "BNP") {
        let value = values::uniform(200.0, 800.0, rng).round();
        if let Some(panel) = draw.panel("BNP", draw.result_with("bnp", value).into_iter().collect()) {
            panels.push(panel);
            added.push("BNP");
        }
    }

    if mentions(&history, THYROID_CUES) && !has_panel(panels, "TSH") {
        if let Some(panel) = draw.panel("TSH", draw.result("tsh", rng).into_iter().collect()) {
            panels.push(panel);
            added.push("TSH");
        }
    }

    if !added.is_empty() {
        tracing::debug!(panels = ?added, "context panels added");
    }
}

fn mentions(text: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| text.contains(cue))
}

fn has_panel(panels: &[LabPanel], name: &str) -> bool {
    panels.iter().any(|p| p.panel_name == name)
}

/// Inflammatory markers run high with the acuity unless a value was supplied.
fn inflammatory_result<R: Rng + ?Sized>(
    draw: &LabDraw<'_>,
    key: &str,
    acuity: Acuity,
    rng: &mut R,
) -> Option<LabResult> {
    if draw.supplied(key).is_some() {
        return draw.result(key, rng);
    }
    let elevated = match (acuity.is_critical(), key) {
        (true, "crp") => Some(values::value_in_target_range(8.0, 25.0, rng)),
        (true, "procalcitonin") => Some(values::round2(values::uniform(2.0, 15.0, rng))),
        (true, "esr") => Some(values::uniform(40.0, 90.0, rng).round()),
        (false, "crp") => Some(values::value_in_target_range(3.0, 12.0, rng)),
        (false, "procalcitonin") => Some(values::round2(values::uniform(0.5, 3.0, rng))),
        _ => None,
    };
    match elevated {
        Some(value) => draw.result_with(key, value),
        None => draw.result(key, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LabFlag;
    use crate::values::chart_rng;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .and_then(|d| d.and_hms_opt(14, 20, 0))
            .expect("valid date")
    }

    fn names(panels: &[LabPanel]) -> Vec<&str> {
        panels.iter().map(|p| p.panel_name.as_str()).collect()
    }

    fn with_draw<T>(supplied: &BTreeMap<String, f64>, f: impl FnOnce(&LabDraw<'_>) -> T) -> T {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let draw = LabDraw {
            kb: &kb,
            sex: Sex::Female,
            age: 52,
            supplied,
            timestamp: timestamp(),
            encounter_id: "ENC-20250610-123",
            ordering_provider: "Dr. Sarah Chen",
        };
        f(&draw)
    }

    #[test]
    fn core_panels_always_include_cbc_and_chemistry_with_egfr() {
        let supplied = BTreeMap::new();
        let panels = with_draw(&supplied, |draw| core_panels(draw, &mut chart_rng(4)));

        assert_eq!(names(&panels), vec!["CBC", "CMP + LFT"]);
        let chemistry = &panels[1];
        let creatinine = chemistry.result("Creatinine").expect("creatinine");
        let egfr = chemistry.result("eGFR").expect("egfr");
        assert_eq!(
            egfr.value(),
            values::estimated_gfr(creatinine.value(), 52, Sex::Female)
        );
    }

    #[test]
    fn supplied_values_are_kept_or_replaced() {
        let supplied: BTreeMap<String, f64> = [
            ("wbc".to_string(), 15.2),
            ("lipase".to_string(), 450.0),
            ("sodium".to_string(), 9000.0),
        ]
        .into_iter()
        .collect();
        let panels = with_draw(&supplied, |draw| core_panels(draw, &mut chart_rng(4)));

        assert_eq!(names(&panels), vec!["CBC", "CMP + LFT", "Lipase"]);
        let wbc = panels[0].result("WBC").expect("wbc");
        assert_eq!(wbc.value(), 15.2);
        assert_eq!(wbc.flag(), Some(LabFlag::High));
        let sodium = panels[1].result("Sodium").expect("sodium");
        assert!((136.0..=145.0).contains(&sodium.value()));
    }

    #[test]
    fn rules_do_not_duplicate_panels() {
        let supplied: BTreeMap<String, f64> = [("lipase".to_string(), 300.0)].into_iter().collect();
        let history = vec!["Type 2 diabetes".to_string(), "Hypothyroidism".to_string()];
        let context = PanelContext {
            acuity: Acuity::Septic,
            setting: ClinicalSetting::Emergency,
            diagnosis: "Acute cholangitis",
            history: &history,
        };

        let panels = with_draw(&supplied, |draw| {
            let mut rng = chart_rng(21);
            let mut panels = core_panels(draw, &mut rng);
            apply_panel_rules(&mut panels, draw, &context, &mut rng);
            apply_panel_rules(&mut panels, draw, &context, &mut rng);
            panels
        });

        let mut seen = names(&panels);
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), total, "duplicate panel in {seen:?}");
        for expected in ["Coagulation", "Inflammatory Markers", "Amylase", "Lactate", "Magnesium", "TSH"] {
            assert!(seen.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn elevated_lipase_raises_amylase() {
        let supplied: BTreeMap<String, f64> = [("lipase".to_string(), 300.0)].into_iter().collect();
        let context = PanelContext {
            acuity: Acuity::Mild,
            setting: ClinicalSetting::Outpatient,
            diagnosis: "Acute pancreatitis",
            history: &[],
        };
        let panels = with_draw(&supplied, |draw| {
            let mut rng = chart_rng(8);
            let mut panels = core_panels(draw, &mut rng);
            apply_panel_rules(&mut panels, draw, &context, &mut rng);
            panels
        });

        assert_eq!(names(&panels), vec!["CBC", "CMP + LFT", "Lipase", "Amylase"]);
        let amylase = panels[3].result("Amylase").expect("amylase");
        assert!((120.0..=350.0).contains(&amylase.value()));
    }

    #[test]
    fn thrombotic_diagnosis_adds_elevated_d_dimer() {
        let supplied = BTreeMap::new();
        let context = PanelContext {
            acuity: Acuity::Mild,
            setting: ClinicalSetting::Emergency,
            diagnosis: "Pulmonary embolism",
            history: &[],
        };
        let panels = with_draw(&supplied, |draw| {
            let mut rng = chart_rng(2);
            let mut panels = core_panels(draw, &mut rng);
            apply_panel_rules(&mut panels, draw, &context, &mut rng);
            panels
        });

        let d_dimer = panels
            .iter()
            .find(|p| p.panel_name == "D-dimer")
            .and_then(|p| p.results.first())
            .expect("d-dimer result");
        assert_eq!(d_dimer.flag(), Some(LabFlag::High));
        assert!(names(&panels).contains(&"Magnesium"));
        assert!(!names(&panels).contains(&"Coagulation"));
    }
}
