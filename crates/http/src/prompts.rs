//! Prompt templates.
//!
//! Each function renders one typed context into the full prompt text. Provider-facing prompts
//! tell the model to keep the working diagnosis as given, so a masked diagnosis stays masked.

use longchart_core::narrative::{
    DischargeContext, EncounterNarrativeContext, RadiologyContext, ScenarioContext,
    VisitNoteContext,
};

fn patient(age: u32, sex: impl std::fmt::Display) -> String {
    format!("{age}-year-old {}", sex.to_string().to_lowercase())
}

fn vitals_line(context: &EncounterNarrativeContext) -> String {
    format!(
        "Temp {}F, HR {}, BP {}, RR {}, SpO2 {}%",
        context.temperature, context.heart_rate, context.bp, context.respiratory_rate, context.spo2
    )
}

pub fn clinical_data(context: &ScenarioContext) -> String {
    format!(
        r#"You generate structured clinical data for synthetic medical records.

SCENARIO:
- Diagnosis: {diagnosis}
- Patient: {patient}
- History: {history}
- Clinical indication: {indication}

Return one JSON object. Every lab value is a single number, never a range, and every value
must be consistent with the diagnosis.

{{
  "acuity": "stable|mild|febrile|septic|shock",
  "vitals": {{"temperature_f": 0.0, "heart_rate": 0, "blood_pressure_systolic": 0,
             "blood_pressure_diastolic": 0, "respiratory_rate": 0, "oxygen_saturation": 0.0,
             "pain_scale": 0}},
  "labs": {{"wbc": 0.0, "hemoglobin": 0.0, "hematocrit": 0.0, "platelets": 0.0, "sodium": 0.0,
           "potassium": 0.0, "chloride": 0.0, "co2": 0.0, "bun": 0.0, "creatinine": 0.0,
           "glucose": 0.0, "calcium": 0.0, "ast": 0.0, "alt": 0.0, "alp": 0.0,
           "bilirubin_total": 0.0, "bilirubin_direct": 0.0, "lipase": 0.0, "albumin": 0.0,
           "inr": 0.0, "lactate": null}},
  "inpatient_medications": [{{"name": "", "dose": "", "route": "PO|IV|IM|SubQ", "frequency": "", "indication": ""}}],
  "additional_conditions": [{{"condition": "", "icd10": ""}}],
  "allergies": [{{"allergen": "", "allergy_type": "Drug|Food|Environmental", "reaction": "", "severity": "Mild|Moderate|Severe"}}],
  "physical_exam_findings": "",
  "family_history": [""],
  "social_history": {{"smoking_status": "Never|Former|Current", "alcohol_use": "None|Social|Daily|Heavy",
                     "occupation": "", "living_situation": ""}}
}}

Vitals reflect the acuity. Medications cover acute management only. Most patients have no
known allergies; return an empty list in that case. Output only the JSON object."#,
        diagnosis = context.diagnosis,
        patient = patient(context.age, context.sex),
        history = context.history_summary,
        indication = context.protocol_indication,
    )
}

/// HPI prompt. Patients with earlier visits get a prompt that carries the prior-visit summary.
pub fn hpi(context: &EncounterNarrativeContext) -> String {
    let header = format!(
        "Patient: {patient}\nChief complaint: {cc}\nWorking diagnosis: {dx}\n\
         Clinical indication: {indication}\nMedical history: {history}\n\
         Current medications: {meds}\nVitals: {vitals}\nKey labs: {labs}",
        patient = patient(context.age, context.sex),
        cc = context.chief_complaint,
        dx = context.diagnosis,
        indication = context.protocol_indication,
        history = context.medical_history,
        meds = context.medications,
        vitals = vitals_line(context),
        labs = context.labs_summary,
    );
    if context.has_prior_visits {
        format!(
            "You are a physician writing the History of Present Illness for a patient with a \
             documented history at this facility.\n\n{header}\n\nPrior visits:\n{prior}\n\n\
             Write 2-3 paragraphs in clinical documentation style. Refer back to earlier visits \
             where relevant, for example a finding on a prior ultrasound. Cover onset, duration, \
             associated symptoms and pertinent negatives. Keep the working diagnosis as given. \
             No header.",
            prior = context.prior_visit_summary,
        )
    } else {
        format!(
            "You are a physician writing the History of Present Illness for a clinical note.\n\n\
             {header}\n\nWrite 2-3 paragraphs in clinical documentation style covering onset, \
             duration, character, location, radiation and severity, associated symptoms, \
             pertinent negatives and what prompted today's visit. Keep the working diagnosis as \
             given and do not add facts that are not derivable from the data. No header."
        )
    }
}

pub fn physical_exam(context: &EncounterNarrativeContext) -> String {
    format!(
        "You are a physician writing the Physical Examination section of a clinical note.\n\n\
         Patient: {patient}\nWorking diagnosis: {dx}\nVitals: {vitals}\n\
         Key exam findings: {findings}\nMedical history: {history}\nCurrent medications: {meds}\n\n\
         Use the sections GENERAL, HEENT, CARDIOVASCULAR, PULMONARY, ABDOMEN, EXTREMITIES and \
         NEUROLOGICAL, starting directly with GENERAL. Findings must agree with the vitals: a \
         temperature above 100.4F is not afebrile. Do not claim an empty medical history or \
         medication list unless the data above says so.",
        patient = patient(context.age, context.sex),
        dx = context.diagnosis,
        vitals = vitals_line(context),
        findings = context.physical_exam_findings,
        history = context.medical_history,
        meds = context.medications,
    )
}

pub fn assessment_plan(context: &EncounterNarrativeContext) -> String {
    format!(
        "You are a physician writing the Assessment and Plan of a clinical note.\n\n\
         Patient: {patient}\nWorking diagnosis: {dx}\nMedical history: {history}\n\
         Key labs: {labs}\nKey vitals: Temp {temp}F, HR {hr}\nImaging ordered: {imaging}\n\
         Clinical indication: {indication}\n\n\
         Format:\nASSESSMENT:\n<summary of presentation and key findings>\n\nPLAN:\n\
         1. <working diagnosis> - workup and management\n2. <secondary issues>\n3. Disposition\n\n\
         Use the working diagnosis exactly as written. If it is symptom-based, present an active \
         workup with a broad differential. Start directly with ASSESSMENT.",
        patient = patient(context.age, context.sex),
        dx = context.diagnosis,
        history = context.medical_history,
        labs = context.labs_summary,
        temp = context.temperature,
        hr = context.heart_rate,
        imaging = context.imaging_ordered,
        indication = context.protocol_indication,
    )
}

/// Radiology report prompt. Prior studies carry canned findings the report must agree with.
pub fn radiology_report(context: &RadiologyContext) -> String {
    let study = format!("{} {} {}", context.modality, context.body_region, context.contrast);
    match &context.expected_findings {
        Some(expected) => format!(
            "Write a radiology report for a prior imaging study.\n\n\
             Study: {study}\nPatient: {patient}\nClinical indication: {indication}\n\
             Expected findings: {expected}\n\n\
             Write a brief report with TECHNIQUE, FINDINGS and IMPRESSION sections consistent \
             with the expected findings. Start with TECHNIQUE.",
            study = study.trim(),
            patient = patient(context.age, context.sex),
            indication = context.indication,
        ),
        None => format!(
            "You are a radiologist reporting an imaging study.\n\n\
             Study: {study}\nPatient: {patient}\nClinical indication: {indication}\n\
             Diagnosis: {dx}\n\n\
             Sections: TECHNIQUE, FINDINGS (by organ system, with measurements), IMPRESSION \
             (numbered). Start directly with TECHNIQUE.",
            study = study.trim(),
            patient = patient(context.age, context.sex),
            indication = context.indication,
            dx = context.diagnosis,
        ),
    }
}

pub fn nursing_note(context: &EncounterNarrativeContext) -> String {
    format!(
        "You are a nurse writing a brief progress note.\n\n\
         Patient: {patient}\nWorking diagnosis: {dx}\nCurrent vitals: {vitals}, Pain {pain}/10\n\
         Time: {time}\n\n\
         Write 3-5 sentences on comfort, vital sign trend, interventions and concerns. Keep the \
         working diagnosis as given. No header.",
        patient = patient(context.age, context.sex),
        dx = context.diagnosis,
        vitals = vitals_line(context),
        pain = context.pain,
        time = context.time_description,
    )
}

pub fn discharge_summary(context: &DischargeContext) -> String {
    format!(
        "You are a physician writing a discharge summary.\n\n\
         Patient: {patient}\nAdmission diagnosis: {dx}\nMedical history: {history}\n\
         Hospital course: Admitted for {dx}. {summary}\nDischarge medications: {meds}\n\
         Follow-up: {follow_up}\n\n\
         Cover hospital course, discharge condition and instructions, follow-up, medications and \
         return precautions. No title.",
        patient = patient(context.age, context.sex),
        dx = context.diagnosis,
        history = context.medical_history,
        summary = context.clinical_summary,
        meds = context.discharge_meds,
        follow_up = context.follow_up,
    )
}

pub fn vignette_extraction(vignette_text: &str) -> String {
    format!(
        r#"You extract structured data from clinical vignettes.

VIGNETTE:
{vignette_text}

Return one JSON object:
{{
  "age": null, "sex": "Male|Female|null",
  "diagnosis": "", "differential_diagnoses": [], "chief_complaint": "",
  "symptom_onset": "", "history_conditions": [], "surgical_history": [],
  "presenting_symptoms": [], "pertinent_negatives": [], "exam_findings": "",
  "vitals": {{}}, "labs": {{}},
  "ordered_study": "", "clinical_setting": "ED|outpatient|inpatient|ICU",
  "acuity": "stable|mild|febrile|septic|shock",
  "special_populations": [], "safety_flags": []
}}

Vital keys: temperature_f, heart_rate, blood_pressure_systolic, blood_pressure_diastolic,
respiratory_rate, oxygen_saturation. Lab keys: wbc, ast, alt, alp, bilirubin_total, lipase,
creatinine, glucose, troponin_i, d_dimer and similar.

Extract only what the vignette states. ordered_study is the imaging study the provider orders.
Flag renal disease, pregnancy, contrast allergy, metformin use and elevated cardiac markers
in safety_flags. Output only the JSON object."#
    )
}

pub fn office_visit_note(context: &VisitNoteContext) -> String {
    format!(
        "Write an outpatient office visit note in SOAP format.\n\n\
         Patient: {patient}\nVisit reason: {reason}\nMedical history: {history}\n\
         Current medications: {meds}\nVitals: BP {bp}, HR {hr}\nRelevant labs: {labs}\n\
         Clinical context: {assessment}\n\n\
         Sections: SUBJECTIVE, OBJECTIVE, ASSESSMENT, PLAN, each 2-4 sentences with specific \
         clinical detail and standard abbreviations.",
        patient = patient(context.age, context.sex),
        reason = context.reason,
        history = context.medical_history,
        meds = context.medications,
        bp = context.bp,
        hr = context.heart_rate,
        labs = context.labs_summary,
        assessment = context.assessment,
    )
}

pub fn consultation_note(context: &VisitNoteContext) -> String {
    format!(
        "Write a specialist consultation note.\n\n\
         Patient: {patient}\nReferring provider: {referrer}\nReason for consultation: {reason}\n\
         Medical history: {history}\nCurrent medications: {meds}\nClinical context: {assessment}\n\n\
         Sections: REASON FOR CONSULTATION, HISTORY OF PRESENT ILLNESS, EXAMINATION, ASSESSMENT, \
         RECOMMENDATIONS. Close with the plan communicated back to the referring provider.",
        patient = patient(context.age, context.sex),
        referrer = context.referring_provider.as_deref().unwrap_or("Primary care"),
        reason = context.reason,
        history = context.medical_history,
        meds = context.medications,
        assessment = context.assessment,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use longchart_core::model::Sex;

    fn encounter(has_prior_visits: bool) -> EncounterNarrativeContext {
        EncounterNarrativeContext {
            age: 52,
            sex: Sex::Female,
            diagnosis: "RUQ pain, etiology under evaluation".into(),
            chief_complaint: "RUQ pain".into(),
            protocol_indication: "RUQ pain".into(),
            medical_history: "Cholelithiasis".into(),
            medications: "Metformin 500mg".into(),
            temperature: 101.2,
            heart_rate: 104,
            bp: "132/84".into(),
            respiratory_rate: 18,
            spo2: 97.0,
            pain: 7,
            labs_summary: "Abnormal: WBC 14.2 (H)".into(),
            physical_exam_findings: "+Murphy's sign".into(),
            imaging_ordered: "RUQ ultrasound".into(),
            modality: "Ultrasound".into(),
            body_region: "Abdomen".into(),
            contrast: String::new(),
            indication: "RUQ pain".into(),
            time_description: "4 hours post-admission".into(),
            prior_visit_summary: "- Cholelithiasis (diagnosed June 2023)".into(),
            has_prior_visits,
        }
    }

    #[test]
    fn hpi_includes_prior_visits_only_when_present() {
        let longitudinal = hpi(&encounter(true));
        assert!(longitudinal.contains("Prior visits:\n- Cholelithiasis (diagnosed June 2023)"));
        assert!(longitudinal.contains("52-year-old female"));

        let first_visit = hpi(&encounter(false));
        assert!(!first_visit.contains("Prior visits"));
        assert!(first_visit.contains("Working diagnosis: RUQ pain, etiology under evaluation"));
    }

    #[test]
    fn exam_prompt_carries_vitals_and_findings() {
        let prompt = physical_exam(&encounter(false));
        assert!(prompt.contains("Temp 101.2F, HR 104, BP 132/84, RR 18, SpO2 97%"));
        assert!(prompt.contains("Key exam findings: +Murphy's sign"));
    }

    #[test]
    fn prior_study_prompt_uses_expected_findings() {
        let mut context = RadiologyContext {
            modality: "Ultrasound".into(),
            body_region: "Abdomen".into(),
            contrast: String::new(),
            age: 50,
            sex: Sex::Male,
            indication: "RUQ discomfort".into(),
            diagnosis: "Cholelithiasis".into(),
            expected_findings: Some("Gallstones without wall thickening.".into()),
        };
        let prior = radiology_report(&context);
        assert!(prior.contains("Study: Ultrasound Abdomen\n"));
        assert!(prior.contains("Expected findings: Gallstones without wall thickening."));

        context.expected_findings = None;
        assert!(radiology_report(&context).contains("Diagnosis: Cholelithiasis"));
    }

    #[test]
    fn extraction_prompt_embeds_vignette() {
        let prompt = vignette_extraction("A 30-year-old man presents with RLQ pain.");
        assert!(prompt.contains("VIGNETTE:\nA 30-year-old man presents with RLQ pain."));
        assert!(prompt.contains("\"safety_flags\": []"));
    }
}
