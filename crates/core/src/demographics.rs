//! Synthetic patient identity.

use crate::knowledge::KnowledgeBase;
use crate::model::{PatientIdentity, Sex};
use crate::values::pick;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rand::Rng;

const MIN_AGE: u32 = 25;
const MAX_AGE: u32 = 85;

/// Draw a patient identity from the demographic pools.
///
/// Sex and age come from the vignette when known and are drawn otherwise. The date of birth
/// is consistent with `age` as of `now` (day of month capped at 28).
///
/// # Arguments
///
/// * `kb` - Knowledge base holding the name, race, insurance and relation pools.
/// * `sex` - Sex extracted from the vignette, if any.
/// * `age` - Age extracted from the vignette, if any.
/// * `now` - Reference time of the chart.
/// * `rng` - The chart's random source.
pub fn generate_identity<R: Rng + ?Sized>(
    kb: &KnowledgeBase,
    sex: Option<Sex>,
    age: Option<u32>,
    now: NaiveDateTime,
    rng: &mut R,
) -> PatientIdentity {
    let pools = kb.demographics();

    let sex = sex.unwrap_or_else(|| {
        if rng.gen_bool(0.5) {
            Sex::Male
        } else {
            Sex::Female
        }
    });
    let first_name = pick(pools.first_names(sex), rng).unwrap_or_default().to_string();
    let last_name = pick(&pools.last_names, rng).unwrap_or_default().to_string();
    let age = age.unwrap_or_else(|| rng.gen_range(MIN_AGE..=MAX_AGE));

    let birth_year = now.year() - age as i32;
    let birth_month = rng.gen_range(1..=12);
    let birth_day = rng.gen_range(1..=28);
    let date_of_birth = NaiveDate::from_ymd_opt(birth_year, birth_month, birth_day)
        .unwrap_or_else(|| now.date());

    let mrn = format!("MRN-{}", rng.gen_range(100_000..=999_999));
    let race = pick(&pools.races, rng).unwrap_or_default().to_string();
    let ethnicity = pick(&pools.ethnicities, rng).unwrap_or_default().to_string();
    let insurance = pick(&pools.insurance_plans, rng).unwrap_or_default().to_string();
    let phone = phone_number(rng);

    let contact_first = pick(pools.first_names(sex.opposite()), rng).unwrap_or_default();
    let relation = pick(&pools.contact_relations, rng).unwrap_or_default();
    let contact_phone = phone_number(rng);
    let emergency_contact =
        format!("{contact_first} {last_name} ({relation}) - {contact_phone}");

    PatientIdentity {
        first_name,
        last_name,
        mrn,
        date_of_birth,
        age,
        sex,
        race,
        ethnicity,
        address: None,
        phone,
        insurance,
        emergency_contact,
    }
}

/// `(NNN) NNN-NNNN` with no leading 0 or 1 in the area code or exchange.
fn phone_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "({}) {}-{}",
        rng.gen_range(200..=999),
        rng.gen_range(200..=999),
        rng.gen_range(1000..=9999)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::chart_rng;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn vignette_sex_and_age_are_kept() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let patient = generate_identity(&kb, Some(Sex::Female), Some(47), now(), &mut chart_rng(1));

        assert_eq!(patient.sex, Sex::Female);
        assert_eq!(patient.age, 47);
        assert_eq!(patient.date_of_birth.year(), 1978);
        assert!(kb
            .demographics()
            .first_names_female
            .contains(&patient.first_name));
    }

    #[test]
    fn drawn_fields_have_expected_shapes() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        for seed in 0..25 {
            let patient = generate_identity(&kb, None, None, now(), &mut chart_rng(seed));
            assert!((MIN_AGE..=MAX_AGE).contains(&patient.age));
            assert!(patient.mrn.starts_with("MRN-"));
            assert_eq!(patient.mrn.len(), 10);
            assert_eq!(patient.phone.len(), 14);
            assert!(patient.date_of_birth.day() <= 28);
            assert!(patient
                .emergency_contact
                .contains(&format!(" {} (", patient.last_name)));
        }
    }

    #[test]
    fn emergency_contact_has_opposite_sex_first_name() {
        let kb = KnowledgeBase::embedded().expect("knowledge base");
        let patient = generate_identity(&kb, Some(Sex::Male), Some(60), now(), &mut chart_rng(9));
        let contact_first = patient
            .emergency_contact
            .split(' ')
            .next()
            .expect("contact first name");
        assert!(kb
            .demographics()
            .first_names_female
            .iter()
            .any(|n| n == contact_first));
    }
}
