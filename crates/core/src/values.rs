//! Value synthesis.
//!
//! Pure functions that turn reference ranges into plausible clinical values and classify values
//! against their ranges. Every sampling function takes the chart's RNG explicitly; there is no
//! global random state anywhere in the crate.

use crate::knowledge::ValueRange;
use crate::model::{LabFlag, LabReference, Sex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// The single random source owned by one chart generation.
pub type ChartRng = ChaCha20Rng;

pub fn chart_rng(seed: u64) -> ChartRng {
    ChaCha20Rng::seed_from_u64(seed)
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Standard normal draw via the Box-Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

pub fn gaussian<R: Rng + ?Sized>(mean: f64, std_dev: f64, rng: &mut R) -> f64 {
    mean + std_dev * standard_normal(rng)
}

/// Normal draw centred on the range midpoint (sd = width/4), clamped into `[low, high]` and
/// rounded to one decimal.
pub fn clamped_gaussian<R: Rng + ?Sized>(low: f64, high: f64, rng: &mut R) -> f64 {
    let mid = (low + high) / 2.0;
    let sampled = gaussian(mid, (high - low) / 4.0, rng);
    round1(sampled.clamp(low, high))
}

/// Sample a normal value for a lab reference range. Always within `[low, high]`.
pub fn value_in_range<R: Rng + ?Sized>(reference: &LabReference, rng: &mut R) -> f64 {
    clamped_gaussian(reference.low, reference.high, rng)
}

/// Sample a vital-sign band. Always within the band.
pub fn value_in_band<R: Rng + ?Sized>(band: ValueRange, rng: &mut R) -> f64 {
    clamped_gaussian(band.low(), band.high(), rng)
}

/// Uniform draw from an explicit target sub-range, used for trending disease values that may
/// sit outside the normal range.
pub fn value_in_target_range<R: Rng + ?Sized>(target_low: f64, target_high: f64, rng: &mut R) -> f64 {
    round1(uniform(target_low, target_high, rng))
}

/// Uniform float over `[low, high]`; tolerates a degenerate or reversed range.
pub fn uniform<R: Rng + ?Sized>(low: f64, high: f64, rng: &mut R) -> f64 {
    let (lo, hi) = if low <= high { (low, high) } else { (high, low) };
    if hi - lo <= f64::EPSILON {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

/// Uniform integer over a float band, both ends inclusive.
pub fn uniform_int<R: Rng + ?Sized>(band: ValueRange, rng: &mut R) -> u32 {
    let lo = band.low().round().max(0.0) as u32;
    let hi = band.high().round().max(0.0) as u32;
    if hi <= lo {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

/// Classify a value against its reference range.
///
/// Critical bounds are checked first, then the normal range.
pub fn flag(value: f64, reference: &LabReference) -> Option<LabFlag> {
    let below_critical = reference.critical_low.is_some_and(|c| value < c);
    let above_critical = reference.critical_high.is_some_and(|c| value > c);
    if below_critical || above_critical {
        return Some(LabFlag::Critical);
    }
    if value < reference.low {
        return Some(LabFlag::Low);
    }
    if value > reference.high {
        return Some(LabFlag::High);
    }
    None
}

/// Race-free CKD-EPI 2021 eGFR in mL/min/1.73m2, rounded to one decimal.
pub fn estimated_gfr(creatinine: f64, age: u32, sex: Sex) -> f64 {
    let (kappa, alpha, sex_factor) = match sex {
        Sex::Female => (0.7, -0.241, 1.012),
        Sex::Male => (0.9, -0.302, 1.0),
    };
    let ratio = creatinine / kappa;
    let gfr = 142.0
        * ratio.min(1.0).powf(alpha)
        * ratio.max(1.0).powf(-1.200)
        * 0.9938_f64.powi(age as i32)
        * sex_factor;
    round1(gfr)
}

/// Move a value from `base` toward `target` across `total_steps` visits.
///
/// Adds zero-mean noise scaled to `noise_factor * |target - base|`. With one step or fewer the
/// target is returned unchanged.
pub fn interpolate<R: Rng + ?Sized>(
    base: f64,
    target: f64,
    step: usize,
    total_steps: usize,
    noise_factor: f64,
    rng: &mut R,
) -> f64 {
    if total_steps <= 1 {
        return target;
    }
    let fraction = step as f64 / (total_steps - 1) as f64;
    let value = base + (target - base) * fraction;
    let noise = gaussian(0.0, noise_factor * (target - base).abs(), rng);
    round1(value + noise)
}

/// Pick one entry of a pool, or `None` if the pool is empty.
pub fn pick<'a, R: Rng + ?Sized>(pool: &'a [String], rng: &mut R) -> Option<&'a str> {
    pool.choose(rng).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sodium_like() -> LabReference {
        LabReference::new(120.0, 145.0).with_critical(Some(100.0), None)
    }

    #[test]
    fn flags_follow_critical_then_range() {
        assert_eq!(flag(119.0, &sodium_like()), Some(LabFlag::Low));
        assert_eq!(flag(99.0, &sodium_like()), Some(LabFlag::Critical));
        assert_eq!(flag(132.0, &LabReference::new(120.0, 145.0)), None);
        assert_eq!(flag(150.0, &LabReference::new(120.0, 145.0)), Some(LabFlag::High));
    }

    #[test]
    fn gfr_matches_ckd_epi_2021() {
        let expected = {
            let ratio: f64 = 1.0 / 0.9;
            let raw = 142.0 * ratio.max(1.0).powf(-1.2) * 0.9938_f64.powi(50);
            (raw * 10.0).round() / 10.0
        };
        let gfr = estimated_gfr(1.0, 50, Sex::Male);
        assert_eq!(gfr, expected);
        assert_eq!(gfr, 91.7);
    }

    #[test]
    fn gfr_applies_female_coefficients() {
        let gfr = estimated_gfr(0.6, 40, Sex::Female);
        let ratio: f64 = 0.6 / 0.7;
        let raw = 142.0 * ratio.powf(-0.241) * 0.9938_f64.powi(40) * 1.012;
        assert_eq!(gfr, (raw * 10.0).round() / 10.0);
    }

    #[test]
    fn normal_samples_stay_in_range() {
        let mut rng = chart_rng(11);
        let reference = LabReference::new(3.5, 5.1);
        for _ in 0..500 {
            let v = value_in_range(&reference, &mut rng);
            assert!((3.5..=5.1).contains(&v), "{v} escaped the range");
        }
    }

    #[test]
    fn target_samples_stay_in_target() {
        let mut rng = chart_rng(5);
        for _ in 0..200 {
            let v = value_in_target_range(6.5, 7.0, &mut rng);
            assert!((6.5..=7.0).contains(&v));
        }
    }

    #[test]
    fn interpolation_with_single_step_returns_target() {
        let mut rng = chart_rng(1);
        assert_eq!(interpolate(5.0, 9.0, 0, 1, 0.5, &mut rng), 9.0);
        assert_eq!(interpolate(5.0, 9.0, 3, 0, 0.5, &mut rng), 9.0);
    }

    #[test]
    fn interpolation_without_noise_is_linear() {
        let mut rng = chart_rng(1);
        assert_eq!(interpolate(6.0, 8.0, 0, 5, 0.0, &mut rng), 6.0);
        assert_eq!(interpolate(6.0, 8.0, 2, 5, 0.0, &mut rng), 7.0);
        assert_eq!(interpolate(6.0, 8.0, 4, 5, 0.0, &mut rng), 8.0);
    }

    #[test]
    fn same_seed_same_draws() {
        let mut a = chart_rng(99);
        let mut b = chart_rng(99);
        for _ in 0..20 {
            assert_eq!(standard_normal(&mut a), standard_normal(&mut b));
        }
    }
}
