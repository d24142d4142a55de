use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who recorded a vital-sign set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VitalSource {
    Triage,
    Nursing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSignSet {
    pub timestamp: NaiveDateTime,
    pub encounter_id: String,
    pub temperature_f: f64,
    pub heart_rate: u32,
    pub blood_pressure_systolic: u32,
    pub blood_pressure_diastolic: u32,
    pub respiratory_rate: u32,
    pub oxygen_saturation: f64,
    pub pain_scale: u32,
    pub source: VitalSource,
}

impl VitalSignSet {
    pub fn blood_pressure(&self) -> String {
        format!(
            "{}/{}",
            self.blood_pressure_systolic, self.blood_pressure_diastolic
        )
    }
}

/// Severity tier mapping to vital-sign sampling ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acuity {
    Stable,
    Mild,
    Febrile,
    Septic,
    Shock,
}

impl Acuity {
    pub fn from_loose(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stable" => Some(Self::Stable),
            "mild" => Some(Self::Mild),
            "febrile" => Some(Self::Febrile),
            "septic" | "sepsis" => Some(Self::Septic),
            "shock" => Some(Self::Shock),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Mild => "mild",
            Self::Febrile => "febrile",
            Self::Septic => "septic",
            Self::Shock => "shock",
        }
    }

    /// Septic or shock.
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Septic | Self::Shock)
    }

    /// Febrile, septic or shock.
    pub fn is_inflammatory(self) -> bool {
        matches!(self, Self::Febrile | Self::Septic | Self::Shock)
    }
}

impl fmt::Display for Acuity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
