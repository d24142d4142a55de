use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative sex, as used for reference ranges and the GFR equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Interpret the loose spellings that extraction services return ("F", "woman", "female").
    pub fn from_loose(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "man" | "boy" => Some(Self::Male),
            "female" | "f" | "woman" | "girl" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }

    /// Suffix used for sex-specific lab target keys (`creatinine_female`).
    pub fn key_suffix(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Male => Self::Female,
            Self::Female => Self::Male,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patient identity. Created once at chart start and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub first_name: String,
    pub last_name: String,
    pub mrn: String,
    pub date_of_birth: NaiveDate,
    pub age: u32,
    pub sex: Sex,
    pub race: String,
    pub ethnicity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub phone: String,
    pub insurance: String,
    pub emergency_contact: String,
}

impl PatientIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_sex_spellings() {
        assert_eq!(Sex::from_loose(" Woman "), Some(Sex::Female));
        assert_eq!(Sex::from_loose("M"), Some(Sex::Male));
        assert_eq!(Sex::from_loose("unknown"), None);
    }
}
