use crate::values;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Normal and critical bounds for one lab test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabReference {
    pub low: f64,
    pub high: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_high: Option<f64>,
}

impl LabReference {
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            critical_low: None,
            critical_high: None,
        }
    }

    pub fn with_critical(mut self, critical_low: Option<f64>, critical_high: Option<f64>) -> Self {
        self.critical_low = critical_low;
        self.critical_high = critical_high;
        self
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Abnormality flag. Serialized as `"L"`, `"H"` or `"Critical"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabFlag {
    #[serde(rename = "L")]
    Low,
    #[serde(rename = "H")]
    High,
    Critical,
}

impl LabFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "L",
            Self::High => "H",
            Self::Critical => "Critical",
        }
    }
}

/// A single lab value.
///
/// The flag is computed from the value and bounds when the result is built and there is no way
/// to set it independently, so it always agrees with [`values::flag`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabResult {
    test_name: String,
    value: f64,
    unit: String,
    reference_low: f64,
    reference_high: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    critical_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    critical_high: Option<f64>,
    flag: Option<LabFlag>,
    loinc_code: Option<String>,
}

impl LabResult {
    pub fn new(
        test_name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        reference: LabReference,
        loinc_code: Option<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            value,
            unit: unit.into(),
            reference_low: reference.low,
            reference_high: reference.high,
            critical_low: reference.critical_low,
            critical_high: reference.critical_high,
            flag: values::flag(value, &reference),
            loinc_code,
        }
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn flag(&self) -> Option<LabFlag> {
        self.flag
    }

    pub fn loinc_code(&self) -> Option<&str> {
        self.loinc_code.as_deref()
    }

    pub fn reference(&self) -> LabReference {
        LabReference::new(self.reference_low, self.reference_high)
            .with_critical(self.critical_low, self.critical_high)
    }
}

/// A named bundle of results drawn together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabPanel {
    pub panel_name: String,
    pub timestamp: NaiveDateTime,
    pub encounter_id: String,
    pub results: Vec<LabResult>,
    pub ordering_provider: String,
}

impl LabPanel {
    pub fn result(&self, test_name: &str) -> Option<&LabResult> {
        self.results.iter().find(|r| r.test_name == test_name)
    }
}
