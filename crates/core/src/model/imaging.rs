use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImagingUrgency {
    #[serde(rename = "STAT")]
    Stat,
    Urgent,
    Routine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Ordered,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagingOrder {
    pub order_id: String,
    pub modality: String,
    pub body_region: String,
    pub contrast: String,
    pub indication: String,
    pub ordering_provider: String,
    pub order_datetime: NaiveDateTime,
    pub urgency: ImagingUrgency,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagingReport {
    pub order_id: String,
    pub modality: String,
    pub report_datetime: NaiveDateTime,
    pub radiologist: String,
    pub technique: String,
    pub findings: String,
    pub impression: String,
}

/// TECHNIQUE / FINDINGS / IMPRESSION split of a free-text radiology report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSections {
    pub technique: String,
    pub findings: String,
    pub impression: String,
}

impl ReportSections {
    /// Split a report on its section headings (case-insensitive).
    ///
    /// Text without any recognised heading is kept whole as the findings.
    pub fn parse(text: &str) -> Self {
        let upper = text.to_ascii_uppercase();
        let technique_at = upper.find("TECHNIQUE");
        let findings_at = upper.find("FINDINGS");
        let impression_at = upper.find("IMPRESSION");

        let section = |start: Option<usize>, heading: &str, ends: &[Option<usize>]| -> String {
            let Some(start) = start else {
                return String::new();
            };
            let body_start = start + heading.len();
            let end = ends
                .iter()
                .flatten()
                .copied()
                .filter(|&e| e > start)
                .min()
                .unwrap_or(text.len());
            text.get(body_start..end)
                .unwrap_or_default()
                .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
                .trim()
                .to_string()
        };

        let sections = Self {
            technique: section(technique_at, "TECHNIQUE", &[findings_at, impression_at]),
            findings: section(findings_at, "FINDINGS", &[impression_at]),
            impression: section(impression_at, "IMPRESSION", &[]),
        };

        if sections.technique.is_empty()
            && sections.findings.is_empty()
            && sections.impression.is_empty()
        {
            return Self {
                findings: text.trim().to_string(),
                ..Self::default()
            };
        }
        sections
    }
}
