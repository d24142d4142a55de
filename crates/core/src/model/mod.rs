//! Chart records.
//!
//! Input records (vignettes, scenarios) derive `Deserialize`; output records derive `Serialize`
//! so a finished [`LongitudinalChart`] converts straight to JSON.

mod chart;
mod encounter;
mod history;
mod imaging;
mod labs;
mod medication;
mod notes;
mod patient;
mod vignette;
mod vitals;

pub use chart::{GenerationMetadata, LongitudinalChart};
pub use encounter::{ClinicalSetting, Encounter, EncounterRecord, VisitKind};
pub use history::{Allergy, ProblemListEntry, ProblemStatus, SocialHistory, SurgicalProcedure};
pub use imaging::{ImagingOrder, ImagingReport, ImagingUrgency, OrderStatus, ReportSections};
pub use labs::{LabFlag, LabPanel, LabReference, LabResult};
pub use medication::{ChangeType, Medication, MedicationChange, MedicationList};
pub use notes::{ClinicalNote, NoteType};
pub use patient::{PatientIdentity, Sex};
pub use vignette::{ClinicalScenario, ClinicalVignette, ParsedVignette};
pub use vitals::{Acuity, VitalSignSet, VitalSource};
