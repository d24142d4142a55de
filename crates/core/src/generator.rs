//! Chart generation entry points.

use crate::assembler::{assemble_chart, surgical_history, ChartParts, ChartProvenance};
use crate::config::GeneratorConfig;
use crate::constants::GENERATOR_VERSION;
use crate::demographics::generate_identity;
use crate::encounter::{
    synthesize_current, synthesize_historical, CareTeam, CurrentOptions, HistoricalVisit,
    PresentingVisit,
};
use crate::knowledge::KnowledgeBase;
use crate::model::{ClinicalScenario, ClinicalVignette, LongitudinalChart, ParsedVignette};
use crate::narrative::NarrativeBackend;
use crate::state::StateTracker;
use crate::timeline::{build_timeline, TimelineRequest};
use crate::values::chart_rng;
use crate::vignette::VignetteParser;
use crate::{ChartError, ChartResult};
use rand::Rng;
use std::sync::Arc;

/// Builds longitudinal charts from vignettes.
///
/// A generator is cheap to clone and holds no per-chart state: every call seeds its own
/// random source, so two calls with the same seed and configuration produce the same chart.
#[derive(Clone)]
pub struct ChartGenerator {
    kb: Arc<KnowledgeBase>,
    backend: Arc<dyn NarrativeBackend>,
    parser: VignetteParser,
    cfg: Arc<GeneratorConfig>,
}

pub struct ChartGeneratorBuilder {
    cfg: GeneratorConfig,
    kb: Option<Arc<KnowledgeBase>>,
    backend: Option<Arc<dyn NarrativeBackend>>,
}

impl ChartGeneratorBuilder {
    /// Narrative backend for every note, report and extraction. Required.
    pub fn narrative_backend(mut self, backend: Arc<dyn NarrativeBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Knowledge base to use instead of the embedded one.
    pub fn knowledge_base(mut self, kb: Arc<KnowledgeBase>) -> Self {
        self.kb = Some(kb);
        self
    }

    /// # Errors
    ///
    /// Returns `ChartError::MissingNarrativeBackend` if no backend was supplied, or the
    /// embedded knowledge base error if none was supplied and the embedded copy fails to load.
    pub fn build(self) -> ChartResult<ChartGenerator> {
        let backend = self
            .backend
            .ok_or(ChartError::MissingNarrativeBackend("chart generator"))?;
        let kb = match self.kb {
            Some(kb) => kb,
            None => Arc::new(KnowledgeBase::embedded()?),
        };
        Ok(ChartGenerator {
            kb,
            parser: VignetteParser::new(Arc::clone(&backend)),
            backend,
            cfg: Arc::new(self.cfg),
        })
    }
}

impl ChartGenerator {
    pub fn builder(cfg: GeneratorConfig) -> ChartGeneratorBuilder {
        ChartGeneratorBuilder {
            cfg,
            kb: None,
            backend: None,
        }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn parser(&self) -> &VignetteParser {
        &self.parser
    }

    /// Parse a free-text vignette, then generate a chart from it.
    ///
    /// # Errors
    ///
    /// Propagates backend failures from parsing and narrative generation.
    pub fn generate(&self, vignette: &ClinicalVignette) -> ChartResult<LongitudinalChart> {
        let parsed = self.parser.parse(vignette)?;
        self.generate_from_parsed(parsed, Some(vignette.clone()), None)
    }

    /// Render a scenario into a vignette sentence and generate from it.
    ///
    /// # Errors
    ///
    /// Returns `ChartError::Text` if the rendered vignette is blank, otherwise as
    /// [`ChartGenerator::generate`].
    pub fn generate_from_scenario(
        &self,
        scenario: &ClinicalScenario,
    ) -> ChartResult<LongitudinalChart> {
        self.generate(&scenario.to_vignette()?)
    }

    /// Generate a chart from an already structured vignette.
    ///
    /// # Arguments
    ///
    /// * `parsed` - Structured presentation; missing age and sex are filled from the generated
    ///   patient and recorded in the chart.
    /// * `vignette` - Source text, kept in the chart for provenance.
    /// * `seed` - Takes precedence over the vignette's seed, which takes precedence over the
    ///   configured seed. With none of the three, a fresh seed is drawn and recorded.
    ///
    /// # Errors
    ///
    /// Returns `ChartError::Narrative` if any backend call fails.
    pub fn generate_from_parsed(
        &self,
        mut parsed: ParsedVignette,
        vignette: Option<ClinicalVignette>,
        seed: Option<u64>,
    ) -> ChartResult<LongitudinalChart> {
        let seed = seed
            .or_else(|| vignette.as_ref().and_then(|v| v.seed))
            .or(self.cfg.seed())
            .unwrap_or_else(|| rand::thread_rng().gen());
        let now = self.cfg.reference_time();
        let kb = self.kb.as_ref();
        let backend = self.backend.as_ref();
        let mut rng = chart_rng(seed);

        tracing::info!(seed, diagnosis = %parsed.diagnosis, backend = backend.name(), "generating chart");

        let patient = generate_identity(kb, parsed.sex, parsed.age, now, &mut rng);
        parsed.age.get_or_insert(patient.age);
        parsed.sex.get_or_insert(patient.sex);

        let request = TimelineRequest {
            history_conditions: &parsed.history_conditions,
            diagnosis: &parsed.diagnosis,
            setting: parsed.setting(),
            presenting_reason: &parsed.chief_complaint,
            now,
        };
        let events = build_timeline(kb, &request, &mut rng);
        let Some((current_event, prior_events)) = events.split_last() else {
            return Err(ChartError::InvalidInput("timeline has no presenting event".into()));
        };

        let care_team = CareTeam::assemble(kb, &events, &mut rng);
        let surgical = surgical_history(&parsed.surgical_history, now, &mut rng);

        let mut state = StateTracker::new();
        let mut encounters = Vec::with_capacity(events.len());
        for event in prior_events {
            let record = synthesize_historical(
                kb,
                backend,
                &HistoricalVisit {
                    event,
                    patient: &patient,
                    hospital: care_team.hospital_for(event.kind),
                    pcp: care_team.pcp_on(event.date),
                    problems: state.problem_list(),
                    medications: state.medications(),
                },
                self.cfg.narrate_prior_imaging(),
                &mut rng,
            )?;
            state.apply(
                event,
                &record.encounter.encounter_id,
                record.encounter.admission_datetime,
                kb,
            );
            encounters.push(record);
        }

        let current = synthesize_current(
            kb,
            backend,
            &PresentingVisit {
                event: current_event,
                parsed: &parsed,
                patient: &patient,
                hospital: &care_team.primary_hospital,
                problems: state.problem_list(),
                medications: state.medications(),
                prior_encounter_count: encounters.len(),
            },
            CurrentOptions {
                mask_diagnosis: self.cfg.mask_diagnosis(),
                include_discharge_summary: self.cfg.include_discharge_summary(),
            },
            &mut rng,
        )?;
        encounters.push(current.record);

        let chart = assemble_chart(
            kb,
            ChartParts {
                patient,
                encounters,
                state,
                inpatient_medications: current.inpatient_medications,
                clinical_data: current.clinical_data,
                surgical_history: surgical,
                source_vignette: vignette,
                parsed_vignette: parsed,
            },
            &ChartProvenance {
                generator_version: GENERATOR_VERSION,
                generated_at: now,
                backend_name: backend.name(),
                model_id: backend.model_id(),
                seed,
            },
            &mut rng,
        );

        tracing::info!(
            chart_id = %chart.generation_metadata.chart_id,
            encounters = chart.encounter_history.len(),
            problems = chart.problem_list.len(),
            "chart generated"
        );
        Ok(chart)
    }
}
