use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use longchart_core::{
    resolve_knowledge_base, seed_from_env_value, ChartGenerator, ClinicalVignette,
    GeneratorConfig, NarrativeBackend, ParsedVignette, StubNarrativeBackend, VignetteParser,
};
use longchart_http::{HttpNarrativeBackend, DEFAULT_NARRATIVE_URL};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_NARRATIVE_MODEL: &str = "medgemma";

#[derive(Parser)]
#[command(name = "longchart")]
#[command(about = "Longitudinal synthetic patient chart generator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// Deterministic canned text, no network
    Stub,
    /// Ollama-compatible text generation service
    Http,
}

#[derive(clap::Args)]
struct BackendArgs {
    /// Narrative backend
    #[arg(long, value_enum, default_value_t = Backend::Stub)]
    backend: Backend,
    /// Narrative service base URL (default: LONGCHART_NARRATIVE_URL or localhost Ollama)
    #[arg(long)]
    url: Option<String>,
    /// Model name passed to the narrative service
    #[arg(long)]
    model: Option<String>,
}

#[derive(clap::Args)]
struct VignetteInput {
    /// Vignette text
    text: Option<String>,
    /// Read the vignette text from a file
    #[arg(long, conflicts_with = "text")]
    vignette_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a longitudinal chart
    Generate {
        #[command(flatten)]
        input: VignetteInput,
        /// Skip parsing and generate from a parsed vignette JSON file
        #[arg(long, conflicts_with_all = ["text", "vignette_file"])]
        parsed: Option<PathBuf>,
        #[command(flatten)]
        backend: BackendArgs,
        /// Chart seed (overrides LONGCHART_SEED)
        #[arg(long)]
        seed: Option<u64>,
        /// Hide the true diagnosis from provider-facing notes
        #[arg(long)]
        mask_diagnosis: bool,
        /// Have the narrative backend write historical imaging reports
        #[arg(long)]
        narrate_prior_imaging: bool,
        /// Add a discharge summary to inpatient and ICU presentations
        #[arg(long)]
        discharge_summary: bool,
        /// Write the chart JSON here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Parse a vignette and print the structured fields as JSON
    Parse {
        #[command(flatten)]
        input: VignetteInput,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// List progression templates and the keywords that select them
    Knowledge,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("longchart=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let kb_override = std::env::var("LONGCHART_KNOWLEDGE_BASE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);

    match cli.command {
        Some(Commands::Generate {
            input,
            parsed,
            backend,
            seed,
            mask_diagnosis,
            narrate_prior_imaging,
            discharge_summary,
            output,
        }) => {
            let env_seed = seed_from_env_value(std::env::var("LONGCHART_SEED").ok())?;
            let cfg = GeneratorConfig::new(chrono::Local::now().naive_local())
                .with_seed(env_seed)
                .with_mask_diagnosis(mask_diagnosis)
                .with_prior_imaging_narration(narrate_prior_imaging)
                .with_discharge_summary(discharge_summary);

            let kb = Arc::new(resolve_knowledge_base(kb_override)?);
            let generator = ChartGenerator::builder(cfg)
                .knowledge_base(kb)
                .narrative_backend(narrative_backend(&backend)?)
                .build()?;

            let chart = match parsed {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    let parsed: ParsedVignette = serde_json::from_str(&text)
                        .with_context(|| format!("parsing {}", path.display()))?;
                    generator.generate_from_parsed(parsed, None, seed)?
                }
                None => {
                    let vignette = read_vignette(&input)?;
                    let parsed = generator.parser().parse(&vignette)?;
                    generator.generate_from_parsed(parsed, Some(vignette), seed)?
                }
            };

            let json = chart.to_json_pretty()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), "chart written");
                }
                None => println!("{json}"),
            }
        }
        Some(Commands::Parse { input, backend }) => {
            let vignette = read_vignette(&input)?;
            let parser = VignetteParser::new(narrative_backend(&backend)?);
            let parsed = parser.parse(&vignette)?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Some(Commands::Knowledge) => {
            let kb = resolve_knowledge_base(kb_override)?;
            let keywords = kb.keywords_by_template();
            for progression in kb.progressions() {
                let listed = keywords
                    .get(progression.id.as_str())
                    .map(|k| k.join(", "))
                    .unwrap_or_default();
                println!(
                    "{} ({} years, {} stages): {}",
                    progression.id,
                    progression.timeline_years,
                    progression.stages.len(),
                    listed
                );
            }
        }
        None => {
            println!("Use 'longchart --help' for commands");
        }
    }

    Ok(())
}

fn narrative_backend(args: &BackendArgs) -> anyhow::Result<Arc<dyn NarrativeBackend>> {
    match args.backend {
        Backend::Stub => Ok(Arc::new(StubNarrativeBackend::new())),
        Backend::Http => {
            let url = args
                .url
                .clone()
                .or_else(|| std::env::var("LONGCHART_NARRATIVE_URL").ok())
                .unwrap_or_else(|| DEFAULT_NARRATIVE_URL.into());
            let model = args
                .model
                .clone()
                .or_else(|| std::env::var("LONGCHART_NARRATIVE_MODEL").ok())
                .unwrap_or_else(|| DEFAULT_NARRATIVE_MODEL.into());
            Ok(Arc::new(HttpNarrativeBackend::new(&url, model)?))
        }
    }
}

fn read_vignette(input: &VignetteInput) -> anyhow::Result<ClinicalVignette> {
    let text = match (&input.text, &input.vignette_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        (None, None) => bail!("provide vignette text or --vignette-file"),
    };
    Ok(ClinicalVignette::new(text)?)
}
