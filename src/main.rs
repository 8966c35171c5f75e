use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use booking_scout::app::ports::{SearchProvider, TextCapability};
use booking_scout::config::Config;
use booking_scout::infra::http_client::ReqwestHttp;
use booking_scout::infra::search::{BraveSearch, FixtureSearch};
use booking_scout::pipeline::{Evaluation, Lead, ResearchPipeline};
use booking_scout::storage::InMemoryFindingStore;
use booking_scout::types::{BandProfile, EntityKind, FindingSource, SearchCandidate};
use booking_scout::{logging, metrics};

#[derive(Parser)]
#[command(name = "booking_scout")]
#[command(about = "Finds festivals and venues worth applying to for a band")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and evaluate a single page
    Score {
        url: String,
        /// festival or venue
        #[arg(long, default_value = "festival")]
        kind: EntityKind,
        /// Title as shown by the search provider
        #[arg(long, default_value = "")]
        title: String,
        /// Snippet as shown by the search provider
        #[arg(long, default_value = "")]
        snippet: String,
        /// Band profile used for genre analysis
        #[arg(long)]
        profile: Option<PathBuf>,
    },
    /// Run a full research run for a band profile
    Research {
        /// Band profile (TOML)
        #[arg(long)]
        profile: PathBuf,
        /// festival or venue
        #[arg(long, default_value = "festival")]
        kind: EntityKind,
        /// Canned search results (JSON) instead of the live search API
        #[arg(long)]
        fixtures: Option<PathBuf>,
        /// Where to write the findings
        #[arg(long, default_value = "findings.json")]
        output: PathBuf,
    },
}

fn load_profile(path: &Path) -> Result<BandProfile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read band profile '{}'", path.display()))?;
    let profile: BandProfile = toml::from_str(&content)
        .with_context(|| format!("Invalid band profile '{}'", path.display()))?;
    Ok(profile)
}

fn build_pipeline(
    config: &Config,
    search: Arc<dyn SearchProvider>,
    store: &InMemoryFindingStore,
) -> Result<ResearchPipeline> {
    let http = Arc::new(ReqwestHttp::new(&config.fetch)?);
    let text = TextCapability::from_config(&config.llm)?;
    let pipeline = ResearchPipeline::new(config, http, search, text, Arc::new(store.clone()))?;
    Ok(pipeline)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Score {
            url,
            kind,
            title,
            snippet,
            profile,
        } => {
            let band = match profile {
                Some(path) => load_profile(&path)?,
                None => BandProfile::default(),
            };
            let store = InMemoryFindingStore::new();
            let pipeline = build_pipeline(&config, Arc::new(FixtureSearch::default()), &store)?;

            let lead = Lead::new(SearchCandidate::new(url, title, snippet), FindingSource::Keyword);
            let evaluation = pipeline.evaluate_candidate(kind, &lead, &band).await?;
            match &evaluation {
                Evaluation::Accepted { finding, .. } => {
                    info!(name = %finding.name, "Candidate accepted")
                }
                Evaluation::Rejected(rejection) => {
                    info!(score = rejection.score, gate = %rejection.gate, "Candidate rejected")
                }
            }
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
        Commands::Research {
            profile,
            kind,
            fixtures,
            output,
        } => {
            let band = load_profile(&profile)?;
            let search: Arc<dyn SearchProvider> = match fixtures {
                Some(path) => Arc::new(
                    FixtureSearch::from_file(&path)
                        .with_context(|| format!("Failed to load fixtures '{}'", path.display()))?,
                ),
                None => Arc::new(BraveSearch::from_env(&config.search, config.research.results_per_query)?),
            };
            let store = InMemoryFindingStore::new();
            let pipeline = build_pipeline(&config, search, &store)?;

            println!("🔎 Researching {}s for {}...", kind, band.name);
            let report = pipeline.run(kind, &band).await;
            store
                .write_json(&output)
                .with_context(|| format!("Failed to write '{}'", output.display()))?;

            println!("\n📊 Research results:");
            println!("   Queries: {}", report.queries.len());
            println!("   Findings: {}", report.findings.len());
            println!("   Rejected: {}", report.rejected.len());
            println!("   Escalated: {}", report.escalated);
            println!("   Failed: {}", report.failed.len());
            println!("   Output file: {}", output.display());
            for finding in &report.findings {
                println!(
                    "   - {} ({:?}, score {}) {}",
                    finding.name, finding.recommendation.verdict, finding.relevance_score, finding.website
                );
            }
            if !report.failed.is_empty() {
                warn!("{} candidates failed", report.failed.len());
            }
        }
    }

    Ok(())
}
