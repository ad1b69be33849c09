//! parkfan-ingest - multi-source theme-park data ingestion
//!
//! One-shot commands over the configured sources:
//! - `discover` - match every source's park list and report the groups
//! - `entities` - match entity lists for one park across sources
//! - `live` - fetch and merge live data for one park
//! - `health` - check every source

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parkfan_common::config::LoggingConfig;
use parkfan_common::Error;
use parkfan_ingest::mapping::{InMemoryJobQueue, InMemoryMappingStore};
use parkfan_ingest::quota::{InMemorySharedState, SharedState};
use parkfan_ingest::{IngestConfig, Orchestrator};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for parkfan-ingest
#[derive(Parser, Debug)]
#[command(name = "parkfan-ingest")]
#[command(about = "Multi-source theme park data ingestion")]
#[command(version)]
struct Cli {
    /// Config file (overrides PARKFAN_CONFIG and the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Match park lists across all sources
    Discover,

    /// Match entity lists of one park across sources
    Entities {
        /// SOURCE=EXTERNAL_ID, repeatable
        #[arg(short, long = "source-id", value_parser = parse_source_id, required = true)]
        source_ids: Vec<(String, String)>,
    },

    /// Fetch and merge live data for one park
    Live {
        /// Park identifier used in messages
        park: String,

        /// SOURCE=EXTERNAL_ID, repeatable
        #[arg(short, long = "source-id", value_parser = parse_source_id, required = true)]
        source_ids: Vec<(String, String)>,
    },

    /// Probe every configured source
    Health,
}

fn parse_source_id(raw: &str) -> std::result::Result<(String, String), Error> {
    match raw.split_once('=') {
        Some((source, id)) if !source.trim().is_empty() && !id.trim().is_empty() => {
            Ok((source.trim().to_string(), id.trim().to_string()))
        }
        _ => Err(Error::InvalidInput(format!(
            "expected SOURCE=EXTERNAL_ID, got '{}'",
            raw
        ))),
    }
}

/// RUST_LOG wins, then the config file level, then "info"
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer()).try_init()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = IngestConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging)?;
    info!("Starting parkfan-ingest {}", env!("CARGO_PKG_VERSION"));

    // Single process: the block flag only needs to outlive this run
    let shared: Arc<dyn SharedState> = Arc::new(InMemorySharedState::new());
    let jobs = Arc::new(InMemoryJobQueue::new());

    let orchestrator = Orchestrator::from_config(&config, shared)
        .context("Failed to build source adapters")?
        .with_job_sink(jobs.clone());

    match cli.command {
        Command::Discover => {
            let discovery = orchestrator.discover_all_parks().await;
            let store = InMemoryMappingStore::new();
            let mappings = orchestrator.persist_park_mappings(&store, &discovery).await?;

            for group in discovery.fully_matched.iter().chain(&discovery.cross_matched) {
                println!(
                    "{:<40} {:.2} {}",
                    group.anchor.name,
                    group.confidence(),
                    serde_json::to_string(&group.external_ids())?
                );
            }
            println!(
                "fully matched: {}, cross matched: {}, single source: {}, failed: {:?}",
                discovery.fully_matched.len(),
                discovery.cross_matched.len(),
                discovery.single_source.len(),
                discovery.failed_sources
            );
            println!("mappings: {}, resync jobs queued: {}", mappings, jobs.len().await);
        }
        Command::Entities { source_ids } => {
            let source_ids: HashMap<String, String> = source_ids.into_iter().collect();
            let discovery = orchestrator.discover_park_entities(&source_ids).await;

            println!(
                "anchor: {} ({} entities)",
                discovery.anchor_source.as_deref().unwrap_or("none"),
                discovery.anchor_entities.len()
            );
            for (source, result) in &discovery.matches {
                println!(
                    "{}: matched {}, anchor only {}, {} only {}",
                    source,
                    result.matched.len(),
                    result.left_only.len(),
                    source,
                    result.right_only.len()
                );
                for pair in &result.matched {
                    println!("  {:<40} <-> {:<40} {:.2}", pair.left.name, pair.right.name, pair.confidence);
                }
            }
            if !discovery.failed_sources.is_empty() {
                println!("failed: {:?}", discovery.failed_sources);
            }
        }
        Command::Live { park, source_ids } => {
            let source_ids: HashMap<String, String> = source_ids.into_iter().collect();
            let merged = orchestrator.fetch_live_data(&park, &source_ids).await?;
            println!("{}", serde_json::to_string_pretty(&merged)?);
        }
        Command::Health => {
            let mut health: Vec<(String, bool)> = orchestrator.check_health().await.into_iter().collect();
            health.sort();
            for (source, healthy) in health {
                println!("{:<20} {}", source, if healthy { "ok" } else { "unhealthy" });
            }
        }
    }

    Ok(())
}
