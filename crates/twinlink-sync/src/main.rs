//! CLI entry point for the twinlink sync engine.
//!
//! Loads an environment from JSON, compiles it into an in-memory graph,
//! optionally replays change events from a JSON-lines file and prints the
//! resulting browse tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use twinlink_core::{ChangeEvent, SyncConfig};
use twinlink_graph::MemoryGraph;
use twinlink_sync::{StaticModel, SyncEngine};

#[derive(Parser)]
#[command(name = "twinlink-sync")]
#[command(about = "Project a shell model into a browsable node graph and keep it in sync")]
struct Cli {
    /// Environment JSON file.
    #[arg(long)]
    model: PathBuf,

    /// Change events to replay, one JSON object per line.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Config file prefix (default: twinlink).
    #[arg(short, long, default_value = "twinlink")]
    config: String,

    /// Print the browse tree as JSON when done.
    #[arg(long)]
    dump: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::load(&cli.config)?;
    tracing::info!(
        failure_policy = ?config.failure_policy,
        namespace = config.namespace_index,
        "Configuration loaded"
    );

    let model = Arc::new(StaticModel::load(&cli.model)?);
    let env = model.snapshot();

    let store = Arc::new(MemoryGraph::new(config.namespace_index));
    let engine = SyncEngine::new(store, config)
        .with_source(model.clone())
        .with_writer(model);

    let report = engine.compile(&env).await?;
    if !report.skipped.is_empty() {
        tracing::warn!(skipped = ?report.skipped, "Some identifiables were not projected");
    }

    if let Some(path) = &cli.events {
        let replayed = replay(&engine, path).await?;
        tracing::info!(events = replayed, "Change events replayed");
    }

    if cli.dump {
        let root = engine.store().root();
        let tree = engine
            .tree(&root)
            .ok_or_else(|| anyhow::anyhow!("graph root is missing"))?;
        println!("{}", serde_json::to_string_pretty(&tree)?);
    }

    Ok(())
}

/// Push every event in `path` through the mutation loop and wait for it to
/// drain. Malformed lines are skipped.
async fn replay(engine: &SyncEngine, path: &Path) -> anyhow::Result<usize> {
    let text = std::fs::read_to_string(path)?;
    let (tx, handle) = engine.spawn_mutation_loop();

    let mut sent = 0;
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ChangeEvent>(line) {
            Ok(event) => {
                tx.send(event).await?;
                sent += 1;
            }
            Err(e) => tracing::warn!(line = line_no + 1, error = %e, "Skipping malformed event"),
        }
    }

    drop(tx);
    handle.await?;
    Ok(sent)
}
