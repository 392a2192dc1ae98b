use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clarity_mind::clients::OpenAiOracle;
use clarity_mind::evidence::InMemoryEvidenceStore;
use clarity_mind::{Config, DisclosureLayer, Orchestrator, Session, TurnRequest};

#[derive(Parser)]
#[command(name = "clarity-mind")]
#[command(about = "Goal-directed research assistant", long_about = None)]
struct Cli {
    /// Path to a clarity_mind.toml
    #[arg(long)]
    config: Option<String>,

    /// CSV to load with the first turn
    #[arg(long)]
    file: Option<PathBuf>,

    /// Goal to open with the first turn (id, name or number)
    #[arg(long)]
    goal: Option<String>,

    /// Disclosure layer for the first turn: handover, summary, evidence, deep
    #[arg(long)]
    layer: Option<DisclosureLayer>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from(cli.config.as_deref())?;

    let filter = EnvFilter::try_new(&config.runtime.log_level)
        .unwrap_or_else(|_| EnvFilter::new("clarity_mind=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting clarity-mind");
    if config.runtime.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; oracle-backed steps will degrade to fixed replies");
    }

    let oracle = Arc::new(OpenAiOracle::new(&config.oracle, config.runtime.openai_api_key.clone()));
    let evidence = Arc::new(InMemoryEvidenceStore::new());
    let orchestrator = Orchestrator::new(config, oracle, evidence);
    let session = Session::new();

    let mut first = Some((cli.file, cli.goal, cli.layer));
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if matches!(trimmed, "exit" | "quit") {
            break;
        }

        let mut request = TurnRequest::parse(trimmed);
        if let Some((file, goal, layer)) = first.take() {
            if let Some(file) = file {
                request = request.with_file(file);
            }
            if let Some(goal) = goal {
                request = request.with_goal_hint(goal);
            }
            if let Some(layer) = layer {
                request = request.with_layer(layer);
            }
        }

        let reply = orchestrator.process(&session, request).await;
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n\n> ").await?;
        stdout.flush().await?;
    }

    info!("clarity-mind stopped");
    Ok(())
}
