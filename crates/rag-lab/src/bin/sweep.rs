//! Experiment sweep binary
//!
//! Run with: cargo run -p rag-lab -- <document-dir> [--config rag-lab.toml]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rag_lab::experiment::{build_llms, check_llms, connect_phases};
use rag_lab::ingestion::DocumentLoader;
use rag_lab::{ExperimentHarness, LabConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rag-lab")]
#[command(about = "Sweep RAG configurations over a document directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory of documents to index
    docs: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report path, overriding the configured one
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Skip resident memory sampling
    #[arg(long)]
    no_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let docs = match cli.docs {
        Some(dir) if dir.is_dir() => dir,
        Some(dir) => {
            println!("Error: {} is not a directory", dir.display());
            return Ok(ExitCode::FAILURE);
        }
        None => {
            println!("Usage: rag-lab <document-dir> [--config <file>] [--report <file>]");
            return Ok(ExitCode::FAILURE);
        }
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "rag_lab=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &cli.config {
        Some(path) => LabConfig::from_file(path)?,
        None => LabConfig::default(),
    };
    if let Some(report) = cli.report {
        config.experiment.report_path = report;
    }
    if cli.no_memory {
        config.experiment.track_memory = false;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Ollama: {}", config.llm.base_url);
    tracing::info!("  - LLMs: {}", config.experiment.llm_models.join(", "));
    tracing::info!("  - Chunk sizes: {:?}", config.experiment.chunk_sizes);
    tracing::info!("  - Overlaps: {:?}", config.experiment.overlaps);
    tracing::info!("  - Report: {}", config.experiment.report_path.display());

    let documents = DocumentLoader::load_dir(&docs)?;
    tracing::info!("Loaded {} documents from {}", documents.len(), docs.display());

    let llms = check_llms(build_llms(&config)?).await;
    if llms.is_empty() {
        tracing::error!("No language model is reachable at {}", config.llm.base_url);
    }
    let phases = connect_phases(&config).await;
    let harness = ExperimentHarness::from_config(&config, llms);

    let outcome = harness.run(&documents, &phases).await?;

    println!("\nSweep finished");
    println!("  Completed runs: {}", outcome.runs.len());
    println!("  Failed runs:    {}", outcome.failures.len());
    for failure in &outcome.failures {
        println!("    - {}", failure);
    }
    println!("  Report: {}", harness.report_path().display());

    Ok(ExitCode::SUCCESS)
}
