mod embedder;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use endee_rag::{DirectoryLoader, EndeeClient, RagConfig, RagPipeline};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "endee-rag")]
#[command(about = "Ingest documents into an Endee index and retrieve context for questions", long_about = None)]
#[command(version)]
struct Cli {
    /// Index to operate on (defaults to COLLECTION_NAME or `knowledge_base`)
    #[arg(long, global = true)]
    index: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load .txt and .md files from a directory and index them
    Ingest {
        /// Directory to load documents from
        dir: PathBuf,
    },

    /// Retrieve the chunks most relevant to a question
    Query {
        /// The question to answer
        question: String,

        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,

        /// Print sources as JSON instead of the context block
        #[arg(long)]
        json: bool,
    },

    /// Check that the index service is reachable
    Health,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = RagConfig::from_env().context("invalid configuration")?;
    if let Some(index) = cli.index {
        config.index_name = index;
    }

    let client = Arc::new(EndeeClient::from_config(&config)?);

    match cli.command {
        Commands::Health => {
            if client.health().await {
                println!("index service at {} is healthy", client.base_url());
            } else {
                bail!("index service at {} is not reachable", client.base_url());
            }
        }
        Commands::Ingest { dir } => {
            let pipeline = build_pipeline(config, client)?;
            ingest(&pipeline, dir).await?;
        }
        Commands::Query { question, top_k, json } => {
            let pipeline = build_pipeline(config, client)?;
            query(&pipeline, &question, top_k, json).await?;
        }
    }

    Ok(())
}

fn build_pipeline(config: RagConfig, client: Arc<EndeeClient>) -> anyhow::Result<RagPipeline> {
    let embedder = embedder::from_env(config.dimensions, config.request_timeout)?;
    let pipeline =
        RagPipeline::builder().config(config).embedding_provider(embedder).index(client).build()?;
    Ok(pipeline)
}

async fn ingest(pipeline: &RagPipeline, dir: PathBuf) -> anyhow::Result<()> {
    let index = pipeline.config().index_name.clone();
    let documents = DirectoryLoader::new(&dir)
        .load()
        .with_context(|| format!("failed to load documents from {}", dir.display()))?;
    if documents.is_empty() {
        warn!(dir = %dir.display(), "no documents found");
        return Ok(());
    }

    pipeline.create_index(&index).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing in-flight documents");
            on_interrupt.cancel();
        }
    });

    let report = pipeline.ingest_batch_with_cancel(&index, &documents, &cancel).await;

    println!(
        "indexed {} of {} documents ({} chunks) into '{index}'",
        report.succeeded.len(),
        documents.len(),
        report.total_chunks()
    );
    for failure in &report.failed {
        println!("  failed  {} (after {}): {}", failure.document_id, failure.stage, failure.error);
    }
    if !report.cancelled.is_empty() {
        println!("  skipped {} documents after interrupt", report.cancelled.len());
    }

    if !report.failed.is_empty() {
        bail!("{} document(s) failed to ingest", report.failed.len());
    }
    Ok(())
}

async fn query(
    pipeline: &RagPipeline,
    question: &str,
    top_k: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let index = &pipeline.config().index_name;
    let k = top_k.unwrap_or(pipeline.config().top_k);
    let result = pipeline.retrieve(index, question, k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.sources())?);
        return Ok(());
    }

    if result.is_empty() {
        println!("No relevant documents found.");
        return Ok(());
    }

    println!("{}\n", result.context());
    println!("Sources:");
    for source in result.sources() {
        println!(
            "  {} #{} (score {:.3}): {}",
            source.document_id, source.chunk_index, source.score, source.preview
        );
    }
    Ok(())
}
