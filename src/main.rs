mod chat;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use sift_core::bootstrap;
use sift_core::config::Config;
use sift_core::{QueryRequest, ResponseMode};
use sift_memory::ChunkIndex;

#[derive(Parser)]
#[command(
    name = "sift",
    version,
    about = "Answer questions from indexed documents, live web search, or both"
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "SIFT_CONFIG", default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index text, markdown or PDF files
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Document ID (single file only; defaults to the file name)
        #[arg(long)]
        id: Option<String>,
    },
    /// Answer one question
    Ask {
        #[arg(required = true)]
        query: Vec<String>,
        /// Always consult web search
        #[arg(long)]
        web: bool,
        /// detailed or concise
        #[arg(long)]
        mode: Option<ResponseMode>,
    },
    /// Interactive chat with history
    Chat {
        #[arg(long)]
        web: bool,
        #[arg(long)]
        mode: Option<ResponseMode>,
    },
    /// List indexed documents
    Docs,
    /// Remove one document from the index
    Remove { id: String },
    /// Drop every indexed document
    Reset,
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Ingest { files, id } => ingest(&config, files, id).await,
        Command::Ask { query, web, mode } => {
            let engine = bootstrap::build_engine(&config).await?;
            let request = QueryRequest::new(query.join(" "))
                .with_web_search(web)
                .with_mode(mode.unwrap_or(config.answer.default_mode));
            let answer = engine.ask(&request).await?;
            println!("[{}]\n\n{}", answer.label(), answer.text);
            Ok(())
        }
        Command::Chat { web, mode } => {
            let engine = bootstrap::build_engine(&config).await?;
            chat::run(&engine, mode.unwrap_or(config.answer.default_mode), web).await
        }
        Command::Docs => {
            let index = open_index(&config).await?;
            let docs = index.list_documents().await?;
            if docs.is_empty() {
                println!("no documents indexed");
            }
            for doc in docs {
                println!(
                    "{}\t{} chunks\t{}\t{}",
                    doc.id, doc.chunk_count, doc.source, doc.indexed_at
                );
            }
            Ok(())
        }
        Command::Remove { id } => {
            let index = open_index(&config).await?;
            match index.remove(&id).await? {
                Some(n) => {
                    println!("removed {id} ({n} chunks)");
                    Ok(())
                }
                None => bail!("document {id} is not indexed"),
            }
        }
        Command::Reset => {
            let index = open_index(&config).await?;
            index.reset().await?;
            println!("index cleared");
            Ok(())
        }
    }
}

async fn open_index(config: &Config) -> anyhow::Result<std::sync::Arc<ChunkIndex>> {
    let embedder = bootstrap::create_embedding_provider(config)?;
    bootstrap::build_index(config, &embedder).await
}

async fn ingest(config: &Config, files: Vec<PathBuf>, id: Option<String>) -> anyhow::Result<()> {
    let index = open_index(config).await?;

    if let Some(id) = id {
        let [path] = files.as_slice() else {
            bail!("--id can only be used with a single file");
        };
        let chunks = index
            .ingest_path(path, Some(id.clone()))
            .await
            .with_context(|| format!("failed to index {}", path.display()))?;
        println!("indexed {} as {id}: {} chunks", path.display(), chunks.len());
        return Ok(());
    }

    let outcomes = index.ingest_paths(&files).await;
    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(chunks) => println!("indexed {}: {} chunks", outcome.path.display(), chunks.len()),
            Err(e) => {
                failed += 1;
                println!("skipped {}: {e}", outcome.path.display());
            }
        }
    }
    if failed == outcomes.len() {
        bail!("no files were indexed");
    }
    tracing::info!(indexed = outcomes.len() - failed, skipped = failed, "ingest complete");
    Ok(())
}
