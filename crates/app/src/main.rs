mod server;

use chrono::Utc;
use clap::{Parser, Subcommand};
use docstore_core::{
    ensure_folder, run_ingestion, scan_folder, BulkWriter, Config, ElasticStore, MiniLmEmbedder,
    PipelineOptions, TextEmbedder,
};
use server::AppState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docstore", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the documents folder, embed chunks, and bulk-index them.
    Ingest {
        /// Folder to scan; overrides DOCS_FOLDER.
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Serve the read API and the bundled frontend.
    Serve {
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
        listen: String,
        /// Directory holding the static frontend build.
        #[arg(long, env = "STATIC_DIR", default_value = "static")]
        static_dir: PathBuf,
    },
    /// Drop the configured index and every document in it.
    DeleteIndex,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = ElasticStore::new(
        &config.endpoint,
        &config.index_name,
        Some(config.api_key.clone()),
    )?;

    match cli.command {
        Command::Ingest { folder } => {
            // Folder check comes before the first network round-trip.
            let folder = folder.unwrap_or_else(|| config.docs_folder.clone());
            ensure_folder(&folder)?;
            store.ping().await?;
            ingest(&config, &store, &folder).await?;
        }
        Command::Serve { listen, static_dir } => {
            store.ping().await?;
            let state = AppState {
                reader: Arc::new(store),
                static_dir,
            };
            server::serve(state, &listen).await?;
        }
        Command::DeleteIndex => {
            store.ping().await?;
            if store.delete_index().await? {
                println!("index '{}' deleted", config.index_name);
            } else {
                println!("index '{}' does not exist", config.index_name);
            }
        }
    }

    Ok(())
}

async fn ingest(config: &Config, store: &ElasticStore, folder: &Path) -> anyhow::Result<()> {
    let started = Instant::now();
    info!(folder = %folder.display(), index = %config.index_name, "starting ingestion");

    let embedder = MiniLmEmbedder::load().await?;
    store.ensure_index(embedder.dimensions()).await?;

    let options = PipelineOptions {
        chunk_size: config.chunk_size,
        chunk_overlap: config.chunk_overlap,
        batch_size: config.batch_size,
        user_id: config.user_id.clone(),
    };
    let report = run_ingestion(scan_folder(folder), &embedder, store, &options).await?;

    if report.files_processed == 0 && report.skipped_files.is_empty() {
        println!("no files found under {}", folder.display());
        return Ok(());
    }

    for skipped in &report.skipped_files {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "file skipped");
    }
    if report.chunks_dropped > 0 || report.stats.batches_dropped > 0 {
        warn!(
            chunks_dropped = report.chunks_dropped,
            batches_dropped = report.stats.batches_dropped,
            "ingestion finished with losses"
        );
    }

    println!(
        "{} files indexed ({} skipped), {} chunks embedded, {} docs written in {:.1}s at {}",
        report.files_processed,
        report.skipped_files.len(),
        report.chunks_embedded,
        report.stats.docs_indexed,
        started.elapsed().as_secs_f64(),
        Utc::now().to_rfc3339()
    );
    Ok(())
}
