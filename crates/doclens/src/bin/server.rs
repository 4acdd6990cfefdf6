//! Document Q&A server binary
//!
//! Run with: cargo run -p doclens --bin doclens-server -- --preload ./docs

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

use doclens::{
    config::RagConfig,
    lifecycle::DocumentUpload,
    server::{state::AppState, RagServer},
    types::FileType,
};

#[derive(Debug, Parser)]
#[command(name = "doclens-server", version, about = "Document Q&A over uploaded files")]
struct Args {
    /// Configuration file (defaults to $DOCLENS_CONFIG or ./doclens.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host
    #[arg(long)]
    host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory whose supported files are indexed before serving
    #[arg(long)]
    preload: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doclens=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let mut config = RagConfig::from_file(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config
        }
        None => RagConfig::load()?,
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!(
        "  - Embeddings: {:?} {} ({} dims)",
        config.embeddings.provider,
        config.embeddings.model,
        config.embeddings.dimensions
    );
    tracing::info!("  - LLM: {:?} {}", config.llm.provider, config.llm.model);
    tracing::info!(
        "  - Chunking: {} tokens, {} overlap",
        config.chunking.max_tokens,
        config.chunking.overlap_tokens
    );

    let state = AppState::new(config)?;

    if let Some(dir) = &args.preload {
        let uploads = collect_uploads(dir)?;
        tracing::info!("Preloading {} files from {}", uploads.len(), dir.display());
        let report = state.session().sync_documents(uploads).await;
        for failure in &report.failed {
            tracing::warn!("  - {} skipped: {}", failure.name, failure.error);
        }
    }

    let health = state.session().health().await;
    if !health.embedder_ok || !health.generator_ok {
        tracing::warn!(
            "Backends not fully reachable (embedder {}: {}, generator {}: {}); answers will degrade",
            health.embedder,
            health.embedder_ok,
            health.generator,
            health.generator_ok
        );
    }

    let server = RagServer::with_state(state);
    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}

/// Read every supported file under `dir`, keyed by its path relative to `dir`
fn collect_uploads(dir: &Path) -> anyhow::Result<Vec<DocumentUpload>> {
    let mut uploads = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if !FileType::from_name(&name).is_supported() {
            tracing::debug!("Skipping unsupported file {}", name);
            continue;
        }
        uploads.push(DocumentUpload::new(name, std::fs::read(path)?));
    }

    Ok(uploads)
}
