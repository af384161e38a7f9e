use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod activity;
mod assistant;
mod config;
mod contributions;
mod error;
mod github;
mod models;
mod monitor;
mod routes;

use assistant::{AssistantService, FileStore, KnowledgeBase, MemoryStore, Responder, TranscriptStore};
use config::Settings;
use github::{GithubClient, GithubSource};
use monitor::ActivityMonitor;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    let knowledge = match &settings.knowledge_path {
        Some(path) => KnowledgeBase::from_path(path)
            .with_context(|| format!("loading knowledge base from {}", path.display()))?,
        None => KnowledgeBase::builtin()?,
    };
    tracing::info!(
        "Loaded knowledge base: {} topics, {} skills",
        knowledge.topics.len(),
        knowledge.skills.len()
    );

    let store: Arc<dyn TranscriptStore> = match &settings.chat_store_dir {
        Some(dir) => {
            tracing::info!("Persisting chat transcripts under {}", dir.display());
            Arc::new(FileStore::new(dir)?)
        }
        None => {
            tracing::info!("CHAT_STORE_DIR not set, transcripts kept in memory");
            Arc::new(MemoryStore::default())
        }
    };
    let assistant = Arc::new(
        AssistantService::new(Responder::new(knowledge, settings.delays.clone()), store)
            .with_limits(settings.sessions),
    );

    let source: Arc<dyn GithubSource> = Arc::new(GithubClient::new(
        &settings.github_api_url,
        &settings.github_web_url,
        settings.http_timeout,
    )?);
    let monitor = ActivityMonitor::new(source.clone(), settings.monitor());
    let refresher = monitor.spawn();

    let app = routes::build_router(AppState {
        monitor,
        assistant,
        source,
    });

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    tracing::info!(
        "Portfolio service listening on {} (GitHub user {})",
        settings.bind_address,
        settings.github_username
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresher.shutdown().await;
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
