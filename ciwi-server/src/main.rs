use std::sync::Arc;

use anyhow::Context;
use ciwi_core::domain::job::JobExecution;
use ciwi_server::{
    api, config::ServerConfig, db, hooks::Hooks, service::agent::AgentRegistry,
    service::artifacts::ArtifactStore, state::AppState, store::MemoryStore, store::PgStore,
    store::Store,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ciwi_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ciwi server...");

    let config = ServerConfig::from_env().context("Failed to read configuration")?;
    config.validate().context("Invalid configuration")?;

    tokio::fs::create_dir_all(&config.artifacts_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create artifacts dir {}",
                config.artifacts_dir.display()
            )
        })?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");

            let pool = db::create_pool(database_url, config.db_max_connections)
                .await
                .context("Failed to create database pool")?;

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            tracing::info!("Using PostgreSQL store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let agents = AgentRegistry::new();
    let hooks = Hooks {
        mark_agent_seen: Some(agents.hook()),
        on_job_updated: Some(Arc::new(|job: &JobExecution| {
            tracing::debug!("Job execution {} is now {}", job.id, job.status);
        })),
        ..Default::default()
    };

    let artifacts = ArtifactStore::new(&config.artifacts_dir)
        .with_max_expanded_bytes(config.max_upload_bytes as u64);
    let state = AppState::new(store, artifacts)
        .with_hooks(hooks)
        .with_agents(agents);

    // Build router with all API endpoints
    let app = api::create_router(state, config.max_upload_bytes);

    tracing::info!(
        "Listening on {} (artifacts: {})",
        config.bind_addr,
        config.artifacts_dir.display()
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
