//! simpld: HTTP daemon for the evaluation service
//!
//! Serves scorer and profile management, dataset upload, run triggering and
//! paginated row reports under `/api/eval`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ttl_cache;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use simpl_core::{LocalEngine, OpenAiJudgeClient};
use simpl_state::SurrealEvalStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use config::Config;
pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
pub use ttl_cache::{RateLimiter, TtlCache};

/// How often expired rate-limit windows are swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Open the store, create working directories and wire the engine.
pub async fn build_state(config: &Config) -> Result<AppState> {
    for dir in [&config.upload_dir, &config.artifact_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let store = SurrealEvalStore::from_env(config.data_dir.as_deref())
        .await
        .context("failed to open state store")?;
    let judge = OpenAiJudgeClient::new(&config.openai_base_url, config.openai_api_key.clone());
    let engine = LocalEngine::new(&config.artifact_dir, Arc::new(judge));

    Ok(AppState::new(
        Arc::new(store),
        Arc::new(engine),
        config.upload_dir.clone(),
        RateLimiter::per_minute(config.rate_limit),
    )
    .trust_forwarded(config.trust_forwarded))
}

/// Periodically drop expired rate-limit windows.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                debug!(removed, remaining = limiter.tracked_clients(), "rate limit sweep");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub async fn serve(config: Config) -> Result<()> {
    let state = build_state(&config).await?;
    let sweeper = spawn_sweeper(state.limiter.clone(), SWEEP_INTERVAL);
    let app = build_router(state, &config.cors_origin);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(
        bind = %config.bind,
        upload_dir = %config.upload_dir.display(),
        artifact_dir = %config.artifact_dir.display(),
        "simpld listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    Ok(())
}
