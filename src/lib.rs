pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

use shared::config::AppConfig;
use state::AppState;
use tracing::info;

/// Initialises the global tracing subscriber; `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chore_sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Runs the sync engine until Ctrl-C.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    info!(database = %config.database.url, "chore-sync starting...");
    let state = AppState::new(config).await?;
    let handles = state.start().await?;

    let status = state.engine.status().await?;
    info!(
        pending_mutations = status.pending_mutations,
        pending_photos = status.pending_photos,
        online = status.online,
        "chore-sync running"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    for handle in handles {
        handle.abort();
    }
    state.shutdown().await;
    Ok(())
}
