//! # TaskFlow
//!
//! Headless TaskFlow process: mounts the configured store, keeps a session
//! in sync with it, and runs the daily overdue-reminder routine.
//!
//! ## Usage
//!
//! ```bash
//! TASKFLOW_BACKEND=shared REDIS_URL=redis://localhost:6379 cargo run -p taskflow-app
//! ```

use taskflow_app::bootstrap::App;
use taskflow_app::config::{AppConfig, LogFormat};
use taskflow_app::runner;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskflow_app=debug,taskflow_shared=info,taskflow_notifier=info".into());
    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    tracing::info!("TaskFlow v{} starting...", env!("CARGO_PKG_VERSION"));

    let app = App::start(config).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received, exiting...");
        signal.cancel();
    });

    runner::run(&app, shutdown).await
}
