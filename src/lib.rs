//! careflow: clinical order intake with duplicate detection and
//! asynchronous care plan generation.
//!
//! An incoming order passes three duplicate checks (provider, patient,
//! order) inside one transaction, then a background worker generates the
//! care plan and pushes the finished order view to SSE subscribers.

pub mod admission;
pub mod api;
pub mod config;
pub mod db;
pub mod events;
pub mod llm;
pub mod models;
pub mod queue;

use config::Config;
use events::OrderEvents;

/// Run the service until shutdown: open the database, start the generation
/// worker, and serve the HTTP API.
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        version = config::APP_VERSION,
        db = %config.database_path.display(),
        addr = %config.bind_addr,
        "Starting {}",
        config::APP_NAME
    );

    let conn = db::sqlite::open_database(&config.database_path)?;
    let events = OrderEvents::new();

    // Worker runs on its own thread with its own connection; the handle
    // joins it on drop at the end of run().
    let _worker = queue::start_worker(config.clone(), events.clone());

    let router = api::api_router(api::ApiContext::new(conn, events));
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
    } else {
        tracing::info!("Shutdown signal received");
    }
}
