//! # Task Server
//!
//! Team task-management API server.
//!
//! This is the application entry point that initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Repository and job queue backends
//! - HTTP/WebSocket server and background jobs

use anyhow::Result;
use tracing::info;

use task_server::config::Settings;
use task_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment and config files
    let settings = Settings::load()?;

    // Initialize tracing subscriber for structured logging
    task_server::telemetry::init_tracing(settings.log.format);

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        database = ?settings.database.backend,
        jobs = ?settings.jobs.backend,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    info!("Server stopped");
    Ok(())
}
