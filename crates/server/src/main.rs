mod assistant;
mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use slackforce_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use slackforce_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(&app.config.mcp.command, &app.config.llm.model),
    )
    .await?;

    let shutdown = app.shutdown.clone();
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let mut runner = tokio::spawn(async move {
        app.slack_runner.start(&app.shutdown).await;
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "slackforce-server started"
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "slackforce-server stopping"
            );
            shutdown.cancel();
            if tokio::time::timeout(grace, &mut runner).await.is_err() {
                tracing::warn!(
                    event_name = "system.server.shutdown_timeout",
                    correlation_id = "shutdown",
                    "in-flight runs did not finish before the grace period"
                );
                runner.abort();
            }
        }
        joined = &mut runner => {
            joined?;
            tracing::warn!(
                event_name = "system.server.socket_stopped",
                correlation_id = "shutdown",
                "socket mode runner exited"
            );
        }
    }

    Ok(())
}
