use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use slackforce_mcp::resolve_command;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    mcp_command: Arc<str>,
    model: Arc<str>,
}

impl HealthState {
    pub fn new(mcp_command: &str, model: &str) -> Self {
        Self { mcp_command: Arc::from(mcp_command), model: Arc::from(model) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub mcp: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let mcp = mcp_check(&state.mcp_command);
    let ready = mcp.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("slackforce-server answering with `{}`", state.model),
        },
        mcp,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

// Sessions are opened per run, so readiness can only check that the server can be launched.
fn mcp_check(command: &str) -> HealthCheck {
    match resolve_command(command) {
        Ok(path) => HealthCheck {
            status: "ready",
            detail: format!("tool server command resolved to {}", path.display()),
        },
        Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
    }
}
