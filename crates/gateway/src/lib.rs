//! HTTP gateway for coscientist.
//!
//! Exposes the orchestrator over REST:
//! - `GET /health` — liveness probe
//! - `GET /tools` — the registered tool catalog
//! - `POST /run` — submit a task and get the run outcome
//!
//! Built on Axum. The gateway is a thin shell: all orchestration behavior
//! lives in `coscientist-agent`, and the response shape keeps a completed
//! answer structurally distinct from a budget-exhausted run.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use coscientist_agent::{AgentLoop, RunOutcome};
use coscientist_core::tool::ToolRegistry;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: AgentLoop,
    pub tools: Arc<ToolRegistry>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tools", get(tools_handler))
        .route("/run", post(run_handler))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(
    config: &coscientist_config::GatewayConfig,
    state: SharedState,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Gateway listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct ToolsResponse {
    tools: Vec<coscientist_core::client::ToolDefinition>,
}

async fn tools_handler(State(state): State<SharedState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.tools.definitions(),
    })
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub task: String,

    /// Per-run override for the step budget
    #[serde(default)]
    pub max_steps: Option<u32>,

    /// Per-run override for the sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResponse {
    Completed { answer: String, steps: u32 },
    BudgetExhausted { steps: u32 },
}

async fn run_handler(
    State(state): State<SharedState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, (StatusCode, Json<serde_json::Value>)> {
    if request.task.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "task must not be empty" })),
        ));
    }

    let outcome = state
        .agent
        .run_with(&request.task, request.max_steps, request.temperature)
        .await
        .map_err(|e| {
            error!(error = %e, "Agent run failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        })?;

    Ok(Json(match outcome {
        RunOutcome::Answer { text, steps, .. } => RunResponse::Completed {
            answer: text,
            steps,
        },
        RunOutcome::BudgetExhausted { steps, .. } => RunResponse::BudgetExhausted { steps },
    }))
}
