//! HTTP surface over the agent.
//!
//! - `POST /run-agent` with `{question, file_name}` returns `{answer, evidence}`
//! - `GET /health` for liveness checks

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use insight_agent::{AgentOrchestrator, AgentResult, CampaignDataset};
use insight_core::AppResult;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AgentOrchestrator>,

    /// Where `file_name` is looked up
    pub dataset_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct RunAgentRequest {
    pub question: String,

    #[serde(default)]
    pub file_name: Option<String>,
}

type ApiError = (StatusCode, Json<Value>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/run-agent", post(run_agent))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_agent(
    State(state): State<AppState>,
    payload: Result<Json<RunAgentRequest>, JsonRejection>,
) -> Result<Json<AgentResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!("Rejected request body: {}", rejection.body_text());
        error_response(StatusCode::BAD_REQUEST, &rejection.body_text())
    })?;

    if request.question.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "question must not be empty",
        ));
    }

    let dataset = match request.file_name {
        Some(file_name) => {
            let dir = state.dataset_dir.clone();
            load_dataset(move || CampaignDataset::from_dir(&dir, &file_name)).await
        }
        None => None,
    };

    match state.orchestrator.answer(&request.question, dataset).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::error!(kind = e.kind(), "Agent run failed: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
            ))
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

/// Load campaign data off the async runtime.
///
/// An unreadable dataset only costs the summary, so it is logged, not fatal.
pub(crate) async fn load_dataset<F>(load: F) -> Option<Arc<CampaignDataset>>
where
    F: FnOnce() -> AppResult<CampaignDataset> + Send + 'static,
{
    match tokio::task::spawn_blocking(load).await {
        Ok(Ok(dataset)) => Some(Arc::new(dataset)),
        Ok(Err(e)) => {
            tracing::warn!("Campaign data unavailable: {}", e);
            None
        }
        Err(e) => {
            tracing::warn!("Campaign data loader panicked: {}", e);
            None
        }
    }
}
