//! API routes for devoptd
//!
//! Form posts from the dashboard redirect back to `/`; `/v1/*` and
//! `/health` answer JSON.

use crate::dashboard;
use crate::server::AppState;
use crate::session::RunTicket;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Redirect},
    routing::{get, post},
    Json, Router,
};
use devopt_common::{Phase, SessionState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

type AppStateArc = Arc<AppState>;

// ============================================================================
// Dashboard
// ============================================================================

pub fn dashboard_routes() -> Router<AppStateArc> {
    Router::new().route("/", get(show_dashboard))
}

async fn show_dashboard(State(state): State<AppStateArc>) -> Html<String> {
    let session = state.snapshot();
    Html(dashboard::render(&session, state.controller.engine_name()))
}

// ============================================================================
// Analysis actions
// ============================================================================

pub fn analysis_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/analysis/run", post(run_analysis))
        .route("/analysis/apply", post(apply_changes))
        .route("/analysis/reset", post(reset_session))
}

/// Enter Running and hand the pipeline to a background task, then redirect.
/// The Running page refreshes itself until the task stores the results.
async fn run_analysis(State(state): State<AppStateArc>) -> Redirect {
    let controller = state.controller.clone();

    let mut accepted = None;
    state.update(|current| match controller.begin(current) {
        Ok((running, ticket)) => {
            accepted = Some(ticket);
            running
        }
        Err(rejected) => rejected,
    });

    if let Some(ticket) = accepted {
        tokio::spawn(finish_run(state, ticket));
    }

    Redirect::to("/")
}

/// Runs on its own task, independent of the request that started it
async fn finish_run(state: AppStateArc, ticket: RunTicket) {
    let controller = state.controller.clone();
    let worker = controller.clone();

    match tokio::task::spawn_blocking(move || worker.run_pipeline()).await {
        Ok(report) => {
            state.update(|current| controller.complete(current, ticket, report));
        }
        Err(e) => {
            error!("Analysis worker failed: {}", e);
            let reason = e.to_string();
            state.update(|current| controller.abort(current, ticket, &reason));
        }
    }
}

async fn apply_changes(State(state): State<AppStateArc>) -> Result<Redirect, (StatusCode, String)> {
    info!("Applying editor settings changes");
    let worker = state.clone();
    tokio::task::spawn_blocking(move || {
        let controller = worker.controller.clone();
        worker.update(|current| controller.apply_config_changes(current));
    })
    .await
    .map_err(|e| {
        error!("Apply worker failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Redirect::to("/"))
}

async fn reset_session(State(state): State<AppStateArc>) -> Redirect {
    let controller = state.controller.clone();
    state.update(|current| controller.reset(current));
    Redirect::to("/")
}

// ============================================================================
// Session
// ============================================================================

pub fn session_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/session", get(get_session))
}

async fn get_session(State(state): State<AppStateArc>) -> Json<SessionState> {
    Json(state.snapshot())
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub engine: String,
    pub phase: Phase,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        engine: state.controller.engine_name().to_string(),
        phase: state.session().phase,
    })
}
