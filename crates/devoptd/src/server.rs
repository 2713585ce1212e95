//! HTTP server for devoptd

use crate::routes;
use crate::session::SessionController;
use anyhow::{Context, Result};
use axum::Router;
use devopt_common::SessionState;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub controller: Arc<SessionController>,
    session: Mutex<SessionState>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self {
            controller,
            session: Mutex::new(SessionState::default()),
            start_time: Instant::now(),
        }
    }

    /// Lock the session; poisoning is ignored since updates swap whole values
    pub fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the session with `f(current)`
    pub fn update<F>(&self, f: F) -> SessionState
    where
        F: FnOnce(SessionState) -> SessionState,
    {
        let mut guard = self.session();
        let next = f(std::mem::take(&mut *guard));
        *guard = next.clone();
        next
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> SessionState {
        self.session().clone()
    }
}

/// All routes with tracing, ready to serve or to drive from tests
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::dashboard_routes())
        .merge(routes::analysis_routes())
        .merge(routes::session_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server
pub async fn run(state: AppState, bind: &str) -> Result<()> {
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("[BOOT] Listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down gracefully");
    }
}
