//! # HTTP Ingress for Print Requests
//!
//! Turns a network connection into a text payload for the dispatch
//! coordinator.
//!
//! ## Usage
//!
//! ```bash
//! remito serve --listen 0.0.0.0:8080 --backend integrated
//! ```
//!
//! ## Contract
//!
//! - `POST /print`: any non-empty body is treated as UTF-8 text and
//!   dispatched. `200` with a confirmation body on success, `500` with the
//!   attempt-chain diagnostics when the fallback chain is exhausted,
//!   `400` for an empty payload. An optional `?backend=` query parameter
//!   overrides the configured preferred backend for that request.
//! - `GET /`: a minimal test form that posts raw text to `/print`.
//! - Anything else: `404`.
//!
//! Dispatch is blocking (USB transfers, spooler subprocesses), so the
//! handler runs it on the blocking thread pool.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::backend::BackendKind;
use crate::dispatch::{Dispatcher, PrintRequest};
use crate::error::RemitoError;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Backend tried first when the request carries no override.
    pub preferred: BackendKind,
}

/// Application state shared across handlers.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub preferred: BackendKind,
}

/// Optional query parameters for `/print`.
#[derive(Debug, Deserialize)]
pub struct PrintParams {
    /// Preferred-backend override (`thermal|spooler|integrated`).
    pub backend: Option<String>,
}

/// Build the ingress router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/print", post(print_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server. Returns when the listener shuts down; the
/// caller tears the backends down afterwards.
pub async fn serve(config: ServerConfig, dispatcher: Dispatcher) -> Result<(), RemitoError> {
    let state = Arc::new(AppState {
        dispatcher,
        preferred: config.preferred,
    });

    let app = router(state.clone());

    info!(addr = %config.listen_addr, preferred = %config.preferred, "print server starting");

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            RemitoError::TransportFailure(format!(
                "Failed to bind to {}: {}",
                config.listen_addr, e
            ))
        })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RemitoError::TransportFailure(format!("Server error: {}", e)))?;

    // Teardown runs once, regardless of backend state.
    state.dispatcher.disconnect_all();
    info!("print server stopped, backends released");

    Ok(())
}

async fn shutdown_signal() {
    // Ctrl-C failing to register would leave no way to stop cleanly;
    // pending() keeps the server running instead of aborting it.
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Handle GET / - return the test form.
async fn index_handler() -> Html<&'static str> {
    Html(TEST_PAGE)
}

/// Handle POST /print - dispatch the payload.
async fn print_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PrintParams>,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "Empty print payload\n").into_response();
    }

    let preferred = match params.backend.as_deref() {
        Some(raw) => match raw.parse::<BackendKind>() {
            Ok(kind) => kind,
            Err(e) => return (StatusCode::BAD_REQUEST, format!("{}\n", e)).into_response(),
        },
        None => state.preferred,
    };

    let text = String::from_utf8_lossy(&body).into_owned();
    let request = PrintRequest::new(text, preferred);
    info!(id = %request.correlation_id, bytes = body.len(), %preferred, "print request received");

    // The fallback chain blocks on USB transfers and spooler subprocesses.
    let outcome = tokio::task::spawn_blocking(move || state.dispatcher.dispatch(&request)).await;

    match outcome {
        Ok(outcome) if outcome.succeeded => {
            let backend = outcome
                .backend_used
                .map(|kind| kind.to_string())
                .unwrap_or_default();
            (
                StatusCode::OK,
                format!("Print job sent successfully via {} backend\n", backend),
            )
                .into_response()
        }
        Ok(outcome) => {
            warn!(chain = %outcome.describe(), "print request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to print: {}\n", outcome.describe()),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Dispatch task error: {}\n", e),
        )
            .into_response(),
    }
}

/// Handle unrecognized paths.
async fn not_found_handler() -> Response {
    (StatusCode::NOT_FOUND, "Not Found\n").into_response()
}

/// Test form posting raw text to `/print`.
const TEST_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Remito Print Server</title>
    <style>
        body { font-family: Arial, sans-serif; max-width: 640px; margin: 0 auto; padding: 20px; }
        textarea { width: 100%; height: 160px; padding: 8px; font-family: monospace; }
        button { padding: 10px 20px; margin-top: 8px; cursor: pointer; }
        #status { margin-top: 12px; padding: 10px; white-space: pre-wrap; }
    </style>
</head>
<body>
    <h1>Remito Print Server</h1>
    <p>Sends the text below to the print dispatcher.</p>
    <textarea id="payload">Hello World! This is a test print.</textarea><br>
    <button onclick="sendPrint()">Print</button>
    <div id="status"></div>
    <script>
        function sendPrint() {
            const text = document.getElementById('payload').value;
            const status = document.getElementById('status');
            status.innerText = 'Sending...';
            fetch('/print', { method: 'POST', body: text })
                .then(response => response.text())
                .then(result => { status.innerText = result; })
                .catch(error => { status.innerText = 'Error: ' + error; });
        }
    </script>
</body>
</html>"#;
