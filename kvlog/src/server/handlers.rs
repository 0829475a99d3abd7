//! HTTP route handlers for the log server.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use super::error::ApiError;
use super::metrics::{Metrics, RequestLabels};
use crate::protocol::{self, Request, Response};
use crate::{Error, Log};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub log: Arc<Log>,
    pub metrics: Arc<Metrics>,
}

/// Handle POST /api/v1/log
///
/// Accepts any protocol request as a tagged JSON body and replies with the
/// matching `*_ok` message, or an `error` message on failure. Bodies that
/// are not a known request are rejected as malformed.
pub async fn handle_request(
    State(state): State<AppState>,
    payload: Result<Json<Request>, JsonRejection>,
) -> Result<Json<Response>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ApiError::from(Error::InvalidInput(e.body_text())))?;
    let labels = RequestLabels::from(request.kind());
    state.metrics.log_requests.get_or_create(&labels).inc();

    let response = match protocol::dispatch(&state.log, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(request = %labels.request, error = %e, "request failed");
            state
                .metrics
                .log_request_failures
                .get_or_create(&labels)
                .inc();
            return Err(ApiError::from(e));
        }
    };

    match &response {
        Response::SendOk { .. } => {
            state.metrics.log_messages_sent.inc();
        }
        Response::PollOk { msgs } => {
            let polled: usize = msgs.values().map(Vec::len).sum();
            state.metrics.log_messages_polled.inc_by(polled as u64);
        }
        _ => {}
    }

    Ok(Json(response))
}

/// Handle GET /metrics
pub async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.encode()
}

/// Handle GET /-/healthy
///
/// Returns 200 OK while the process is serving.
pub async fn handle_healthy() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Handle GET /-/ready
///
/// Returns 200 OK once the backing store answers reads.
pub async fn handle_ready(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.log.check_storage().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
        }
    }
}
