//! HTTP error types for the log server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::Error;
use crate::protocol::Response as Reply;

/// Error wrapper for converting log errors to HTTP responses.
///
/// The body is the protocol's error reply:
/// ```json
/// { "type": "error", "code": 11, "text": "..." }
/// ```
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::RetryExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Storage(_) | Error::Encoding(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(Reply::from(&self.0))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}
