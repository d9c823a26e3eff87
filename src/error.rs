//! Error codes and the JSON error body returned by the HTTP API.
//!
//! DESIGN
//! ======
//! Every service error enum implements `ErrorCode` so handlers can surface a
//! grepable `E_*` code and a retryable flag alongside the HTTP status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Grepable error code and retryable flag for structured error responses.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

/// HTTP status plus structured body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, err: &impl ErrorCode) -> Self {
        Self {
            status,
            body: ErrorBody { code: err.error_code(), message: err.to_string(), retryable: err.retryable() },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
