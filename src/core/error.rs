//! Error types and handling for the hook engine server.
//!
//! This module provides a unified error type [`AppError`] that wraps the hook
//! taxonomy and implements proper HTTP response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::scripting::{HookError, HookErrorKind};

/// Main error type for the HTTP layer.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (file not found, parse errors, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Hook validation or execution failures
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Authentication/authorization failures
    #[error("Unauthorized")]
    Unauthorized,

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request body that is well-formed JSON but not the expected shape
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Generic internal server errors with custom message
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error payload returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": {
        "message": "Error: boom",
        "type": "execution_error",
        "code": 422
    }
}))]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Human readable message; engine messages are passed through verbatim
    pub message: String,
    /// Error classification
    #[serde(rename = "type")]
    pub error_type: String,
    /// HTTP status code
    pub code: u16,
}

fn hook_status(kind: HookErrorKind) -> StatusCode {
    match kind {
        HookErrorKind::ScriptEmpty
        | HookErrorKind::ConfigValidation
        | HookErrorKind::InvalidHeaders
        | HookErrorKind::InvalidBody => StatusCode::BAD_REQUEST,
        HookErrorKind::ExecutionError => StatusCode::UNPROCESSABLE_ENTITY,
        HookErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        HookErrorKind::TransportError => StatusCode::BAD_GATEWAY,
    }
}

fn kind_name(kind: HookErrorKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "internal".to_string())
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Hook(e) => hook_status(e.kind()),
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_type(&self) -> String {
        match self {
            AppError::Hook(e) => kind_name(e.kind()),
            AppError::Unauthorized => "unauthorized".to_string(),
            AppError::NotFound(_) => "not_found".to_string(),
            AppError::BadRequest(_) => "bad_request".to_string(),
            AppError::Config(_) | AppError::Internal(_) => {
                "internal".to_string()
            }
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Hook(e) => e.detail(),
            AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::Internal(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = json!({
            "error": {
                "message": self.message(),
                "type": self.error_type(),
                "code": status.as_u16()
            }
        });

        (status, Json(body)).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
