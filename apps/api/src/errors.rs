use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::import::normalize::ValidationError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request never reached the normalizer: bad query, body or size.
    #[error("Request rejected: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OwnerNotFound(owner) => AppError::NotFound(format!("user {owner}")),
            other => AppError::Store(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(msg) => {
                let body = Json(json!({ "error": format!("Not found: {msg}"), "code": "NOT_FOUND" }));
                (StatusCode::NOT_FOUND, body).into_response()
            }
            AppError::Validation(err) => {
                let body = Json(json!({
                    "error": err.to_string(),
                    "code": "VALIDATION_ERROR",
                    "fields": err.fields,
                }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            AppError::Rejected { status, message } => {
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "BAD_REQUEST"
                };
                (status, Json(json!({ "error": message, "code": code }))).into_response()
            }
            // Store detail is logged where the failure is reported, never returned.
            AppError::Store(_) => {
                let body = Json(json!({
                    "error": "An internal server error occurred",
                    "code": "INTERNAL_ERROR",
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
