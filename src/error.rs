use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::params::ValidationErrors;
use crate::store::StoreError;
use crate::summary::SummaryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Invalid query parameters: {0}")]
    Validation(ValidationErrors),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<SummaryError> for AppError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::InvalidDate(text) => {
                AppError::BadRequest(format!("invalid date bound: {}", text))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": msg})),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Json(json!({"error": msg}))),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Json(json!({"error": msg}))),
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({"errors": errors})))
            }
        };

        (status, body).into_response()
    }
}
