// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("No credits remaining")]
    InsufficientCredits,

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Caption API error: {0}")]
    CaptionApi(String),

    #[error("Image host error: {0}")]
    ImageHost(String),

    #[error("Messaging API error: {0}")]
    Messaging(String),

    #[error("Payment API error: {0}")]
    Payment(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures of a hosted collaborator (model, image host, chat, payments, store).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::CaptionApi(_)
                | AppError::ImageHost(_)
                | AppError::Messaging(_)
                | AppError::Payment(_)
                | AppError::Database(_)
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::InsufficientCredits => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                Some("Plus de crédits disponibles".to_string()),
            ),
            AppError::InvalidSignature(msg) => {
                tracing::warn!(reason = %msg, "Rejected webhook signature");
                (StatusCode::BAD_REQUEST, "invalid_signature", None)
            }
            AppError::CaptionApi(msg)
            | AppError::ImageHost(msg)
            | AppError::Messaging(msg)
            | AppError::Payment(msg) => {
                tracing::error!(error = %msg, kind = %self, "Upstream error");
                (StatusCode::BAD_GATEWAY, "upstream_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
