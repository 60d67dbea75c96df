/// Error types for the event feed service
///
/// Every error that reaches the HTTP boundary is fatal for the request and is
/// rendered as `500 {"error": "..."}`. Degraded dependencies are handled
/// before they get here.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for feed service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Neither the ranking source nor the recency fallback produced a page
    #[error("Feed unavailable: {0}")]
    RankingUnavailable(String),

    /// Request body could not be parsed at all
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}
