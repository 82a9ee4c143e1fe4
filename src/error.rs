use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ReporterError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template is inactive: {0}")]
    TemplateInactive(String),

    #[error("No active integration configured for {0}")]
    IntegrationMissing(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Upstream returned an error payload: {0}")]
    UpstreamPayload(String),

    #[error("Upstream payload has no recognizable job list")]
    UnrecognizedPayload,

    #[error("Bacula data unavailable after {strategies} strategies: {last_error}")]
    SourceUnavailable {
        strategies: usize,
        last_error: String,
    },

    #[error("Ractor error: {0}")]
    RactorError(String),
}

/// Whether a failed upstream call is worth another attempt.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ReporterError {
    fn is_retryable(&self) -> bool {
        match self {
            ReporterError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ReporterError::UpstreamStatus(code) => {
                code.is_server_error() || *code == StatusCode::TOO_MANY_REQUESTS
            }
            ReporterError::UpstreamPayload(_) => true,
            _ => false,
        }
    }
}

impl ReporterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReporterError::InvalidRequest(_) | ReporterError::Json(_) => StatusCode::BAD_REQUEST,
            ReporterError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attach the elapsed run time so the response can report it.
    pub fn with_elapsed(self, execution_time_ms: u64) -> RunFailure {
        RunFailure {
            error: self,
            execution_time_ms,
        }
    }
}

impl IntoResponse for ReporterError {
    fn into_response(self) -> axum::response::Response {
        self.with_elapsed(0).into_response()
    }
}

/// A run that could not produce a report.
#[derive(Debug)]
pub struct RunFailure {
    pub error: ReporterError,
    pub execution_time_ms: u64,
}

/// Failure body shared by every report route.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: String,
    pub execution_time_ms: u64,
    pub timestamp: String,
}

impl IntoResponse for RunFailure {
    fn into_response(self) -> axum::response::Response {
        let status = self.error.status_code();
        let body = ApiErrorResponse {
            success: false,
            error: self.error.to_string(),
            execution_time_ms: self.execution_time_ms,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_not_retryable() {
        assert!(!ReporterError::TemplateNotFound("x".into()).is_retryable());
        assert!(!ReporterError::IntegrationMissing("bacula".into()).is_retryable());
        assert!(!ReporterError::UpstreamStatus(StatusCode::NOT_FOUND).is_retryable());
    }

    #[test]
    fn server_side_upstream_failures_are_retryable() {
        assert!(ReporterError::UpstreamStatus(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(ReporterError::UpstreamStatus(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(ReporterError::UpstreamPayload("timeout".into()).is_retryable());
    }

    #[test]
    fn status_codes_follow_error_tier() {
        assert_eq!(
            ReporterError::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ReporterError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ReporterError::SourceUnavailable {
                strategies: 3,
                last_error: "down".into()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
