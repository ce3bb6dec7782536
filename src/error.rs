use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CredsError {
    #[error("configure the database connection with config/connection first")]
    NotConfigured,

    #[error("database connection error: {0}")]
    ConnectionError(#[source] SqlxError),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// The driver message, with the generated password scrubbed out.
    #[error("credential creation failed: {0}")]
    CreationFailed(String),

    #[error("credential revocation failed: {0}")]
    RevocationFailed(#[source] SqlxError),

    #[error("lease is not renewable: {0}")]
    LeaseNotRenewable(String),

    #[error("random source failed: {0}")]
    EntropyExhausted(#[from] rand::Error),

    #[error("secret is missing username internal data")]
    MissingUsername,

    #[error("lease not found: {0}")]
    LeaseNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] SqlxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CredsError {
    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CredsError::NotConfigured => "NOT_CONFIGURED",
            CredsError::ConnectionError(_) => "CONNECTION_ERROR",
            CredsError::UnknownRole(_) => "UNKNOWN_ROLE",
            CredsError::CreationFailed(_) => "CREATION_FAILED",
            CredsError::RevocationFailed(_) => "REVOCATION_FAILED",
            CredsError::LeaseNotRenewable(_) => "LEASE_NOT_RENEWABLE",
            CredsError::EntropyExhausted(_) => "ENTROPY_EXHAUSTED",
            CredsError::MissingUsername => "MISSING_USERNAME",
            CredsError::LeaseNotFound(_) => "LEASE_NOT_FOUND",
            CredsError::InvalidRequest(_) => "INVALID_REQUEST",
            CredsError::Storage(_) | CredsError::Json(_) | CredsError::Task(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

impl IntoResponse for CredsError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            CredsError::NotConfigured
            | CredsError::InvalidRequest(_)
            | CredsError::LeaseNotRenewable(_) => StatusCode::BAD_REQUEST,
            CredsError::UnknownRole(_) | CredsError::LeaseNotFound(_) => StatusCode::NOT_FOUND,
            CredsError::ConnectionError(_) => StatusCode::BAD_GATEWAY,
            // Template errors are reported verbatim so operators can fix the role.
            CredsError::CreationFailed(_) | CredsError::RevocationFailed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CredsError::EntropyExhausted(_)
            | CredsError::MissingUsername
            | CredsError::Storage(_)
            | CredsError::Json(_)
            | CredsError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            CredsError::Storage(_) | CredsError::Json(_) | CredsError::Task(_) => {
                "An internal server error occurred.".to_string()
            }
            other => other.to_string(),
        };

        let body = ApiErrorBody {
            code: self.code().to_string(),
            message,
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
