use crate::error::CredsError;
use crate::middleware::auth::RequireKeyAuth;
use crate::router::CredsState;
use crate::service::SecretsBackend;
use crate::types::{ConnectionConfigRequest, ConnectionSettings, LeasePolicy};
use axum::{Json, extract::State, http::StatusCode};

/// POST /v1/config/connection
pub async fn write_connection(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
    Json(request): Json<ConnectionConfigRequest>,
) -> Result<StatusCode, CredsError> {
    state.backend.configure(request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/config/connection -> settings with the password redacted.
pub async fn read_connection(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
) -> Result<Json<ConnectionSettings>, CredsError> {
    Ok(Json(state.backend.connection_settings().await?))
}

/// POST /v1/config/lease
pub async fn write_lease(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
    Json(policy): Json<LeasePolicy>,
) -> Result<StatusCode, CredsError> {
    state.backend.lease_policy().put(policy).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/config/lease
pub async fn read_lease(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
) -> Result<Json<LeasePolicy>, CredsError> {
    Ok(Json(state.backend.lease_policy().get_or_default().await?))
}
