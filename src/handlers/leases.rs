use crate::error::CredsError;
use crate::middleware::auth::RequireKeyAuth;
use crate::router::CredsState;
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct RenewRequest {
    pub lease_id: String,
    /// Requested extension; zero or absent uses the policy default.
    #[serde(default, with = "humantime_serde")]
    pub increment: Duration,
}

#[derive(Debug, Serialize)]
pub struct RenewResponse {
    pub lease_id: String,
    pub lease_duration: u64,
    pub expire_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub lease_id: String,
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub lease_id: String,
    pub warnings: Vec<String>,
}

/// PUT /v1/leases/renew
pub async fn renew_lease(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
    Json(request): Json<RenewRequest>,
) -> Result<Json<RenewResponse>, CredsError> {
    let lease = state
        .leases
        .renew(&request.lease_id, request.increment)
        .await?;
    Ok(Json(RenewResponse {
        lease_id: lease.lease_id,
        lease_duration: lease.ttl.as_secs(),
        expire_time: lease.expire_time,
    }))
}

/// PUT /v1/leases/revoke
pub async fn revoke_lease(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
    Json(request): Json<RevokeRequest>,
) -> Result<Json<RevokeResponse>, CredsError> {
    let outcome = state.leases.revoke(&request.lease_id).await?;
    Ok(Json(RevokeResponse {
        lease_id: request.lease_id,
        warnings: outcome.warnings,
    }))
}
