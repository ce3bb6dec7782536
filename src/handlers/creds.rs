use crate::error::CredsError;
use crate::middleware::auth::RequireKeyAuth;
use crate::router::CredsState;
use crate::types::LeaseMetadata;
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::Serialize;

const DISPLAY_NAME_HEADER: &str = "x-display-name";
const DEFAULT_DISPLAY_NAME: &str = "token";

#[derive(Serialize)]
pub struct CredsData {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct CredsResponse {
    pub lease_id: String,
    /// Seconds until the lease expires.
    pub lease_duration: u64,
    pub renewable: bool,
    pub data: CredsData,
    pub metadata: LeaseMetadata,
}

/// GET /v1/creds/{name} -> creates a new principal for the role.
pub async fn issue_creds(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CredsResponse>, CredsError> {
    let display_name = headers
        .get(DISPLAY_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_DISPLAY_NAME);

    let (cred, lease) = state.leases.issue(&name, display_name).await?;
    Ok(Json(CredsResponse {
        lease_id: lease.lease_id,
        lease_duration: lease.ttl.as_secs(),
        renewable: true,
        data: CredsData {
            username: cred.username.clone(),
            password: cred.password.clone(),
        },
        metadata: lease.metadata,
    }))
}
