use crate::error::CredsError;
use crate::middleware::auth::RequireKeyAuth;
use crate::router::CredsState;
use crate::types::RoleEntry;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(alias = "creation_sql")]
    pub sql: String,
    #[serde(default)]
    pub revocation_sql: Option<String>,
    #[serde(default)]
    pub terminate_sessions: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RoleList {
    pub keys: Vec<String>,
}

/// GET /v1/roles
pub async fn list_roles(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
) -> Result<Json<RoleList>, CredsError> {
    let keys = state.backend.roles().list().await?;
    Ok(Json(RoleList { keys }))
}

/// GET /v1/roles/{name}
pub async fn read_role(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
    Path(name): Path<String>,
) -> Result<Json<RoleEntry>, CredsError> {
    state
        .backend
        .roles()
        .get(&name)
        .await?
        .map(Json)
        .ok_or(CredsError::UnknownRole(name))
}

/// POST /v1/roles/{name}
pub async fn write_role(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
    Path(name): Path<String>,
    Json(request): Json<RoleRequest>,
) -> Result<StatusCode, CredsError> {
    let entry = RoleEntry {
        name,
        creation_sql: request.sql,
        revocation_sql: request.revocation_sql,
        terminate_sessions: request.terminate_sessions.unwrap_or(true),
    };
    state.backend.roles().put(entry).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/roles/{name}
pub async fn delete_role(
    _auth: RequireKeyAuth,
    State(state): State<CredsState>,
    Path(name): Path<String>,
) -> Result<StatusCode, CredsError> {
    state.backend.roles().delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
