use crate::handlers::{config, creds, leases, roles};
use crate::service::{DatabaseBackend, LeaseManager};
use axum::Router;
use axum::routing::{get, put};
use std::sync::Arc;

#[derive(Clone)]
pub struct CredsState {
    pub backend: Arc<DatabaseBackend>,
    pub leases: Arc<LeaseManager>,
    api_key: Arc<str>,
}

impl CredsState {
    pub fn new(
        backend: Arc<DatabaseBackend>,
        leases: Arc<LeaseManager>,
        api_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            backend,
            leases,
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

pub fn creds_router(state: CredsState) -> Router {
    let v1 = Router::new()
        .route(
            "/config/connection",
            get(config::read_connection).post(config::write_connection),
        )
        .route("/config/lease", get(config::read_lease).post(config::write_lease))
        .route("/roles", get(roles::list_roles))
        .route(
            "/roles/{name}",
            get(roles::read_role)
                .post(roles::write_role)
                .delete(roles::delete_role),
        )
        .route("/creds/{name}", get(creds::issue_creds))
        .route("/leases/renew", put(leases::renew_lease))
        .route("/leases/revoke", put(leases::revoke_lease));

    Router::new().nest("/v1", v1).with_state(state)
}
