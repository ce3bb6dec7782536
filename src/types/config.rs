use crate::db::Dialect;
use crate::error::CredsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const REDACTED: &str = "redacted";

fn default_max_open_connections() -> u32 {
    2
}

fn default_verify_connection() -> bool {
    true
}

/// Stored under `config/connection`.
///
/// `connection_url` takes precedence; `connection_string` is accepted for
/// older configurations that used that field name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub connection_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub connection_string: String,
    #[serde(default = "default_max_open_connections")]
    pub max_open_connections: u32,
    #[serde(default)]
    pub max_idle_connections: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_url: String::new(),
            connection_string: String::new(),
            max_open_connections: default_max_open_connections(),
            max_idle_connections: 0,
        }
    }
}

impl ConnectionConfig {
    pub fn url(&self) -> &str {
        if self.connection_url.is_empty() {
            &self.connection_string
        } else {
            &self.connection_url
        }
    }

    /// Idle connections the pool keeps warm; never more than the open limit.
    pub fn idle_connections(&self) -> u32 {
        self.max_idle_connections.min(self.max_open_connections)
    }

    pub fn dialect(&self) -> Result<Dialect, CredsError> {
        Dialect::from_url(self.url())
    }

    pub fn validate(&self) -> Result<(), CredsError> {
        if self.url().trim().is_empty() {
            return Err(CredsError::InvalidRequest(
                "connection_url must be set".to_string(),
            ));
        }
        if self.max_open_connections == 0 {
            return Err(CredsError::InvalidRequest(
                "max_open_connections must be greater than zero".to_string(),
            ));
        }
        self.dialect().map(|_| ())
    }

    /// Settings safe to hand back to API callers.
    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            connection_url: redact_url(self.url()),
            max_open_connections: self.max_open_connections,
            max_idle_connections: self.max_idle_connections,
        }
    }
}

/// Replace any password embedded in a connection URL.
fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some(REDACTED)).is_err() {
                return REDACTED.to_string();
            }
            url.to_string()
        }
        // Not a URL we can reason about, so it may hide credentials anywhere.
        Err(_) => REDACTED.to_string(),
    }
}

/// Body accepted by `config/connection` writes.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfigRequest {
    #[serde(flatten)]
    pub config: ConnectionConfig,
    #[serde(default = "default_verify_connection")]
    pub verify_connection: bool,
}

/// Non-secret view of [`ConnectionConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub connection_url: String,
    pub max_open_connections: u32,
    pub max_idle_connections: u32,
}

/// Stored under `config/lease`. Zero durations defer to the host defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeasePolicy {
    #[serde(default, with = "humantime_serde")]
    pub lease: Duration,
    #[serde(default, with = "humantime_serde")]
    pub lease_max: Duration,
}

impl LeasePolicy {
    pub fn validate(&self) -> Result<(), CredsError> {
        if !self.lease_max.is_zero() && self.lease > self.lease_max {
            return Err(CredsError::InvalidRequest(
                "lease must not exceed lease_max".to_string(),
            ));
        }
        Ok(())
    }
}
