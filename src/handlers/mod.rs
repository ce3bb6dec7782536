//! HTTP handlers for the `/v1` API. Every handler requires the API key.

pub mod config;
pub mod creds;
pub mod leases;
pub mod roles;
