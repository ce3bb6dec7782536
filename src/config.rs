use crate::service::TtlDefaults;
use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

/// Process configuration, read from `DBCREDS_*` environment variables on
/// top of [`Config::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_addr: String,
    /// SQLite URL of the key-value store holding roles, settings and leases.
    pub storage_url: String,
    pub loglevel: String,
    pub api_key: String,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub system_max_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let ttl = TtlDefaults::default();
        Self {
            listen_addr: "0.0.0.0:8200".to_string(),
            storage_url: "sqlite:dbcreds.sqlite".to_string(),
            loglevel: "info".to_string(),
            api_key: String::new(),
            sweep_interval: Duration::from_secs(30),
            default_ttl: ttl.default_ttl,
            system_max_ttl: ttl.max_ttl,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("DBCREDS_"))
            .extract()
    }

    pub fn ttl_defaults(&self) -> TtlDefaults {
        TtlDefaults {
            default_ttl: self.default_ttl,
            max_ttl: self.system_max_ttl,
        }
    }
}

pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::from_env().expect("invalid DBCREDS_* configuration"));
