use cinelock_core::{RefreshPolicy, MAX_HOLD_SECONDS};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub locks: LockRules,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: Option<String>,
    pub database_url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String { "cinelock".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct LockRules {
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
    // 0 disables the periodic sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_max_seats")]
    pub max_seats_per_finalize: usize,
}

fn default_hold_seconds() -> u64 { 600 }
fn default_sweep_interval() -> u64 { 30 }
fn default_max_seats() -> usize { 10 }

impl Default for LockRules {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            refresh_policy: RefreshPolicy::default(),
            sweep_interval_seconds: default_sweep_interval(),
            max_seats_per_finalize: default_max_seats(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CINELOCK__LOCKS__HOLD_SECONDS=420`
            .add_source(config::Environment::with_prefix("CINELOCK").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.locks.hold_seconds == 0 || self.locks.hold_seconds > MAX_HOLD_SECONDS {
            return Err(config::ConfigError::Message(format!(
                "locks.hold_seconds must be between 1 and {}",
                MAX_HOLD_SECONDS
            )));
        }
        if self.locks.max_seats_per_finalize == 0 {
            return Err(config::ConfigError::Message("locks.max_seats_per_finalize must be greater than 0".into()));
        }
        match self.store.backend {
            StoreBackend::Redis if self.store.redis_url.is_none() => {
                Err(config::ConfigError::Message("store.redis_url is required for the redis backend".into()))
            }
            StoreBackend::Postgres if self.store.database_url.is_none() => {
                Err(config::ConfigError::Message("store.database_url is required for the postgres backend".into()))
            }
            _ => Ok(()),
        }
    }
}
