use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub auto_migrate: bool,
    pub request_timeout: Duration,
    pub log: LogConfig,
    pub hashing: HashingConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. Unset keys fall back to
    /// defaults, but a value that is present and unparsable is an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let log = LogConfig {
            filter: lookup("RUST_LOG").unwrap_or_else(|| {
                "account_service=debug,axum=info,tower_http=info".to_string()
            }),
            json: lookup("LOG_FORMAT").map(|v| v == "json").unwrap_or(false),
        };
        let hashing = HashingConfig {
            memory_kib: parse_or(&lookup, "HASH_MEMORY_KIB", argon2::Params::DEFAULT_M_COST)?,
            iterations: parse_or(&lookup, "HASH_ITERATIONS", argon2::Params::DEFAULT_T_COST)?,
            parallelism: parse_or(&lookup, "HASH_PARALLELISM", argon2::Params::DEFAULT_P_COST)?,
        };
        let timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(anyhow!("REQUEST_TIMEOUT_SECS must be greater than zero"));
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "APP_PORT", 8080)?,
            auto_migrate: parse_bool_or(&lookup, "AUTO_MIGRATE", true)?,
            request_timeout: Duration::from_secs(timeout_secs),
            log,
            hashing,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid value for {key}: {e}")),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("invalid value for {key}: {other:?}")),
    }
}
