//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use workflow::{SiblingOfferPolicy, WorkflowConfig};

/// Signing secret used when `JWT_SECRET` is not set. Only fit for local
/// development.
pub const DEV_JWT_SECRET: &str = "seedsmb-development-secret-change-me";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {name}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected pretty or json, got {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `JWT_SECRET`: HS256 secret for bearer tokens
/// - `SIBLING_OFFER_POLICY`: `leave_pending` or `reject`
/// - `OPERATION_TIMEOUT_MS`: per-operation timeout (default: `5000`)
/// - `FALLBACK_FIXTURES`: serve fixture data when the database is down
/// - `RECONCILE_INTERVAL_SECS`: periodic reconciliation; unset runs it at
///   start-up only
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub sibling_policy: SiblingOfferPolicy,
    pub operation_timeout: Duration,
    pub fallback_fixtures: bool,
    pub reconcile_interval: Option<Duration>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(&var, "PORT")?.unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(&var, "LOG_FORMAT")?.unwrap_or(defaults.log_format),
            database_url: var("DATABASE_URL"),
            database_max_connections: parse(&var, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            sibling_policy: parse(&var, "SIBLING_OFFER_POLICY")?
                .unwrap_or(defaults.sibling_policy),
            operation_timeout: parse::<u64, _>(&var, "OPERATION_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.operation_timeout),
            fallback_fixtures: parse(&var, "FALLBACK_FIXTURES")?
                .unwrap_or(defaults.fallback_fixtures),
            reconcile_interval: parse::<u64, _>(&var, "RECONCILE_INTERVAL_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig::default()
            .with_sibling_policy(self.sibling_policy)
            .with_operation_timeout(self.operation_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 10,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            sibling_policy: SiblingOfferPolicy::LeavePending,
            operation_timeout: Duration::from_millis(5000),
            fallback_fixtures: false,
            reconcile_interval: None,
        }
    }
}

fn parse<T, F>(var: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}
