//! Configuration loading from environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Application configuration.
#[derive(Debug)]
pub struct Config {
    pub app_env: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_conn_max_lifetime: Duration,
    pub db_query_timeout: Duration,
    pub jwt_secret: String,
    pub jwt_access_ttl: Duration,
    pub jwt_refresh_ttl: Duration,
    pub service_key_hex: String,
    pub service_iv_hex: String,
    pub service_key_dev_bypass: Option<String>,
    pub service_key_public_paths: Vec<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub upload_root: PathBuf,
    pub demo_stats: bool,
    pub shutdown_grace: Duration,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            app_env: optional("APP_ENV").unwrap_or_else(|| "development".to_string()),
            port: parsed("APP_PORT", 8080)?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 25)?,
            db_min_connections: parsed("DB_MIN_CONNECTIONS", 10)?,
            db_conn_max_lifetime: Duration::from_secs(parsed("DB_CONN_MAX_LIFETIME_SECS", 300)?),
            db_query_timeout: Duration::from_secs(parsed("DB_QUERY_TIMEOUT_SECS", 5)?),
            jwt_secret: required("JWT_SECRET")?,
            jwt_access_ttl: Duration::from_secs(
                required("JWT_ACCESS_TTL_SECS")?
                    .parse()
                    .context("JWT_ACCESS_TTL_SECS must be a number of seconds")?,
            ),
            jwt_refresh_ttl: Duration::from_secs(parsed("JWT_REFRESH_TTL_SECS", 604_800)?),
            service_key_hex: required("SERVICE_KEY_HEX")?,
            service_iv_hex: required("SERVICE_IV_HEX")?,
            service_key_dev_bypass: optional("SERVICE_KEY_DEV_BYPASS"),
            service_key_public_paths: optional("SERVICE_KEY_PUBLIC_PATHS")
                .unwrap_or_else(|| "swagger,webhook,scalar".to_string())
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect(),
            rate_limit_requests: parsed("RATE_LIMIT_REQUESTS", 100)?,
            rate_limit_window: Duration::from_secs(parsed("RATE_LIMIT_WINDOW_SECS", 60)?),
            upload_root: optional("UPLOAD_ROOT")
                .unwrap_or_else(|| "public/uploads".to_string())
                .into(),
            demo_stats: parsed("DEMO_STATS", false)?,
            shutdown_grace: Duration::from_secs(parsed("SHUTDOWN_GRACE_SECS", 10)?),
            otlp_endpoint: optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

/// `APP_ENV=production` skips `.env` loading.
pub fn is_production_env() -> bool {
    optional("APP_ENV").is_some_and(|v| v == "production")
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str) -> anyhow::Result<String> {
    optional(key).ok_or_else(|| anyhow::anyhow!("{key} environment variable is required"))
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}
