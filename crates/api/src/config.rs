use std::time::Duration;

use navigator_core::validation::DEFAULT_PIXEL_LIMIT;
use navigator_pipeline::progress::DEFAULT_PROGRESS_INTERVAL;

use crate::auth::jwt::JwtConfig;

/// Default ceiling on request bodies, sized for base64 init images.
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Default address of a local Forge instance.
pub const DEFAULT_FORGE_URL: &str = "http://127.0.0.1:7860";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration loaded from environment variables.
///
/// Everything except `DATABASE_URL` and `JWT_SECRET` has a default suitable
/// for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3333`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
    pub database_url: String,
    /// Base URL of the Forge backend, without the API prefix.
    pub forge_url: String,
    /// Ceiling on `width * height` for any queued job.
    pub pixel_limit: u64,
    /// Time between progress checks while a task runs.
    pub progress_interval: Duration,
    /// Idle time after which the backend checkpoint is unloaded. `None`
    /// when `CHECKPOINT_UNLOAD_INTERVAL` is unset or zero.
    pub checkpoint_unload_after: Option<Duration>,
    /// Whether the unauthenticated bot producers accept requests.
    pub allow_legacy_endpoints: bool,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `HOST`                        | `0.0.0.0`               |
    /// | `PORT`                        | `3333`                  |
    /// | `CORS_ORIGINS`                | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                    |
    /// | `MAX_REQUEST_BODY_BYTES`      | `26214400`              |
    /// | `DATABASE_URL`                | required                |
    /// | `FORGE_URL`                   | `http://127.0.0.1:7860` |
    /// | `IMAGE_PIXEL_LIMIT`           | `3686400`               |
    /// | `JOB_PROGRESS_CHECK_INTERVAL` | `2500` (ms)             |
    /// | `CHECKPOINT_UNLOAD_INTERVAL`  | `0` (minutes, disabled) |
    /// | `ALLOW_LEGACY_BOT_ENDPOINTS`  | `false`                 |
    /// | `JWT_SECRET`                  | required                |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = parse_var("PORT", 3333u16)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", 30u64)?;
        let max_body_bytes = parse_var("MAX_REQUEST_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let forge_url = std::env::var("FORGE_URL").unwrap_or_else(|_| DEFAULT_FORGE_URL.into());

        let pixel_limit = parse_var("IMAGE_PIXEL_LIMIT", DEFAULT_PIXEL_LIMIT)?;

        let progress_ms = parse_var(
            "JOB_PROGRESS_CHECK_INTERVAL",
            DEFAULT_PROGRESS_INTERVAL.as_millis() as u64,
        )?;

        let unload_minutes = parse_var("CHECKPOINT_UNLOAD_INTERVAL", 0u64)?;

        let allow_legacy_endpoints = std::env::var("ALLOW_LEGACY_BOT_ENDPOINTS")
            .is_ok_and(|v| v == "true");

        let jwt = JwtConfig::from_env()?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_body_bytes,
            database_url,
            forge_url,
            pixel_limit,
            progress_interval: Duration::from_millis(progress_ms),
            checkpoint_unload_after: unload_after(unload_minutes),
            allow_legacy_endpoints,
            jwt,
        })
    }
}

fn unload_after(minutes: u64) -> Option<Duration> {
    (minutes > 0).then(|| Duration::from_secs(minutes * 60))
}

/// Read `name` and parse it, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_uses_default_when_unset() {
        let value: u16 = parse_var("NAVIGATOR_TEST_SURELY_UNSET_VAR", 3333).unwrap();
        assert_eq!(value, 3333);
    }

    #[test]
    fn zero_unload_interval_disables_unloading() {
        assert_eq!(unload_after(0), None);
        assert_eq!(unload_after(10), Some(Duration::from_secs(600)));
    }
}
