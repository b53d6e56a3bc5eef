//! Realtime server configuration

use std::time::Duration;

use crate::error::BoxError;

/// Realtime server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port (health check + WebSocket endpoints)
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// JWT secret for merchant / display bearer tokens
    pub jwt_secret: String,
    /// Size of the general pool used for snapshot queries
    pub db_max_connections: u32,
    /// First reconnect delay of a change listener
    pub listen_backoff_initial: Duration,
    /// Reconnect delay cap of a change listener
    pub listen_backoff_max: Duration,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let listen_backoff_initial =
            Duration::from_secs(Self::parsed_or("LISTEN_BACKOFF_INITIAL_SECS", 1u64).max(1));
        let listen_backoff_max = Duration::from_secs(Self::parsed_or("LISTEN_BACKOFF_MAX_SECS", 30u64))
            .max(listen_backoff_initial);

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: Self::parsed_or("HTTP_PORT", 8080),
            environment: environment.clone(),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            db_max_connections: Self::parsed_or("DB_MAX_CONNECTIONS", 10),
            listen_backoff_initial,
            listen_backoff_max,
        })
    }
}
