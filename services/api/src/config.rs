//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Longest session lifetime `TOKEN_TTL_HOURS` may ask for (one year).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Ceilings enforced by the resource handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_filters: usize,
    pub max_shared_stories: u64,
    pub max_comments: usize,
    pub max_saved_stories: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_filters: 10,
            max_shared_stories: 30,
            max_comments: 30,
            max_saved_stories: 30,
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub limits: Limits,
    pub home_news_id: String,
    /// Hides error details from clients when set.
    pub production: bool,
    pub rate_limit_per_window: u32,
    pub rate_limit_window: Duration,
    pub request_timeout: Duration,
    /// Take the client address from `x-forwarded-for` instead of the peer.
    pub trust_proxy: bool,
    pub worker_queue_capacity: usize,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => "0.0.0.0:3000".to_string(),
        });
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Session Tokens ---
        let jwt_secret =
            lookup("JWT_SECRET").ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must not be empty".to_string(),
            ));
        }
        let token_ttl_hours: i64 = parse_or(&lookup, "TOKEN_TTL_HOURS", 24)?;
        let token_ttl = Some(token_ttl_hours)
            .filter(|hours| (1..=MAX_TOKEN_TTL_HOURS).contains(hours))
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TOKEN_TTL_HOURS".to_string(),
                    format!("must be between 1 and {}", MAX_TOKEN_TTL_HOURS),
                )
            })?;

        // --- Resource Ceilings ---
        let defaults = Limits::default();
        let limits = Limits {
            max_filters: parse_or(&lookup, "MAX_FILTERS", defaults.max_filters)?,
            max_shared_stories: parse_or(&lookup, "MAX_SHARED_STORIES", defaults.max_shared_stories)?,
            max_comments: parse_or(&lookup, "MAX_COMMENTS", defaults.max_comments)?,
            max_saved_stories: parse_or(&lookup, "MAX_SAVED_STORIES", defaults.max_saved_stories)?,
        };

        let home_news_id = lookup("HOME_NEWS_ID")
            .unwrap_or_else(|| "MASTER_STORIES_DO_NOT_DELETE".to_string());
        let production = lookup("APP_ENV")
            .map(|env| env.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        // --- Request Guards ---
        let rate_limit_per_window = parse_or(&lookup, "RATE_LIMIT_PER_WINDOW", 100)?;
        let rate_limit_window =
            Duration::from_secs(parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", 15 * 60)?);
        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?);
        let trust_proxy = parse_or(&lookup, "TRUST_PROXY", false)?;
        let worker_queue_capacity: usize = parse_or(&lookup, "WORKER_QUEUE_CAPACITY", 64)?;
        if worker_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "WORKER_QUEUE_CAPACITY".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            jwt_secret,
            token_ttl,
            limits,
            home_news_id,
            production,
            rate_limit_per_window,
            rate_limit_window,
            request_timeout,
            trust_proxy,
            worker_queue_capacity,
            cors_origin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = load(&[("DATABASE_URL", "memory://"), ("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.limits, Limits::default());
        assert_eq!(config.home_news_id, "MASTER_STORIES_DO_NOT_DELETE");
        assert!(!config.production);
        assert_eq!(config.token_ttl, chrono::Duration::hours(24));
    }

    #[test]
    fn port_is_used_when_no_bind_address() {
        let config = load(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("APP_ENV", "production"),
            ("MAX_FILTERS", "3"),
        ])
        .unwrap();
        assert_eq!(config.bind_address.port(), 8080);
        assert!(config.production);
        assert_eq!(config.limits.max_filters, 3);
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = load(&[("DATABASE_URL", "memory://")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "JWT_SECRET"));
    }

    #[test]
    fn bad_number_is_reported() {
        let err = load(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("MAX_COMMENTS", "lots"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "MAX_COMMENTS"));
    }

    #[test]
    fn token_lifetime_is_bounded() {
        for hours in ["0", "-5", "8761", "3000000000", "9000000000000"] {
            let err = load(&[
                ("DATABASE_URL", "memory://"),
                ("JWT_SECRET", "s3cret"),
                ("TOKEN_TTL_HOURS", hours),
            ])
            .unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue(ref v, _) if v == "TOKEN_TTL_HOURS"),
                "{} hours was accepted",
                hours
            );
        }

        let config = load(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("TOKEN_TTL_HOURS", "8760"),
        ])
        .unwrap();
        assert_eq!(config.token_ttl, chrono::Duration::hours(MAX_TOKEN_TTL_HOURS));
    }

    #[test]
    fn proxy_headers_are_untrusted_by_default() {
        let config = load(&[("DATABASE_URL", "memory://"), ("JWT_SECRET", "s3cret")]).unwrap();
        assert!(!config.trust_proxy);

        let config = load(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("TRUST_PROXY", "true"),
        ])
        .unwrap();
        assert!(config.trust_proxy);
    }
}
