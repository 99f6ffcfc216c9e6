//! Service configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` (if present) and then builds one `AppConfig` that is
//! shared through `AppState`. Optional knobs fall back to defaults when unset
//! or malformed; only `DATABASE_URL` is required.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_INVITE_TTL_HOURS: u64 = 168;
pub const DEFAULT_SESSION_TTL_DAYS: u64 = 30;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_MAIL_LIMIT_PER_USER: usize = 5;
pub const DEFAULT_MAIL_LIMIT_WINDOW_SECS: u64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
}

/// Resend delivery credentials. Absent means mail is logged instead of sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Public origin used when building links in outgoing mail.
    pub app_base_url: String,
    pub invite_ttl: Duration,
    pub session_ttl: Duration,
    pub cleanup_interval: Duration,
    pub cookie_secure: bool,
    pub resend: Option<ResendConfig>,
    pub mail_limit_per_user: usize,
    pub mail_limit_window: Duration,
}

impl AppConfig {
    /// Build typed config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let app_base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_APP_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let cookie_secure = env_bool("COOKIE_SECURE").unwrap_or_else(|| app_base_url.starts_with("https://"));

        let resend = match (std::env::var("RESEND_API_KEY"), std::env::var("RESEND_FROM")) {
            (Ok(api_key), Ok(from)) if !api_key.trim().is_empty() && !from.trim().is_empty() => {
                Some(ResendConfig { api_key, from })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            app_base_url,
            invite_ttl: Duration::from_secs(env_parse("INVITE_TTL_HOURS", DEFAULT_INVITE_TTL_HOURS) * 3600),
            session_ttl: Duration::from_secs(env_parse("SESSION_TTL_DAYS", DEFAULT_SESSION_TTL_DAYS) * 86_400),
            cleanup_interval: Duration::from_secs(env_parse("CLEANUP_INTERVAL_SECS", DEFAULT_CLEANUP_INTERVAL_SECS)),
            cookie_secure,
            resend,
            mail_limit_per_user: env_parse("RATE_LIMIT_MAIL_PER_USER", DEFAULT_MAIL_LIMIT_PER_USER),
            mail_limit_window: Duration::from_secs(env_parse(
                "RATE_LIMIT_MAIL_WINDOW_SECS",
                DEFAULT_MAIL_LIMIT_WINDOW_SECS,
            )),
        })
    }

    /// Config with defaults for everything but the database URL.
    #[must_use]
    pub fn with_database_url(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_owned(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            app_base_url: DEFAULT_APP_BASE_URL.to_owned(),
            invite_ttl: Duration::from_secs(DEFAULT_INVITE_TTL_HOURS * 3600),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_DAYS * 86_400),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            cookie_secure: false,
            resend: None,
            mail_limit_per_user: DEFAULT_MAIL_LIMIT_PER_USER,
            mail_limit_window: Duration::from_secs(DEFAULT_MAIL_LIMIT_WINDOW_SECS),
        }
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().as_deref().and_then(parse_bool)
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
