use std::sync::Mutex;

use super::*;

/// Serializes tests that mutate process env.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers must hold `ENV_LOCK`.
unsafe fn clear_env() {
    unsafe {
        for key in [
            "DATABASE_URL",
            "PORT",
            "DB_MAX_CONNECTIONS",
            "APP_BASE_URL",
            "INVITE_TTL_HOURS",
            "SESSION_TTL_DAYS",
            "CLEANUP_INTERVAL_SECS",
            "COOKIE_SECURE",
            "RESEND_API_KEY",
            "RESEND_FROM",
            "RATE_LIMIT_MAIL_PER_USER",
            "RATE_LIMIT_MAIL_WINDOW_SECS",
        ] {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn parse_bool_accepts_common_spellings() {
    assert_eq!(parse_bool("1"), Some(true));
    assert_eq!(parse_bool(" YES "), Some(true));
    assert_eq!(parse_bool("on"), Some(true));
    assert_eq!(parse_bool("false"), Some(false));
    assert_eq!(parse_bool("Off"), Some(false));
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_bool(""), None);
}

#[test]
fn with_database_url_uses_defaults() {
    let cfg = AppConfig::with_database_url("postgres://x");
    assert_eq!(cfg.database_url, "postgres://x");
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.invite_ttl, Duration::from_secs(7 * 24 * 3600));
    assert!(cfg.resend.is_none());
    assert!(!cfg.cookie_secure);
}

#[test]
fn from_env_requires_database_url() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_env() };
    assert!(matches!(AppConfig::from_env(), Err(ConfigError::Missing("DATABASE_URL"))));
}

#[test]
fn from_env_reads_overrides_and_falls_back_on_garbage() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://db");
        std::env::set_var("PORT", "8080");
        std::env::set_var("DB_MAX_CONNECTIONS", "not-a-number");
        std::env::set_var("APP_BASE_URL", "https://money.example.com/");
        std::env::set_var("INVITE_TTL_HOURS", "48");
        std::env::set_var("RESEND_API_KEY", "re_test");
        std::env::set_var("RESEND_FROM", "noreply@example.com");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
    assert_eq!(cfg.app_base_url, "https://money.example.com");
    assert!(cfg.cookie_secure);
    assert_eq!(cfg.invite_ttl, Duration::from_secs(48 * 3600));
    assert_eq!(
        cfg.resend,
        Some(ResendConfig { api_key: "re_test".into(), from: "noreply@example.com".into() })
    );

    unsafe { clear_env() };
}

#[test]
fn cookie_secure_env_overrides_scheme() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://db");
        std::env::set_var("APP_BASE_URL", "https://money.example.com");
        std::env::set_var("COOKIE_SECURE", "false");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert!(!cfg.cookie_secure);

    unsafe { clear_env() };
}
