use super::*;

fn limiter(per_key: usize, global: usize) -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
        per_key_limit: per_key,
        per_key_window: Duration::from_secs(60),
        global_limit: global,
        global_window: Duration::from_secs(60),
    })
}

#[test]
fn per_key_allows_up_to_limit() {
    let rl = limiter(3, 100);
    let now = Instant::now();

    for i in 0..3 {
        assert!(rl.check_and_record_at("a@example.com", now).is_ok(), "message {i} should pass");
    }
    assert_eq!(
        rl.check_and_record_at("a@example.com", now),
        Err(RateLimitError::PerKeyExceeded { limit: 3, window_secs: 60 })
    );
}

#[test]
fn keys_are_independent() {
    let rl = limiter(1, 100);
    let now = Instant::now();

    assert!(rl.check_and_record_at("a@example.com", now).is_ok());
    assert!(rl.check_and_record_at("b@example.com", now).is_ok());
    assert!(rl.check_and_record_at("a@example.com", now).is_err());
}

#[test]
fn global_limit_applies_across_keys() {
    let rl = limiter(10, 2);
    let now = Instant::now();

    assert!(rl.check_and_record_at("a", now).is_ok());
    assert!(rl.check_and_record_at("b", now).is_ok());
    assert_eq!(
        rl.check_and_record_at("c", now),
        Err(RateLimitError::GlobalExceeded { limit: 2, window_secs: 60 })
    );
}

#[test]
fn rejected_attempts_are_not_recorded() {
    let rl = limiter(1, 2);
    let now = Instant::now();

    assert!(rl.check_and_record_at("a", now).is_ok());
    assert!(rl.check_and_record_at("a", now).is_err());
    assert!(rl.check_and_record_at("a", now).is_err());
    // Only one event counted globally, so another key still fits.
    assert!(rl.check_and_record_at("b", now).is_ok());
}

#[test]
fn window_expiry_allows_new_events() {
    let rl = limiter(1, 100);
    let start = Instant::now();

    rl.check_and_record_at("a", start).unwrap();
    assert!(rl.check_and_record_at("a", start + Duration::from_secs(30)).is_err());
    assert!(rl.check_and_record_at("a", start + Duration::from_secs(61)).is_ok());
}

#[test]
fn prune_idle_keeps_recent_keys() {
    let rl = limiter(5, 100);
    rl.check_and_record("a").unwrap();
    rl.check_and_record("b").unwrap();
    rl.prune_idle();
    assert_eq!(rl.tracked_keys(), 2);
}

#[test]
fn per_key_config_uses_window_for_global() {
    let cfg = RateLimitConfig::per_key(4, Duration::from_secs(10));
    assert_eq!(cfg.per_key_limit, 4);
    assert_eq!(cfg.global_window, Duration::from_secs(10));
}

#[test]
fn check_does_not_consume_quota() {
    let rl = limiter(1, 100);
    assert!(rl.check("a").is_ok());
    assert!(rl.check("a").is_ok());
    assert!(rl.check_and_record("a").is_ok());
    assert_eq!(rl.check("a"), Err(RateLimitError::PerKeyExceeded { limit: 1, window_secs: 60 }));
}
