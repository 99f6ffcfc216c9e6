use super::*;

#[test]
fn normalize_email_accepts_basic_address() {
    assert_eq!(normalize_email("  USER@Example.com "), Some("user@example.com".to_owned()));
}

#[test]
fn normalize_email_rejects_invalid_values() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("user"), None);
    assert_eq!(normalize_email("@example.com"), None);
    assert_eq!(normalize_email("user@"), None);
    assert_eq!(normalize_email("a@b@c"), None);
    assert_eq!(normalize_email("a b@example.com"), None);
}

#[test]
fn normalize_code_accepts_generated_and_lowercase() {
    let code = generate_access_code();
    assert_eq!(normalize_code(&code), Some(code.clone()));
    assert_eq!(normalize_code(" abc234 "), Some("ABC234".to_owned()));
}

#[test]
fn normalize_code_rejects_bad_shapes() {
    assert_eq!(normalize_code("abc23"), None);
    assert_eq!(normalize_code("abc2345"), None);
    // Ambiguous glyphs (I, 0, 1, O) are excluded from the alphabet.
    assert_eq!(normalize_code("ABC1I0"), None);
    assert_eq!(normalize_code("ABC23!"), None);
}

#[test]
fn generate_access_code_shape() {
    let code = generate_access_code();
    assert_eq!(code.len(), 6);
    assert!(code.bytes().all(|c| CODE_ALPHABET.contains(&c)));
}

#[test]
fn hash_secret_is_stable_hex() {
    let a = hash_secret("ABC234");
    assert_eq!(a, hash_secret("ABC234"));
    assert_ne!(a, hash_secret("ABC235"));
    assert_eq!(a.len(), 64);
}

#[test]
fn check_code_accepts_matching_hash() {
    let hash = hash_secret("ABC234");
    assert_eq!(check_code(&hash, &hash, 4), CodeCheck::Accepted);
}

#[test]
fn check_code_burns_on_fifth_failure() {
    let stored = hash_secret("ABC234");
    let wrong = hash_secret("ZZZ999");
    assert_eq!(check_code(&stored, &wrong, 0), CodeCheck::Rejected { burned: false });
    assert_eq!(check_code(&stored, &wrong, 3), CodeCheck::Rejected { burned: false });
    assert_eq!(check_code(&stored, &wrong, 4), CodeCheck::Rejected { burned: true });
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn code_round_trip_and_single_use() {
    let (state, _mailer) = crate::state::test_helpers::live_app_state().await;
    let email = format!("Code-{}@Example.test", uuid::Uuid::new_v4().simple());

    let (normalized, code) = request_access_code(&state.pool, &email).await.unwrap();
    assert_eq!(normalized, email.to_ascii_lowercase());

    let user_id = verify_access_code(&state.pool, &email, &code).await.unwrap();
    let again = verify_access_code(&state.pool, &email, &code).await;
    assert!(matches!(again, Err(EmailAuthError::VerificationFailed)));

    let owner: uuid::Uuid = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&normalized)
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(owner, user_id);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn repeated_wrong_codes_burn_the_code() {
    let (state, _mailer) = crate::state::test_helpers::live_app_state().await;
    let email = format!("burn-{}@example.test", uuid::Uuid::new_v4().simple());
    let (_, code) = request_access_code(&state.pool, &email).await.unwrap();
    let wrong = if code == "ZZZZZZ" { "YYYYYY" } else { "ZZZZZZ" };

    for _ in 0..MAX_FAILED_ATTEMPTS {
        assert!(matches!(
            verify_access_code(&state.pool, &email, wrong).await,
            Err(EmailAuthError::VerificationFailed)
        ));
    }
    assert!(matches!(
        verify_access_code(&state.pool, &email, &code).await,
        Err(EmailAuthError::VerificationFailed)
    ));
}
