use time::macros::datetime;

use super::*;

#[test]
fn to_hex_pads_each_byte() {
    assert_eq!(to_hex(&[]), "");
    assert_eq!(to_hex(&[0x0a, 0xff, 0x00]), "0aff00");
}

#[test]
fn tokens_are_random_hex() {
    let token = generate_token();
    assert_eq!(token.len(), TOKEN_BYTES * 2);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_ne!(token, generate_token());
}

#[test]
fn remaining_never_goes_negative() {
    let session = IssuedSession { token: "t".into(), expires_at: datetime!(2026-10-18 12:00 UTC) };
    assert_eq!(session.remaining(datetime!(2026-10-18 11:00 UTC)), time::Duration::hours(1));
    assert_eq!(session.remaining(datetime!(2026-10-19 0:00 UTC)), time::Duration::ZERO);
}

#[test]
fn session_user_serializes_profile_fields() {
    let user = SessionUser {
        id: Uuid::nil(),
        email: "alice@example.com".into(),
        display_name: "alice".into(),
        currency: "EUR".into(),
    };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["email"], "alice@example.com");
    assert_eq!(json["currency"], "EUR");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn session_lifecycle_against_live_db() {
    let (state, _mailer) = crate::state::test_helpers::live_app_state().await;
    let (user_id, email) = crate::state::test_helpers::seed_user(&state.pool, "session").await;

    let issued = create_session(&state.pool, user_id, Duration::from_secs(60)).await.unwrap();
    let user = validate_session(&state.pool, &issued.token).await.unwrap().expect("session valid");
    assert_eq!(user.id, user_id);
    assert_eq!(user.email, email);

    assert!(delete_session(&state.pool, &issued.token).await.unwrap());
    assert!(!delete_session(&state.pool, &issued.token).await.unwrap());
    assert!(validate_session(&state.pool, &issued.token).await.unwrap().is_none());
}
