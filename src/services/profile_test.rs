use super::*;

#[test]
fn name_from_email_uses_local_part() {
    assert_eq!(name_from_email("jordan@example.com"), "jordan");
    assert_eq!(name_from_email("@example.com"), "user");
}

#[test]
fn validate_update_normalizes_fields() {
    let update = ProfileUpdate { display_name: Some("  Sam  ".into()), currency: Some("gbp".into()) };
    let clean = validate_update(&update).unwrap();
    assert_eq!(clean.display_name.as_deref(), Some("Sam"));
    assert_eq!(clean.currency.as_deref(), Some("GBP"));
}

#[test]
fn validate_update_keeps_missing_fields_empty() {
    let clean = validate_update(&ProfileUpdate::default()).unwrap();
    assert!(clean.display_name.is_none());
    assert!(clean.currency.is_none());
}

#[test]
fn validate_update_rejects_bad_currency() {
    let update = ProfileUpdate { display_name: None, currency: Some("dollars".into()) };
    assert!(matches!(validate_update(&update), Err(ProfileError::Invalid(_))));
}

#[test]
fn validate_update_rejects_blank_name() {
    let update = ProfileUpdate { display_name: Some("   ".into()), currency: None };
    assert!(matches!(validate_update(&update), Err(ProfileError::Invalid(msg)) if msg.contains("display name")));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn ensure_user_is_idempotent_and_seeds_categories_once() {
    let (state, _mailer) = crate::state::test_helpers::live_app_state().await;
    let email = format!("profile-{}@example.test", Uuid::new_v4().simple());

    let first = ensure_user(&state.pool, &email).await.unwrap();
    let second = ensure_user(&state.pool, &email).await.unwrap();
    assert_eq!(first, second);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE user_id = $1")
        .bind(first)
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(usize::try_from(count).unwrap(), category::DEFAULT_CATEGORIES.len());
}
