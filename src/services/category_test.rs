use super::*;

#[test]
fn defaults_cover_both_kinds_without_duplicates() {
    assert!(DEFAULT_CATEGORIES.iter().any(|(_, kind, _)| *kind == EntryKind::Income));
    assert!(DEFAULT_CATEGORIES.iter().any(|(_, kind, _)| *kind == EntryKind::Expense));

    let mut seen = std::collections::HashSet::new();
    for (name, kind, color) in DEFAULT_CATEGORIES {
        assert!(seen.insert((name.to_lowercase(), *kind)), "duplicate default {name}");
        assert!(validate::hex_color(color).is_ok(), "bad color for {name}");
    }
}

#[test]
fn clean_name_trims() {
    assert_eq!(clean_name("  Pets ").unwrap(), "Pets");
    assert!(matches!(clean_name(""), Err(CategoryError::Invalid(_))));
    assert!(matches!(clean_name(&"x".repeat(51)), Err(CategoryError::Invalid(_))));
}

#[test]
fn clean_color_is_optional() {
    assert_eq!(clean_color(None).unwrap(), None);
    assert_eq!(clean_color(Some("#00aa11")).unwrap(), Some("#00AA11".to_owned()));
    assert!(matches!(clean_color(Some("green")), Err(CategoryError::Invalid(_))));
}

#[test]
fn duplicate_error_message_names_category() {
    let err = CategoryError::Duplicate("Rent".into());
    assert_eq!(err.to_string(), r#"a category named "Rent" already exists for that kind"#);
}

#[test]
fn new_category_color_defaults_to_none() {
    let input: NewCategory = serde_json::from_str(r#"{"name":"Pets","kind":"expense"}"#).unwrap();
    assert_eq!(input.kind, EntryKind::Expense);
    assert!(input.color.is_none());
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn duplicate_names_conflict_per_kind() {
    use crate::state::test_helpers::{live_app_state, seed_user};

    let (state, _mailer) = live_app_state().await;
    let (user, _) = seed_user(&state.pool, "cat").await;

    let input = NewCategory { name: "Pets".into(), kind: EntryKind::Expense, color: None };
    create_category(&state.pool, user, &input).await.unwrap();
    assert!(matches!(
        create_category(&state.pool, user, &NewCategory { name: " pets ".into(), ..input.clone() }).await,
        Err(CategoryError::Duplicate(_))
    ));
    let income = NewCategory { name: "Pets".into(), kind: EntryKind::Income, color: None };
    assert!(create_category(&state.pool, user, &income).await.is_ok());
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn deleting_category_unlinks_its_transactions() {
    use crate::services::transaction::{NewTransaction, create_transaction, get_transaction};
    use crate::state::test_helpers::{live_app_state, seed_user};

    let (state, _mailer) = live_app_state().await;
    let (user, _) = seed_user(&state.pool, "cat-delete").await;
    let category = create_category(
        &state.pool,
        user,
        &NewCategory { name: "Hobbies".into(), kind: EntryKind::Expense, color: None },
    )
    .await
    .unwrap();
    let input = NewTransaction {
        kind: EntryKind::Expense,
        amount_cents: 4_200,
        description: Some("paint".into()),
        occurred_on: None,
        category_id: Some(category.id),
        family_id: None,
    };
    let entry = create_transaction(&state.pool, user, &input).await.unwrap();
    assert_eq!(entry.category_id, Some(category.id));

    delete_category(&state.pool, user, category.id).await.unwrap();

    let after = get_transaction(&state.pool, user, entry.id).await.unwrap();
    assert_eq!(after.category_id, None);
    assert_eq!(after.category_name, None);
    assert_eq!(after.amount_cents, 4_200);
}
