use time::macros::date;

use super::*;
use crate::services::family::FamilyError;

#[test]
fn scope_query_builds_filter() {
    let family_id = Uuid::new_v4();
    let query = ScopeQuery {
        family_id: Some(family_id),
        from: Some("2026-01-01".into()),
        to: Some("2026-03-31".into()),
        kind: Some("expense".into()),
        limit: Some(50),
        ..ScopeQuery::default()
    };
    let filter = query.to_filter().unwrap();
    assert_eq!(filter.family_id, Some(family_id));
    assert_eq!(filter.from, Some(date!(2026 - 01 - 01)));
    assert_eq!(filter.to, Some(date!(2026 - 03 - 31)));
    assert_eq!(filter.kind, Some(EntryKind::Expense));
    assert_eq!(filter.limit, Some(50));
}

#[test]
fn scope_query_rejects_bad_input() {
    let bad_date = ScopeQuery { from: Some("01/01/2026".into()), ..ScopeQuery::default() };
    assert_eq!(bad_date.to_filter().unwrap_err().status, StatusCode::BAD_REQUEST);

    let reversed = ScopeQuery { from: Some("2026-02-01".into()), to: Some("2026-01-01".into()), ..ScopeQuery::default() };
    assert_eq!(reversed.to_filter().unwrap_err().status, StatusCode::BAD_REQUEST);

    let bad_kind = ScopeQuery { kind: Some("transfer".into()), ..ScopeQuery::default() };
    assert_eq!(bad_kind.to_filter().unwrap_err().status, StatusCode::BAD_REQUEST);
}

#[test]
fn patch_body_distinguishes_null_from_absent() {
    let body: PatchTransactionBody = serde_json::from_str(r#"{"amount_cents": 10, "category_id": null}"#).unwrap();
    let patch = TransactionPatch::from(body);
    assert_eq!(patch.amount_cents, Some(10));
    assert_eq!(patch.category_id, Some(None));
    assert_eq!(patch.family_id, None);
}

#[test]
fn transaction_errors_map_to_statuses() {
    let id = Uuid::new_v4();
    assert_eq!(transaction_error_to_api(TransactionError::Invalid("x".into())).status, StatusCode::BAD_REQUEST);
    assert_eq!(transaction_error_to_api(TransactionError::NotFound(id)).status, StatusCode::NOT_FOUND);
    assert_eq!(transaction_error_to_api(TransactionError::Forbidden(id)).status, StatusCode::FORBIDDEN);
    assert_eq!(
        transaction_error_to_api(TransactionError::Family(FamilyError::NotFound(id))).status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        transaction_error_to_api(TransactionError::Family(FamilyError::Conflict("x".into()))).status,
        StatusCode::CONFLICT
    );
}
