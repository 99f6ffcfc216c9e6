//! Transaction routes, including JSON Lines export and import.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::categories::parse_kind_param;
use super::families::family_error_to_api;
use super::{ApiError, double_option, parse_date_param};
use crate::routes::auth::AuthUser;
use crate::services::transaction::{
    self, EntryKind, ImportReport, LedgerEntry, NewTransaction, TransactionError, TransactionFilter, TransactionPatch,
};
use crate::state::AppState;

pub(crate) fn transaction_error_to_api(err: TransactionError) -> ApiError {
    match err {
        TransactionError::Invalid(msg) => ApiError::bad_request(msg),
        TransactionError::NotFound(_) => ApiError::not_found("transaction not found"),
        e @ TransactionError::Forbidden(_) => ApiError::new(StatusCode::FORBIDDEN, e.to_string()),
        TransactionError::Family(e) => family_error_to_api(e),
        TransactionError::Database(e) => ApiError::internal(e),
    }
}

/// Query string shared by listing, export and charts.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub family_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub kind: Option<String>,
    pub category_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ScopeQuery {
    pub(crate) fn to_filter(&self) -> Result<TransactionFilter, ApiError> {
        let from = parse_date_param(self.from.as_deref(), "from")?;
        let to = parse_date_param(self.to.as_deref(), "to")?;
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(ApiError::bad_request("from must not be after to"));
        }
        Ok(TransactionFilter {
            family_id: self.family_id,
            from,
            to,
            kind: parse_kind_param(self.kind.as_deref())?,
            category_id: self.category_id,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// `GET /api/transactions`
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    let filter = query.to_filter()?;
    let rows = transaction::list_transactions(&state.pool, auth.user.id, &filter)
        .await
        .map_err(transaction_error_to_api)?;
    Ok(Json(rows))
}

/// `POST /api/transactions`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewTransaction>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    let created = transaction::create_transaction(&state.pool, auth.user.id, &body)
        .await
        .map_err(transaction_error_to_api)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/transactions/{id}`
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LedgerEntry>, ApiError> {
    let entry = transaction::get_transaction(&state.pool, auth.user.id, id)
        .await
        .map_err(transaction_error_to_api)?;
    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
pub struct PatchTransactionBody {
    #[serde(default)]
    pub kind: Option<EntryKind>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub occurred_on: Option<Date>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub family_id: Option<Option<Uuid>>,
}

impl From<PatchTransactionBody> for TransactionPatch {
    fn from(body: PatchTransactionBody) -> Self {
        Self {
            kind: body.kind,
            amount_cents: body.amount_cents,
            description: body.description,
            occurred_on: body.occurred_on,
            category_id: body.category_id,
            family_id: body.family_id,
        }
    }
}

/// `PATCH /api/transactions/{id}`
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchTransactionBody>,
) -> Result<Json<LedgerEntry>, ApiError> {
    let patch = TransactionPatch::from(body);
    let updated = transaction::update_transaction(&state.pool, auth.user.id, id, &patch)
        .await
        .map_err(transaction_error_to_api)?;
    Ok(Json(updated))
}

/// `DELETE /api/transactions/{id}`
pub async fn delete(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    transaction::delete_transaction(&state.pool, auth.user.id, id)
        .await
        .map_err(transaction_error_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// `GET /api/transactions/export.jsonl`: every entry in scope, as JSON Lines.
pub async fn export_jsonl(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ScopeQuery>,
) -> Result<Response, ApiError> {
    let filter = query.to_filter()?;
    let entries = transaction::fetch_scope(&state.pool, auth.user.id, &filter, None)
        .await
        .map_err(transaction_error_to_api)?;
    let lines = transaction::export_lines(&entries).map_err(ApiError::internal)?;

    let stream = futures::stream::iter(
        lines
            .into_iter()
            .map(|line| Ok::<axum::body::Bytes, std::convert::Infallible>(axum::body::Bytes::from(line))),
    );
    let body = axum::body::Body::from_stream(stream);
    let filename = match filter.family_id {
        Some(family_id) => format!("transactions-family-{family_id}.jsonl"),
        None => "transactions.jsonl".to_owned(),
    };

    Ok((
        [
            (CONTENT_TYPE, "application/x-ndjson; charset=utf-8"),
            (CONTENT_DISPOSITION, &format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct ImportJsonlBody {
    pub jsonl: String,
    #[serde(default)]
    pub family_id: Option<Uuid>,
}

/// `POST /api/transactions/import.jsonl`
pub async fn import_jsonl(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ImportJsonlBody>,
) -> Result<Json<ImportReport>, ApiError> {
    let report = transaction::import_jsonl(&state.pool, auth.user.id, body.family_id, &body.jsonl)
        .await
        .map_err(transaction_error_to_api)?;
    Ok(Json(report))
}

#[cfg(test)]
#[path = "transactions_test.rs"]
mod tests;
