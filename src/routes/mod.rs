//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every endpoint is JSON under `/api`, authenticated by the session cookie
//! through the [`auth::AuthUser`] extractor. Handlers translate service
//! errors into [`ApiError`], which renders as `{"error": "..."}`.

pub mod auth;
pub mod categories;
pub mod charts;
pub mod families;
pub mod goals;
pub mod invites;
pub mod profile;
pub mod transactions;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use serde::{Deserialize, Deserializer};
use time::Date;
use time::macros::format_description;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

/// JSON error response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Log the underlying failure and hide it from the client.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

// =============================================================================
// REQUEST HELPERS
// =============================================================================

/// Deserialize a field that distinguishes "absent" from `null`.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: a
/// missing key stays `None`, `null` becomes `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Parse an optional `YYYY-MM-DD` query parameter.
pub(crate) fn parse_date_param(raw: Option<&str>, field: &str) -> Result<Option<Date>, ApiError> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            Date::parse(v, format_description!("[year]-[month]-[day]"))
                .map_err(|_| ApiError::bad_request(format!("{field} must be a YYYY-MM-DD date")))
        })
        .transpose()
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/auth/email/request-code", post(auth::request_email_code))
        .route("/api/auth/email/verify-code", post(auth::verify_email_code))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/profile", get(profile::get_profile).patch(profile::update_profile))
        .route("/api/categories", get(categories::list).post(categories::create))
        .route("/api/categories/{id}", patch(categories::update).delete(categories::delete))
        .route("/api/transactions", get(transactions::list).post(transactions::create))
        .route("/api/transactions/export.jsonl", get(transactions::export_jsonl))
        .route("/api/transactions/import.jsonl", post(transactions::import_jsonl))
        .route(
            "/api/transactions/{id}",
            get(transactions::get)
                .patch(transactions::update)
                .delete(transactions::delete),
        )
        .route("/api/goals", get(goals::list).post(goals::create))
        .route("/api/goals/{id}", get(goals::get).patch(goals::update).delete(goals::delete))
        .route("/api/goals/{id}/contribute", post(goals::contribute))
        .route("/api/families", get(families::list).post(families::create))
        .route(
            "/api/families/{id}",
            get(families::get)
                .patch(families::rename)
                .delete(families::delete),
        )
        .route("/api/families/{id}/members", get(families::list_members))
        .route(
            "/api/families/{id}/members/{user_id}",
            patch(families::update_member).delete(families::remove_member),
        )
        .route("/api/families/{id}/leave", post(families::leave))
        .route("/api/families/{id}/invites", get(invites::list_for_family).post(invites::create))
        .route("/api/families/{id}/invites/{invite_id}", axum::routing::delete(invites::revoke))
        .route("/api/invites", get(invites::list_mine))
        .route("/api/invites/accept", post(invites::accept_by_token))
        .route("/api/invites/{id}/accept", post(invites::accept))
        .route("/api/invites/{id}/decline", post(invites::decline))
        .route("/api/charts/summary", get(charts::summary))
        .route("/api/charts/categories", get(charts::categories))
        .route("/api/charts/monthly", get(charts::monthly))
        .route("/api/charts/savings", get(charts::savings))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
