//! Family and membership routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::family::{self, FamilyError, FamilyMember, FamilyRole, FamilySummary, LeaveOutcome};
use crate::state::AppState;

pub(crate) fn family_error_to_api(err: FamilyError) -> ApiError {
    match err {
        FamilyError::Invalid(msg) => ApiError::bad_request(msg),
        FamilyError::NotFound(_) => ApiError::not_found("family not found"),
        e @ FamilyError::Forbidden(_) => ApiError::new(StatusCode::FORBIDDEN, e.to_string()),
        FamilyError::Conflict(msg) => ApiError::new(StatusCode::CONFLICT, msg),
        FamilyError::Database(e) => ApiError::internal(e),
    }
}

#[derive(Deserialize)]
pub struct FamilyNameBody {
    pub name: String,
}

#[derive(Deserialize)]
pub struct MemberRoleBody {
    pub role: String,
}

/// `GET /api/families`: families the caller belongs to.
pub async fn list(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<FamilySummary>>, ApiError> {
    let rows = family::list_families(&state.pool, auth.user.id)
        .await
        .map_err(family_error_to_api)?;
    Ok(Json(rows))
}

/// `POST /api/families`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<FamilyNameBody>,
) -> Result<(StatusCode, Json<FamilySummary>), ApiError> {
    let created = family::create_family(&state.pool, auth.user.id, &body.name)
        .await
        .map_err(family_error_to_api)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/families/{id}`
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(family_id): Path<Uuid>,
) -> Result<Json<FamilySummary>, ApiError> {
    let summary = family::get_family(&state.pool, auth.user.id, family_id)
        .await
        .map_err(family_error_to_api)?;
    Ok(Json(summary))
}

/// `PATCH /api/families/{id}`
pub async fn rename(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(family_id): Path<Uuid>,
    Json(body): Json<FamilyNameBody>,
) -> Result<Json<FamilySummary>, ApiError> {
    let summary = family::rename_family(&state.pool, auth.user.id, family_id, &body.name)
        .await
        .map_err(family_error_to_api)?;
    Ok(Json(summary))
}

/// `DELETE /api/families/{id}`
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(family_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    family::delete_family(&state.pool, auth.user.id, family_id)
        .await
        .map_err(family_error_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/families/{id}/members`
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(family_id): Path<Uuid>,
) -> Result<Json<Vec<FamilyMember>>, ApiError> {
    let rows = family::list_members(&state.pool, auth.user.id, family_id)
        .await
        .map_err(family_error_to_api)?;
    Ok(Json(rows))
}

/// `PATCH /api/families/{id}/members/{user_id}`: change a member's role.
pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((family_id, member_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<MemberRoleBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let role = FamilyRole::parse(&body.role).ok_or_else(|| ApiError::bad_request("role must be owner, admin or member"))?;
    family::update_member_role(&state.pool, auth.user.id, family_id, member_id, role)
        .await
        .map_err(family_error_to_api)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `DELETE /api/families/{id}/members/{user_id}`
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((family_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    family::remove_member(&state.pool, auth.user.id, family_id, member_id)
        .await
        .map_err(family_error_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/families/{id}/leave`
pub async fn leave(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(family_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = family::leave_family(&state.pool, auth.user.id, family_id)
        .await
        .map_err(family_error_to_api)?;
    Ok(Json(serde_json::json!({ "family_deleted": outcome == LeaveOutcome::DeleteFamily })))
}
