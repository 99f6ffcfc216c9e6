//! Savings goal routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::families::family_error_to_api;
use super::{ApiError, double_option};
use crate::routes::auth::AuthUser;
use crate::services::goal::{self, GoalError, GoalPatch, GoalView, NewGoal};
use crate::services::transaction::today;
use crate::state::AppState;

pub(crate) fn goal_error_to_api(err: GoalError) -> ApiError {
    match err {
        GoalError::Invalid(msg) => ApiError::bad_request(msg),
        GoalError::NotFound(_) => ApiError::not_found("goal not found"),
        e @ GoalError::Forbidden(_) => ApiError::new(StatusCode::FORBIDDEN, e.to_string()),
        GoalError::Family(e) => family_error_to_api(e),
        GoalError::Database(e) => ApiError::internal(e),
    }
}

#[derive(Deserialize)]
pub struct GoalListQuery {
    pub family_id: Option<Uuid>,
}

/// `GET /api/goals?family_id=`
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<GoalListQuery>,
) -> Result<Json<Vec<GoalView>>, ApiError> {
    let goals = goal::list_goals(&state.pool, auth.user.id, query.family_id)
        .await
        .map_err(goal_error_to_api)?;
    let today = today();
    Ok(Json(goals.into_iter().map(|g| goal::view(g, today)).collect()))
}

/// `POST /api/goals`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewGoal>,
) -> Result<(StatusCode, Json<GoalView>), ApiError> {
    let created = goal::create_goal(&state.pool, auth.user.id, &body)
        .await
        .map_err(goal_error_to_api)?;
    Ok((StatusCode::CREATED, Json(goal::view(created, today()))))
}

/// `GET /api/goals/{id}`
pub async fn get(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<Json<GoalView>, ApiError> {
    let found = goal::get_goal(&state.pool, auth.user.id, id)
        .await
        .map_err(goal_error_to_api)?;
    Ok(Json(goal::view(found, today())))
}

#[derive(Debug, Deserialize)]
pub struct PatchGoalBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_cents: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub deadline: Option<Option<Date>>,
}

/// `PATCH /api/goals/{id}`
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchGoalBody>,
) -> Result<Json<GoalView>, ApiError> {
    let patch = GoalPatch { name: body.name, target_cents: body.target_cents, deadline: body.deadline };
    let updated = goal::update_goal(&state.pool, auth.user.id, id, &patch)
        .await
        .map_err(goal_error_to_api)?;
    Ok(Json(goal::view(updated, today())))
}

/// `DELETE /api/goals/{id}`
pub async fn delete(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    goal::delete_goal(&state.pool, auth.user.id, id)
        .await
        .map_err(goal_error_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ContributeBody {
    pub amount_cents: i64,
}

/// `POST /api/goals/{id}/contribute`: negative amounts withdraw.
pub async fn contribute(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ContributeBody>,
) -> Result<Json<GoalView>, ApiError> {
    let updated = goal::contribute(&state.pool, auth.user.id, id, body.amount_cents)
        .await
        .map_err(goal_error_to_api)?;
    Ok(Json(goal::view(updated, today())))
}
