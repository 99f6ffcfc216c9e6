//! Category routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, double_option};
use crate::routes::auth::AuthUser;
use crate::services::category::{self, Category, CategoryError, CategoryUpdate, NewCategory};
use crate::services::transaction::EntryKind;
use crate::state::AppState;

pub(crate) fn category_error_to_api(err: CategoryError) -> ApiError {
    match err {
        CategoryError::Invalid(msg) => ApiError::bad_request(msg),
        CategoryError::NotFound(_) => ApiError::not_found("category not found"),
        e @ CategoryError::Duplicate(_) => ApiError::new(StatusCode::CONFLICT, e.to_string()),
        CategoryError::Database(e) => ApiError::internal(e),
    }
}

pub(crate) fn parse_kind_param(raw: Option<&str>) -> Result<Option<EntryKind>, ApiError> {
    raw.filter(|v| !v.trim().is_empty())
        .map(|v| EntryKind::parse(v).ok_or_else(|| ApiError::bad_request("kind must be income or expense")))
        .transpose()
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub kind: Option<String>,
}

/// `GET /api/categories?kind=`
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let kind = parse_kind_param(query.kind.as_deref())?;
    let rows = category::list_categories(&state.pool, auth.user.id, kind)
        .await
        .map_err(category_error_to_api)?;
    Ok(Json(rows))
}

/// `POST /api/categories`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let created = category::create_category(&state.pool, auth.user.id, &body)
        .await
        .map_err(category_error_to_api)?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
pub struct UpdateCategoryBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
}

/// `PATCH /api/categories/{id}`
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(category_id): Path<Uuid>,
    Json(body): Json<UpdateCategoryBody>,
) -> Result<Json<Category>, ApiError> {
    let update = CategoryUpdate { name: body.name, color: body.color };
    let updated = category::update_category(&state.pool, auth.user.id, category_id, &update)
        .await
        .map_err(category_error_to_api)?;
    Ok(Json(updated))
}

/// `DELETE /api/categories/{id}`
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    category::delete_category(&state.pool, auth.user.id, category_id)
        .await
        .map_err(category_error_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}
