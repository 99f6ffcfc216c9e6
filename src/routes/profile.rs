//! Profile settings routes.

use axum::extract::State;
use axum::response::Json;

use super::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::profile::{self, Profile, ProfileError, ProfileUpdate};
use crate::state::AppState;

pub(crate) fn profile_error_to_api(err: ProfileError) -> ApiError {
    match err {
        ProfileError::Invalid(msg) => ApiError::bad_request(msg),
        ProfileError::NotFound(_) => ApiError::not_found("profile not found"),
        ProfileError::Database(e) => ApiError::internal(e),
    }
}

/// `GET /api/profile`
pub async fn get_profile(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Profile>, ApiError> {
    let profile = profile::get_profile(&state.pool, auth.user.id)
        .await
        .map_err(profile_error_to_api)?;
    Ok(Json(profile))
}

/// `PATCH /api/profile`: change display name and/or currency.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    let profile = profile::update_profile(&state.pool, auth.user.id, &body)
        .await
        .map_err(profile_error_to_api)?;
    Ok(Json(profile))
}
