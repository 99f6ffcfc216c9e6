//! Auth routes: email code sign-in, session cookie, logout.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use super::ApiError;
use crate::mail;
use crate::services::email_auth::{self, EmailAuthError};
use crate::services::{profile, session};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "not signed in"));
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await
            .map_err(ApiError::internal)?
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "session expired"))?;

        Ok(Self { user, token: token.to_owned() })
    }
}

fn session_cookie(value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

pub(crate) fn email_auth_error_to_api(err: EmailAuthError) -> ApiError {
    match err {
        EmailAuthError::InvalidEmail | EmailAuthError::InvalidCode => ApiError::bad_request(err.to_string()),
        EmailAuthError::VerificationFailed => ApiError::new(StatusCode::UNAUTHORIZED, err.to_string()),
        EmailAuthError::Db(e) => ApiError::internal(e),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RequestCodeBody {
    pub email: String,
}

/// `POST /api/auth/email/request-code`: mail a sign-in code.
pub async fn request_email_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = email_auth::normalize_email(&body.email).ok_or_else(|| ApiError::bad_request("invalid email"))?;
    state
        .mail_limiter
        .check_and_record(&email)
        .map_err(|e| ApiError::new(StatusCode::TOO_MANY_REQUESTS, e.to_string()))?;

    let (email, code) = email_auth::request_access_code(&state.pool, &email)
        .await
        .map_err(email_auth_error_to_api)?;

    if let Err(e) = state
        .mailer
        .send(mail::login_code_message(&email, &code))
        .await
    {
        tracing::error!(error = %e, %email, "login code delivery failed");
        return Err(ApiError::new(StatusCode::BAD_GATEWAY, "could not send sign-in email"));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    pub email: String,
    pub code: String,
}

/// `POST /api/auth/email/verify-code`: exchange a code for a session cookie.
pub async fn verify_email_code(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<VerifyCodeBody>,
) -> Result<(CookieJar, Json<profile::Profile>), ApiError> {
    let user_id = email_auth::verify_access_code(&state.pool, &body.email, &body.code)
        .await
        .map_err(email_auth_error_to_api)?;

    let issued = session::create_session(&state.pool, user_id, state.config.session_ttl)
        .await
        .map_err(ApiError::internal)?;
    let profile = profile::get_profile(&state.pool, user_id)
        .await
        .map_err(super::profile::profile_error_to_api)?;

    let max_age = issued.remaining(time::OffsetDateTime::now_utc());
    let jar = jar.add(session_cookie(issued.token, state.config.cookie_secure, max_age));
    tracing::info!(%user_id, "signed in with email code");
    Ok((jar, Json(profile)))
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match session::delete_session(&state.pool, &auth.token).await {
        Ok(removed) => tracing::debug!(user_id = %auth.user.id, removed, "signed out"),
        Err(e) => tracing::warn!(error = %e, user_id = %auth.user.id, "session delete failed during logout"),
    }

    let jar = CookieJar::new().add(session_cookie(String::new(), state.config.cookie_secure, Duration::ZERO));
    (jar, StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
