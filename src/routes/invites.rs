//! Family invite routes: sending and revoking on the family side, answering
//! on the recipient side.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiError;
use super::families::family_error_to_api;
use crate::mail::{self, InviteMail};
use crate::routes::auth::AuthUser;
use crate::services::family::FamilyRole;
use crate::services::invite::{self, FamilyInvite, InviteError, InviteRef, InviteResponse, IssuedInvite, ReceivedInvite};
use crate::state::AppState;

pub(crate) fn invite_error_to_api(err: InviteError) -> ApiError {
    match err {
        InviteError::Invalid(msg) => ApiError::bad_request(msg),
        e @ InviteError::NotFound => ApiError::not_found(e.to_string()),
        InviteError::Conflict(msg) => ApiError::new(StatusCode::CONFLICT, msg),
        e @ InviteError::Expired => ApiError::new(StatusCode::GONE, e.to_string()),
        e @ InviteError::AlreadyResolved(_) => ApiError::new(StatusCode::CONFLICT, e.to_string()),
        InviteError::Family(e) => family_error_to_api(e),
        InviteError::Database(e) => ApiError::internal(e),
    }
}

#[derive(Deserialize)]
pub struct CreateInviteBody {
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateInviteResponse {
    pub invite: FamilyInvite,
    pub email_sent: bool,
}

/// `GET /api/families/{id}/invites`
pub async fn list_for_family(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(family_id): Path<Uuid>,
) -> Result<Json<Vec<FamilyInvite>>, ApiError> {
    let rows = invite::list_family_invites(&state.pool, auth.user.id, family_id)
        .await
        .map_err(invite_error_to_api)?;
    Ok(Json(rows))
}

/// `POST /api/families/{id}/invites`: create an invite and email the link.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(family_id): Path<Uuid>,
    Json(body): Json<CreateInviteBody>,
) -> Result<(StatusCode, Json<CreateInviteResponse>), ApiError> {
    let role = body
        .role
        .as_deref()
        .map(|raw| FamilyRole::parse(raw).ok_or_else(|| ApiError::bad_request("role must be admin or member")))
        .transpose()?;

    let quota_key = invite_quota_key(auth.user.id);
    state
        .mail_limiter
        .check(&quota_key)
        .map_err(|e| ApiError::new(StatusCode::TOO_MANY_REQUESTS, e.to_string()))?;

    let issued = invite::create_invite(&state.pool, state.config.invite_ttl, auth.user.id, family_id, &body.email, role)
        .await
        .map_err(invite_error_to_api)?;
    let email_sent = send_invite_mail(&state, &quota_key, &issued).await;

    Ok((StatusCode::CREATED, Json(CreateInviteResponse { invite: issued.invite, email_sent })))
}

fn invite_quota_key(user_id: Uuid) -> String {
    format!("invite:{user_id}")
}

/// Record the send against the inviter's quota, then mail the link.
/// Returns whether the message went out.
async fn send_invite_mail(state: &AppState, quota_key: &str, issued: &IssuedInvite) -> bool {
    if let Err(e) = state.mail_limiter.check_and_record(quota_key) {
        tracing::warn!(error = %e, invite_id = %issued.invite.id, "invite email skipped by rate limit");
        return false;
    }

    let link = invite::accept_link(&state.config.app_base_url, &issued.token);
    let expires_on = issued.invite.expires_at.date().to_string();
    let message = mail::family_invite_message(&InviteMail {
        email: &issued.invite.email,
        family_name: &issued.family_name,
        inviter_name: &issued.inviter_name,
        link: &link,
        expires_on: &expires_on,
    });
    match state.mailer.send(message).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, invite_id = %issued.invite.id, "invite email delivery failed");
            false
        }
    }
}

/// `DELETE /api/families/{id}/invites/{invite_id}`
pub async fn revoke(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((family_id, invite_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    invite::revoke_invite(&state.pool, auth.user.id, family_id, invite_id)
        .await
        .map_err(invite_error_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/invites`: pending invites addressed to the caller.
pub async fn list_mine(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<ReceivedInvite>>, ApiError> {
    let rows = invite::list_my_invites(&state.pool, auth.user.id)
        .await
        .map_err(invite_error_to_api)?;
    Ok(Json(rows))
}

/// `POST /api/invites/{id}/accept`
pub async fn accept(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invite_id): Path<Uuid>,
) -> Result<Json<InviteResponse>, ApiError> {
    let response = invite::accept_invite(&state.pool, auth.user.id, &InviteRef::Id(invite_id))
        .await
        .map_err(invite_error_to_api)?;
    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct AcceptTokenBody {
    pub token: String,
}

/// `POST /api/invites/accept`: accept using the emailed token.
pub async fn accept_by_token(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AcceptTokenBody>,
) -> Result<Json<InviteResponse>, ApiError> {
    if body.token.trim().is_empty() {
        return Err(ApiError::bad_request("token is required"));
    }
    let response = invite::accept_invite(&state.pool, auth.user.id, &InviteRef::Token(body.token))
        .await
        .map_err(invite_error_to_api)?;
    Ok(Json(response))
}

/// `POST /api/invites/{id}/decline`
pub async fn decline(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invite_id): Path<Uuid>,
) -> Result<Json<InviteResponse>, ApiError> {
    let response = invite::decline_invite(&state.pool, auth.user.id, invite_id)
        .await
        .map_err(invite_error_to_api)?;
    Ok(Json(response))
}
