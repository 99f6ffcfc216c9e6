//! Family invite service.
//!
//! DESIGN
//! ======
//! An invite is addressed to an email and carries a random token; only the
//! token's SHA-256 hash is stored. Its status is `pending`, `accepted` or
//! `declined`. Expiry is a clock check against `expires_at`, never a stored
//! status, so an expired invite needs no background job to become expired.
//!
//! Whether an accept or decline may proceed is decided by the pure
//! [`transition`] function. The database write repeats the same guard in
//! its `WHERE` clause and runs with the invite row locked, so two racing
//! accepts produce one membership and one status change.

use std::time::Duration;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::email_auth::{hash_secret, normalize_email};
use super::family::{self, FamilyPermission, FamilyRole};
use super::is_unique_violation;
use super::session::generate_token;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("{0}")]
    Invalid(String),
    #[error("invite not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("invite has expired")]
    Expired,
    #[error("invite was already {}", .0.as_str())]
    AlreadyResolved(InviteStatus),
    #[error(transparent)]
    Family(#[from] family::FamilyError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

impl InviteStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteAction {
    Accept,
    Decline,
}

impl InviteAction {
    /// Status an invite ends in after this action.
    #[must_use]
    pub fn target(self) -> InviteStatus {
        match self {
            Self::Accept => InviteStatus::Accepted,
            Self::Decline => InviteStatus::Declined,
        }
    }
}

/// Outcome of applying an action to an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move the invite to the given status.
    Apply(InviteStatus),
    /// The action was already applied; nothing to do.
    Unchanged(InviteStatus),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FamilyInvite {
    pub id: Uuid,
    pub family_id: Uuid,
    pub email: String,
    pub role: FamilyRole,
    pub status: InviteStatus,
    pub invited_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub responded_at: Option<OffsetDateTime>,
}

/// A pending invite as seen by its recipient.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReceivedInvite {
    pub id: Uuid,
    pub family_id: Uuid,
    pub family_name: String,
    pub inviter_name: Option<String>,
    pub role: FamilyRole,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// A freshly created invite plus what the caller needs to mail it.
#[derive(Debug, Clone)]
pub struct IssuedInvite {
    pub invite: FamilyInvite,
    /// Plaintext token; never stored.
    pub token: String,
    pub family_name: String,
    pub inviter_name: String,
}

/// How the recipient names the invite they respond to.
#[derive(Debug, Clone)]
pub enum InviteRef {
    Id(Uuid),
    Token(String),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct InviteResponse {
    pub invite: FamilyInvite,
    /// False when the same action had already been applied.
    pub changed: bool,
}

// =============================================================================
// RULES
// =============================================================================

/// Decide what `action` does to an invite in `status`.
///
/// # Errors
///
/// `Expired` for a pending invite past its expiry, `AlreadyResolved` when
/// the invite was resolved the other way.
pub fn transition(status: InviteStatus, action: InviteAction, expired: bool) -> Result<Transition, InviteError> {
    match status {
        InviteStatus::Pending if expired => Err(InviteError::Expired),
        InviteStatus::Pending => Ok(Transition::Apply(action.target())),
        resolved if resolved == action.target() => Ok(Transition::Unchanged(resolved)),
        resolved => Err(InviteError::AlreadyResolved(resolved)),
    }
}

/// Roles an invite may grant. Defaults to `member`.
///
/// # Errors
///
/// `Invalid` when asked for `owner`.
pub fn invite_role(requested: Option<FamilyRole>) -> Result<FamilyRole, InviteError> {
    match requested.unwrap_or(FamilyRole::Member) {
        FamilyRole::Owner => Err(InviteError::Invalid("invites cannot grant the owner role".to_owned())),
        role => Ok(role),
    }
}

/// Link embedded in invite emails.
#[must_use]
pub fn accept_link(base_url: &str, token: &str) -> String {
    format!("{}/invites/accept?token={token}", base_url.trim_end_matches('/'))
}

fn invite_from_row(row: &PgRow) -> Result<FamilyInvite, sqlx::Error> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;
    Ok(FamilyInvite {
        id: row.try_get("id")?,
        family_id: row.try_get("family_id")?,
        email: row.try_get("email")?,
        role: FamilyRole::parse(&role)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown invite role: {role}").into()))?,
        status: InviteStatus::parse(&status)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown invite status: {status}").into()))?,
        invited_by: row.try_get("invited_by")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        responded_at: row.try_get("responded_at")?,
    })
}

const INVITE_COLUMNS: &str =
    "id, family_id, email, role, status, invited_by, expires_at, created_at, responded_at";

// =============================================================================
// FAMILY SIDE
// =============================================================================

/// Invite `email` into a family. Replaces any pending invite for the same
/// address so only the newest link works.
///
/// # Errors
///
/// Family errors unless the caller is an owner or admin; `Invalid` for a bad
/// address or role; `Conflict` when the address already belongs to a member.
pub async fn create_invite(
    pool: &PgPool,
    ttl: Duration,
    inviter_id: Uuid,
    family_id: Uuid,
    email: &str,
    role: Option<FamilyRole>,
) -> Result<IssuedInvite, InviteError> {
    family::ensure_permission(pool, family_id, inviter_id, FamilyPermission::Admin).await?;
    let role = invite_role(role)?;
    let email = normalize_email(email).ok_or_else(|| InviteError::Invalid("invalid email".to_owned()))?;

    let already_member: bool = sqlx::query_scalar(
        r"SELECT EXISTS (
              SELECT 1 FROM family_members m
              JOIN users u ON u.id = m.user_id
              WHERE m.family_id = $1 AND u.email = $2
          )",
    )
    .bind(family_id)
    .bind(&email)
    .fetch_one(pool)
    .await?;
    if already_member {
        return Err(InviteError::Conflict(format!("{email} is already a member")));
    }

    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + ttl;

    let mut tx = pool.begin().await?;
    let replaced = sqlx::query("DELETE FROM family_invites WHERE family_id = $1 AND email = $2 AND status = 'pending'")
        .bind(family_id)
        .bind(&email)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let row = sqlx::query(&format!(
        "INSERT INTO family_invites (family_id, email, invited_by, role, token_hash, expires_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {INVITE_COLUMNS}"
    ))
    .bind(family_id)
    .bind(&email)
    .bind(inviter_id)
    .bind(role.as_str())
    .bind(hash_secret(&token))
    .bind(expires_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            InviteError::Conflict(format!("an invite to {email} is already being sent"))
        } else {
            InviteError::Database(e)
        }
    })?;
    let invite = invite_from_row(&row)?;

    let names = sqlx::query(
        r"SELECT f.name AS family_name, u.display_name AS inviter_name
          FROM families f, users u
          WHERE f.id = $1 AND u.id = $2",
    )
    .bind(family_id)
    .bind(inviter_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(invite_id = %invite.id, %family_id, %inviter_id, replaced, "family invite created");
    Ok(IssuedInvite {
        invite,
        token,
        family_name: names.try_get("family_name")?,
        inviter_name: names.try_get("inviter_name")?,
    })
}

/// All invites a family has sent, newest first.
///
/// # Errors
///
/// Family errors unless the caller is an owner or admin.
pub async fn list_family_invites(
    pool: &PgPool,
    user_id: Uuid,
    family_id: Uuid,
) -> Result<Vec<FamilyInvite>, InviteError> {
    family::ensure_permission(pool, family_id, user_id, FamilyPermission::Admin).await?;
    let rows = sqlx::query(&format!(
        "SELECT {INVITE_COLUMNS} FROM family_invites WHERE family_id = $1 ORDER BY created_at DESC"
    ))
    .bind(family_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(invite_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

/// Withdraw a pending invite.
///
/// # Errors
///
/// `NotFound` for an unknown invite, `AlreadyResolved` once it was answered.
pub async fn revoke_invite(pool: &PgPool, user_id: Uuid, family_id: Uuid, invite_id: Uuid) -> Result<(), InviteError> {
    family::ensure_permission(pool, family_id, user_id, FamilyPermission::Admin).await?;
    let status: Option<String> =
        sqlx::query_scalar("DELETE FROM family_invites WHERE id = $1 AND family_id = $2 AND status = 'pending' RETURNING status")
            .bind(invite_id)
            .bind(family_id)
            .fetch_optional(pool)
            .await?;
    if status.is_some() {
        tracing::info!(%invite_id, %family_id, %user_id, "family invite revoked");
        return Ok(());
    }

    let existing: Option<String> =
        sqlx::query_scalar("SELECT status FROM family_invites WHERE id = $1 AND family_id = $2")
            .bind(invite_id)
            .bind(family_id)
            .fetch_optional(pool)
            .await?;
    match existing.as_deref().and_then(InviteStatus::parse) {
        Some(resolved) => Err(InviteError::AlreadyResolved(resolved)),
        None => Err(InviteError::NotFound),
    }
}

// =============================================================================
// RECIPIENT SIDE
// =============================================================================

/// Pending, unexpired invites addressed to the caller's email.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_my_invites(pool: &PgPool, user_id: Uuid) -> Result<Vec<ReceivedInvite>, InviteError> {
    let rows = sqlx::query(
        r"SELECT i.id, i.family_id, f.name AS family_name, inviter.display_name AS inviter_name,
                 i.role, i.expires_at
          FROM family_invites i
          JOIN users me ON me.email = i.email
          JOIN families f ON f.id = i.family_id
          LEFT JOIN users inviter ON inviter.id = i.invited_by
          WHERE me.id = $1 AND i.status = 'pending' AND i.expires_at > now()
          ORDER BY i.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| -> Result<ReceivedInvite, InviteError> {
            let role: String = r.try_get("role")?;
            Ok(ReceivedInvite {
                id: r.try_get("id")?,
                family_id: r.try_get("family_id")?,
                family_name: r.try_get("family_name")?,
                inviter_name: r.try_get("inviter_name")?,
                role: FamilyRole::parse(&role).ok_or_else(|| InviteError::Invalid(format!("unknown role: {role}")))?,
                expires_at: r.try_get("expires_at")?,
            })
        })
        .collect()
}

async fn lock_invite(tx: &mut Transaction<'_, Postgres>, target: &InviteRef) -> Result<Option<FamilyInvite>, sqlx::Error> {
    let row = match target {
        InviteRef::Id(id) => {
            sqlx::query(&format!("SELECT {INVITE_COLUMNS} FROM family_invites WHERE id = $1 FOR UPDATE"))
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?
        }
        InviteRef::Token(token) => {
            sqlx::query(&format!("SELECT {INVITE_COLUMNS} FROM family_invites WHERE token_hash = $1 FOR UPDATE"))
                .bind(hash_secret(token.trim()))
                .fetch_optional(&mut **tx)
                .await?
        }
    };
    row.as_ref().map(invite_from_row).transpose()
}

async fn respond(
    pool: &PgPool,
    user_id: Uuid,
    target: &InviteRef,
    action: InviteAction,
) -> Result<InviteResponse, InviteError> {
    let mut tx = pool.begin().await?;
    let invite = lock_invite(&mut tx, target).await?.ok_or(InviteError::NotFound)?;

    let email: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if email.as_deref() != Some(invite.email.as_str()) {
        return Err(InviteError::NotFound);
    }

    let expired = invite.expires_at <= OffsetDateTime::now_utc();
    let next = match transition(invite.status, action, expired)? {
        Transition::Unchanged(_) => return Ok(InviteResponse { invite, changed: false }),
        Transition::Apply(next) => next,
    };

    let row = sqlx::query(&format!(
        "UPDATE family_invites
         SET status = $2, responded_at = now()
         WHERE id = $1 AND status = 'pending' AND expires_at > now()
         RETURNING {INVITE_COLUMNS}"
    ))
    .bind(invite.id)
    .bind(next.as_str())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(InviteError::Expired)?;
    let updated = invite_from_row(&row)?;

    if action == InviteAction::Accept {
        sqlx::query(
            r"INSERT INTO family_members (family_id, user_id, role)
              VALUES ($1, $2, $3)
              ON CONFLICT (family_id, user_id) DO NOTHING",
        )
        .bind(updated.family_id)
        .bind(user_id)
        .bind(updated.role.as_str())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        invite_id = %updated.id,
        family_id = %updated.family_id,
        %user_id,
        status = next.as_str(),
        "family invite answered"
    );
    Ok(InviteResponse { invite: updated, changed: true })
}

/// Accept an invite by ID or token and join the family.
///
/// # Errors
///
/// `NotFound` when the invite does not exist or is addressed to someone
/// else; `Expired` and `AlreadyResolved` per [`transition`].
pub async fn accept_invite(pool: &PgPool, user_id: Uuid, target: &InviteRef) -> Result<InviteResponse, InviteError> {
    respond(pool, user_id, target, InviteAction::Accept).await
}

/// # Errors
///
/// Same as [`accept_invite`].
pub async fn decline_invite(pool: &PgPool, user_id: Uuid, invite_id: Uuid) -> Result<InviteResponse, InviteError> {
    respond(pool, user_id, &InviteRef::Id(invite_id), InviteAction::Decline).await
}

#[cfg(test)]
#[path = "invite_test.rs"]
mod tests;
