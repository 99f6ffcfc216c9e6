//! Cookie sessions.
//!
//! A session row is keyed by an opaque 64-character hex token. Validation
//! joins the owning profile so the auth extractor needs a single round trip.

use std::time::Duration;

use rand::Rng;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

const TOKEN_BYTES: usize = 32;

/// Lowercase hex encoding.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Random token for sessions and invite links.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0_u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes[..]);
    to_hex(&bytes)
}

/// The signed-in profile attached to a request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub currency: String,
}

impl SessionUser {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            currency: row.try_get("currency")?,
        })
    }
}

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl IssuedSession {
    /// Time left before expiry, never negative.
    #[must_use]
    pub fn remaining(&self, now: OffsetDateTime) -> time::Duration {
        (self.expires_at - now).max(time::Duration::ZERO)
    }
}

/// # Errors
///
/// Database errors only.
pub async fn create_session(pool: &PgPool, user_id: Uuid, ttl: Duration) -> Result<IssuedSession, sqlx::Error> {
    let session = IssuedSession { token: generate_token(), expires_at: OffsetDateTime::now_utc() + ttl };
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(&session.token)
        .bind(user_id)
        .bind(session.expires_at)
        .execute(pool)
        .await?;
    tracing::debug!(%user_id, "session created");
    Ok(session)
}

/// Profile behind a live session, or `None` for unknown and expired tokens.
///
/// # Errors
///
/// Database errors only.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, sqlx::Error> {
    sqlx::query(
        r"SELECT u.id, u.email, u.display_name, u.currency
          FROM sessions s
          JOIN users u ON u.id = s.user_id
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?
    .as_ref()
    .map(SessionUser::from_row)
    .transpose()
}

/// Returns whether a session was removed.
///
/// # Errors
///
/// Database errors only.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
