//! Email access-code auth service.
//!
//! Creates and verifies short-lived six-character codes linked to an email.
//! Only the SHA-256 hash of a code is stored.

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::profile;
use super::session::to_hex;

const CODE_LEN: usize = 6;
const CODE_TTL: Duration = Duration::minutes(10);
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_FAILED_ATTEMPTS: i32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum EmailAuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid code")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let mut parts = normalized.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    if local.is_empty() || domain.is_empty() || normalized.chars().any(char::is_whitespace) {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let normalized = code.trim().to_ascii_uppercase();
    if normalized.len() != CODE_LEN
        || !normalized
            .bytes()
            .all(|c| CODE_ALPHABET.contains(&c))
    {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// SHA-256 hex digest; used for login codes and invite tokens alike.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    to_hex(&Sha256::digest(secret.as_bytes()))
}

/// Result of checking one submitted code against the newest live code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Accepted,
    /// Wrong code. `burned` is set once the attempt limit is reached.
    Rejected { burned: bool },
}

/// Compare hashes and count the attempt. `attempts` is the number of
/// failures recorded before this one.
#[must_use]
pub fn check_code(stored_hash: &str, submitted_hash: &str, attempts: i32) -> CodeCheck {
    if stored_hash == submitted_hash {
        CodeCheck::Accepted
    } else {
        CodeCheck::Rejected { burned: attempts.saturating_add(1) >= MAX_FAILED_ATTEMPTS }
    }
}

/// Issue a fresh code for `email`, creating the profile on first use.
/// Earlier unused codes for the address stop working.
///
/// Returns the normalized email and the plaintext code for delivery.
///
/// # Errors
///
/// Returns `InvalidEmail` for malformed input or a database error.
pub async fn request_access_code(pool: &PgPool, email: &str) -> Result<(String, String), EmailAuthError> {
    let email = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    profile::ensure_user(pool, &email).await?;

    let code = generate_access_code();
    let mut tx = pool.begin().await?;
    let replaced = sqlx::query("DELETE FROM email_login_codes WHERE email = $1 AND consumed_at IS NULL")
        .bind(&email)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("INSERT INTO email_login_codes (email, code_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(&email)
        .bind(hash_secret(&code))
        .bind(OffsetDateTime::now_utc() + CODE_TTL)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::debug!(%email, replaced, "login code issued");
    Ok((email, code))
}

/// Check `code` against the newest live code for `email` and consume it on
/// a match. The code row is locked while the attempt is counted.
///
/// # Errors
///
/// Returns `VerificationFailed` when no live code exists or the code does
/// not match; the fifth failure burns the code.
pub async fn verify_access_code(pool: &PgPool, email: &str, code: &str) -> Result<Uuid, EmailAuthError> {
    let email = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    let code = normalize_code(code).ok_or(EmailAuthError::InvalidCode)?;

    let mut tx = pool.begin().await?;
    let Some(row) = sqlx::query(
        r"SELECT c.id, c.code_hash, c.attempts, u.id AS user_id
          FROM email_login_codes c
          JOIN users u ON u.email = c.email
          WHERE c.email = $1 AND c.consumed_at IS NULL AND c.expires_at > now()
          ORDER BY c.created_at DESC
          LIMIT 1
          FOR UPDATE OF c",
    )
    .bind(&email)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Err(EmailAuthError::VerificationFailed);
    };
    let code_id: Uuid = row.try_get("id")?;
    let stored_hash: String = row.try_get("code_hash")?;
    let attempts: i32 = row.try_get("attempts")?;

    let outcome = check_code(&stored_hash, &hash_secret(&code), attempts);
    let burn = match outcome {
        CodeCheck::Accepted => true,
        CodeCheck::Rejected { burned } => burned,
    };
    sqlx::query(
        r"UPDATE email_login_codes
          SET attempts = attempts + $2,
              consumed_at = CASE WHEN $3 THEN now() ELSE consumed_at END
          WHERE id = $1",
    )
    .bind(code_id)
    .bind(i32::from(outcome != CodeCheck::Accepted))
    .bind(burn)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    match outcome {
        CodeCheck::Accepted => Ok(row.try_get("user_id")?),
        CodeCheck::Rejected { burned } => {
            tracing::info!(%email, burned, "login code rejected");
            Err(EmailAuthError::VerificationFailed)
        }
    }
}

#[cfg(test)]
#[path = "email_auth_test.rs"]
mod tests;
