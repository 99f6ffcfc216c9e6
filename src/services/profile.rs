//! Profile service: user rows and per-user settings.
//!
//! A profile is created the first time an email address requests a login
//! code. New profiles get the default category set in the same transaction
//! so the first transaction form is never empty.

use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{category, validate};

const DISPLAY_NAME_MAX: usize = 60;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("{0}")]
    Invalid(String),
    #[error("profile not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub currency: String,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
}

/// Partial settings update. `None` leaves a field untouched.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub currency: Option<String>,
}

pub(crate) fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user")
        .to_owned()
}

/// Return the user ID for `email`, creating the profile if needed.
///
/// `email` must already be normalized.
///
/// # Errors
///
/// Returns a database error if the upsert or seeding fails.
pub async fn ensure_user(pool: &PgPool, email: &str) -> Result<Uuid, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r"INSERT INTO users (email, display_name)
          VALUES ($1, $2)
          ON CONFLICT (email) DO NOTHING
          RETURNING id",
    )
    .bind(email)
    .bind(name_from_email(email))
    .fetch_optional(&mut *tx)
    .await?;

    let user_id = match inserted {
        Some(row) => {
            let user_id: Uuid = row.get("id");
            category::seed_default_categories(&mut tx, user_id).await?;
            tracing::info!(%user_id, "profile created");
            user_id
        }
        None => {
            sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(&mut *tx)
                .await?
        }
    };

    tx.commit().await?;
    Ok(user_id)
}

/// # Errors
///
/// Returns `NotFound` if the user row is gone.
pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<Profile, ProfileError> {
    let row = sqlx::query_as::<_, (Uuid, String, String, String, OffsetDateTime)>(
        "SELECT id, email, display_name, currency, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ProfileError::NotFound(user_id))?;

    Ok(Profile { id: row.0, email: row.1, display_name: row.2, currency: row.3, member_since: row.4 })
}

/// Validate a settings update without touching the database.
///
/// # Errors
///
/// Returns `Invalid` with the first failing field.
pub fn validate_update(update: &ProfileUpdate) -> Result<ProfileUpdate, ProfileError> {
    let display_name = update
        .display_name
        .as_deref()
        .map(|raw| validate::required_text(raw, "display name", DISPLAY_NAME_MAX))
        .transpose()
        .map_err(ProfileError::Invalid)?;
    let currency = update
        .currency
        .as_deref()
        .map(validate::currency_code)
        .transpose()
        .map_err(ProfileError::Invalid)?;
    Ok(ProfileUpdate { display_name, currency })
}

/// Apply a settings update and return the fresh profile.
///
/// # Errors
///
/// Returns `Invalid` for bad input, `NotFound` if the user is gone.
pub async fn update_profile(pool: &PgPool, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile, ProfileError> {
    let clean = validate_update(update)?;

    let result = sqlx::query(
        r"UPDATE users
          SET display_name = COALESCE($2, display_name),
              currency = COALESCE($3, currency)
          WHERE id = $1",
    )
    .bind(user_id)
    .bind(clean.display_name)
    .bind(clean.currency)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ProfileError::NotFound(user_id));
    }
    get_profile(pool, user_id).await
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
