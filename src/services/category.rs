//! Category service: per-user labels for income and expense entries.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::transaction::{EntryKind, decode_kind};
use super::{is_unique_violation, validate};

const CATEGORY_NAME_MAX: usize = 50;

/// Seeded for every new profile: `(name, kind, color)`.
pub const DEFAULT_CATEGORIES: &[(&str, EntryKind, &str)] = &[
    ("Salary", EntryKind::Income, "#2E7D32"),
    ("Other income", EntryKind::Income, "#66BB6A"),
    ("Groceries", EntryKind::Expense, "#EF6C00"),
    ("Housing", EntryKind::Expense, "#5D4037"),
    ("Transport", EntryKind::Expense, "#1565C0"),
    ("Utilities", EntryKind::Expense, "#00838F"),
    ("Entertainment", EntryKind::Expense, "#8E24AA"),
    ("Health", EntryKind::Expense, "#C62828"),
    ("Other", EntryKind::Expense, "#757575"),
];

#[derive(Debug, thiserror::Error)]
pub enum CategoryError {
    #[error("{0}")]
    Invalid(String),
    #[error("category not found: {0}")]
    NotFound(Uuid),
    #[error("a category named {0:?} already exists for that kind")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub kind: EntryKind,
    pub color: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub kind: EntryKind,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    /// Outer `Some` means present; `Some(None)` clears the color.
    pub color: Option<Option<String>>,
}

fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: decode_kind(&kind)?,
        color: row.try_get("color")?,
        created_at: row.try_get("created_at")?,
    })
}

fn clean_name(raw: &str) -> Result<String, CategoryError> {
    validate::required_text(raw, "category name", CATEGORY_NAME_MAX).map_err(CategoryError::Invalid)
}

fn clean_color(raw: Option<&str>) -> Result<Option<String>, CategoryError> {
    raw.map(validate::hex_color)
        .transpose()
        .map_err(CategoryError::Invalid)
}

/// Insert the default category set inside an open transaction.
///
/// # Errors
///
/// Returns a database error if an insert fails.
pub async fn seed_default_categories(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<(), sqlx::Error> {
    for (name, kind, color) in DEFAULT_CATEGORIES {
        sqlx::query(
            r"INSERT INTO categories (user_id, name, kind, color)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(*name)
        .bind(kind.as_str())
        .bind(*color)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_categories(
    pool: &PgPool,
    user_id: Uuid,
    kind: Option<EntryKind>,
) -> Result<Vec<Category>, CategoryError> {
    let rows = sqlx::query(
        r"SELECT id, name, kind, color, created_at
          FROM categories
          WHERE user_id = $1 AND ($2::text IS NULL OR kind = $2)
          ORDER BY kind, lower(name)",
    )
    .bind(user_id)
    .bind(kind.map(EntryKind::as_str))
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(category_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

/// # Errors
///
/// `Invalid` for bad input, `Duplicate` when the name is taken for the kind.
pub async fn create_category(pool: &PgPool, user_id: Uuid, input: &NewCategory) -> Result<Category, CategoryError> {
    let name = clean_name(&input.name)?;
    let color = clean_color(input.color.as_deref())?;

    let row = sqlx::query(
        r"INSERT INTO categories (user_id, name, kind, color)
          VALUES ($1, $2, $3, $4)
          RETURNING id, name, kind, color, created_at",
    )
    .bind(user_id)
    .bind(&name)
    .bind(input.kind.as_str())
    .bind(color)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            CategoryError::Duplicate(name.clone())
        } else {
            CategoryError::Database(e)
        }
    })?;
    Ok(category_from_row(&row)?)
}

/// # Errors
///
/// `NotFound` when the category is not the caller's.
pub async fn update_category(
    pool: &PgPool,
    user_id: Uuid,
    category_id: Uuid,
    update: &CategoryUpdate,
) -> Result<Category, CategoryError> {
    let name = update.name.as_deref().map(clean_name).transpose()?;
    let color = match &update.color {
        Some(color) => Some(clean_color(color.as_deref())?),
        None => None,
    };

    let row = sqlx::query(
        r"UPDATE categories
          SET name = COALESCE($3, name),
              color = CASE WHEN $4 THEN $5 ELSE color END
          WHERE id = $1 AND user_id = $2
          RETURNING id, name, kind, color, created_at",
    )
    .bind(category_id)
    .bind(user_id)
    .bind(&name)
    .bind(color.is_some())
    .bind(color.flatten())
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            CategoryError::Duplicate(name.clone().unwrap_or_default())
        } else {
            CategoryError::Database(e)
        }
    })?
    .ok_or(CategoryError::NotFound(category_id))?;
    Ok(category_from_row(&row)?)
}

/// Delete a category; referencing transactions become uncategorized.
///
/// # Errors
///
/// `NotFound` when the category is not the caller's.
pub async fn delete_category(pool: &PgPool, user_id: Uuid, category_id: Uuid) -> Result<(), CategoryError> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
        .bind(category_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CategoryError::NotFound(category_id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "category_test.rs"]
mod tests;
