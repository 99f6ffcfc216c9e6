//! Transaction service: income/expense ledger entries.
//!
//! DESIGN
//! ======
//! Amounts are stored as positive integer cents; the `kind` column carries
//! the sign. A transaction is personal by default and can be shared with a
//! family the creator belongs to. Visibility and mutation rules:
//! - the creator always sees and edits their own entries,
//! - family members see entries shared with their family,
//! - family owners/admins may also edit or delete shared entries.
//!
//! Updates are applied in Rust on a loaded row (`apply_patch`) and written
//! back in full, so validation runs on the final state rather than on
//! partial SQL fragments.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::family::{self, FamilyPermission, FamilyRole};
use super::validate;

const DESCRIPTION_MAX: usize = 200;
pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 500;
pub const EXPORT_VERSION: u32 = 1;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("{0}")]
    Invalid(String),
    #[error("transaction not found: {0}")]
    NotFound(Uuid),
    #[error("not allowed to modify transaction: {0}")]
    Forbidden(Uuid),
    #[error(transparent)]
    Family(#[from] family::FamilyError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

pub(crate) fn decode_kind(raw: &str) -> Result<EntryKind, sqlx::Error> {
    EntryKind::parse(raw).ok_or_else(|| sqlx::Error::Decode(format!("unknown entry kind: {raw}").into()))
}

/// Which ledger a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Entries the caller created and did not share with a family.
    Personal,
    /// Everything shared with one family.
    Family(Uuid),
}

impl Scope {
    #[must_use]
    pub fn from_family(family_id: Option<Uuid>) -> Self {
        family_id.map_or(Self::Personal, Self::Family)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub family_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub kind: EntryKind,
    pub amount_cents: i64,
    pub description: String,
    pub occurred_on: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewTransaction {
    pub kind: EntryKind,
    pub amount_cents: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub occurred_on: Option<Date>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub family_id: Option<Uuid>,
}

/// Partial update. For nullable columns the outer `Option` means "present",
/// the inner one the new value.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub kind: Option<EntryKind>,
    pub amount_cents: Option<i64>,
    pub description: Option<String>,
    pub occurred_on: Option<Date>,
    pub category_id: Option<Option<Uuid>>,
    pub family_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub family_id: Option<Uuid>,
    pub from: Option<Date>,
    pub to: Option<Date>,
    pub kind: Option<EntryKind>,
    pub category_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One parsed line of a JSON Lines import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedEntry {
    pub kind: EntryKind,
    pub amount_cents: i64,
    pub description: String,
    pub occurred_on: Date,
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

// =============================================================================
// RULES
// =============================================================================

#[must_use]
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Clamp pagination to sane bounds.
#[must_use]
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Whether `viewer` may edit an entry owned by `owner`, given the viewer's
/// role in the entry's family (if it is shared).
#[must_use]
pub fn can_modify(owner: Uuid, viewer: Uuid, family_role: Option<FamilyRole>) -> bool {
    owner == viewer || family_role.is_some_and(|role| role.allows(FamilyPermission::Admin))
}

/// Merge a patch onto an existing entry and validate the result.
///
/// # Errors
///
/// Returns `Invalid` for a non-positive amount or an overlong description.
pub fn apply_patch(existing: &LedgerEntry, patch: &TransactionPatch) -> Result<LedgerEntry, TransactionError> {
    let mut next = existing.clone();
    if let Some(kind) = patch.kind {
        next.kind = kind;
    }
    if let Some(amount) = patch.amount_cents {
        next.amount_cents = validate::positive_cents(amount, "amount").map_err(TransactionError::Invalid)?;
    }
    if let Some(description) = patch.description.as_deref() {
        next.description =
            validate::optional_text(description, "description", DESCRIPTION_MAX).map_err(TransactionError::Invalid)?;
    }
    if let Some(date) = patch.occurred_on {
        next.occurred_on = date;
    }
    if let Some(category_id) = patch.category_id {
        next.category_id = category_id;
        next.category_name = None;
    }
    if let Some(family_id) = patch.family_id {
        next.family_id = family_id;
    }
    Ok(next)
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        family_id: row.try_get("family_id")?,
        category_id: row.try_get("category_id")?,
        category_name: row.try_get("category_name")?,
        kind: decode_kind(&kind)?,
        amount_cents: row.try_get("amount_cents")?,
        description: row.try_get("description")?,
        occurred_on: row.try_get("occurred_on")?,
        created_at: row.try_get("created_at")?,
    })
}

const ENTRY_SELECT: &str = r"
    SELECT t.id, t.user_id, t.family_id, t.category_id, c.name AS category_name,
           t.kind, t.amount_cents, t.description, t.occurred_on, t.created_at
    FROM transactions t
    LEFT JOIN categories c ON c.id = t.category_id";

/// A category must belong to the entry owner and match the entry kind.
async fn check_category(
    pool: &PgPool,
    owner: Uuid,
    category_id: Option<Uuid>,
    kind: EntryKind,
) -> Result<(), TransactionError> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    let category_kind: Option<String> = sqlx::query_scalar("SELECT kind FROM categories WHERE id = $1 AND user_id = $2")
        .bind(category_id)
        .bind(owner)
        .fetch_optional(pool)
        .await?;
    match category_kind.as_deref().and_then(EntryKind::parse) {
        None => Err(TransactionError::Invalid("unknown category".to_owned())),
        Some(found) if found != kind => Err(TransactionError::Invalid(format!(
            "category is for {} entries, not {}",
            found.as_str(),
            kind.as_str()
        ))),
        Some(_) => Ok(()),
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// # Errors
///
/// `Invalid` for bad input, family errors when sharing with a family the
/// caller is not in.
pub async fn create_transaction(
    pool: &PgPool,
    user_id: Uuid,
    input: &NewTransaction,
) -> Result<LedgerEntry, TransactionError> {
    let amount = validate::positive_cents(input.amount_cents, "amount").map_err(TransactionError::Invalid)?;
    let description = validate::optional_text(input.description.as_deref().unwrap_or(""), "description", DESCRIPTION_MAX)
        .map_err(TransactionError::Invalid)?;
    if let Some(family_id) = input.family_id {
        family::ensure_permission(pool, family_id, user_id, FamilyPermission::Edit).await?;
    }
    check_category(pool, user_id, input.category_id, input.kind).await?;

    let id: Uuid = sqlx::query_scalar(
        r"INSERT INTO transactions (user_id, family_id, category_id, kind, amount_cents, description, occurred_on)
          VALUES ($1, $2, $3, $4, $5, $6, $7)
          RETURNING id",
    )
    .bind(user_id)
    .bind(input.family_id)
    .bind(input.category_id)
    .bind(input.kind.as_str())
    .bind(amount)
    .bind(description)
    .bind(input.occurred_on.unwrap_or_else(today))
    .fetch_one(pool)
    .await?;

    load_entry(pool, id).await?.ok_or(TransactionError::NotFound(id))
}

async fn load_entry(pool: &PgPool, id: Uuid) -> Result<Option<LedgerEntry>, sqlx::Error> {
    let row = sqlx::query(&format!("{ENTRY_SELECT} WHERE t.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(entry_from_row).transpose()
}

/// Load an entry the caller can see, with their role in its family.
async fn load_visible(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<(LedgerEntry, Option<FamilyRole>), TransactionError> {
    let entry = load_entry(pool, id).await?.ok_or(TransactionError::NotFound(id))?;
    let role = match entry.family_id {
        Some(family_id) => family::member_role(pool, family_id, user_id).await?,
        None => None,
    };
    if entry.user_id != user_id && role.is_none() {
        return Err(TransactionError::NotFound(id));
    }
    Ok((entry, role))
}

/// # Errors
///
/// `NotFound` when the entry does not exist or is not visible.
pub async fn get_transaction(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<LedgerEntry, TransactionError> {
    load_visible(pool, user_id, id).await.map(|(entry, _)| entry)
}

/// # Errors
///
/// `Forbidden` for viewers without edit rights, `Invalid` for bad input.
pub async fn update_transaction(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
    patch: &TransactionPatch,
) -> Result<LedgerEntry, TransactionError> {
    let (existing, role) = load_visible(pool, user_id, id).await?;
    if !can_modify(existing.user_id, user_id, role) {
        return Err(TransactionError::Forbidden(id));
    }

    let next = apply_patch(&existing, patch)?;
    if next.family_id != existing.family_id {
        if let Some(family_id) = next.family_id {
            family::ensure_permission(pool, family_id, user_id, FamilyPermission::Edit).await?;
        }
    }
    check_category(pool, next.user_id, next.category_id, next.kind).await?;

    sqlx::query(
        r"UPDATE transactions
          SET family_id = $2, category_id = $3, kind = $4, amount_cents = $5,
              description = $6, occurred_on = $7
          WHERE id = $1",
    )
    .bind(id)
    .bind(next.family_id)
    .bind(next.category_id)
    .bind(next.kind.as_str())
    .bind(next.amount_cents)
    .bind(&next.description)
    .bind(next.occurred_on)
    .execute(pool)
    .await?;

    load_entry(pool, id).await?.ok_or(TransactionError::NotFound(id))
}

/// # Errors
///
/// `Forbidden` for viewers without edit rights.
pub async fn delete_transaction(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), TransactionError> {
    let (existing, role) = load_visible(pool, user_id, id).await?;
    if !can_modify(existing.user_id, user_id, role) {
        return Err(TransactionError::Forbidden(id));
    }
    sqlx::query("DELETE FROM transactions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// List entries for a scope, newest first.
///
/// # Errors
///
/// Family errors when reading a family the caller is not in.
pub async fn list_transactions(
    pool: &PgPool,
    user_id: Uuid,
    filter: &TransactionFilter,
) -> Result<Vec<LedgerEntry>, TransactionError> {
    let (limit, offset) = clamp_page(filter.limit, filter.offset);
    fetch_scope(pool, user_id, filter, Some((limit, offset))).await
}

/// Fetch every entry in a scope and date range. Used by charts and export.
///
/// # Errors
///
/// Family errors when reading a family the caller is not in.
pub async fn fetch_scope(
    pool: &PgPool,
    user_id: Uuid,
    filter: &TransactionFilter,
    page: Option<(i64, i64)>,
) -> Result<Vec<LedgerEntry>, TransactionError> {
    let scope = Scope::from_family(filter.family_id);
    if let Scope::Family(family_id) = scope {
        family::ensure_permission(pool, family_id, user_id, FamilyPermission::View).await?;
    }

    let mut builder = QueryBuilder::new(ENTRY_SELECT);
    match scope {
        Scope::Personal => {
            builder.push(" WHERE t.family_id IS NULL AND t.user_id = ");
            builder.push_bind(user_id);
        }
        Scope::Family(family_id) => {
            builder.push(" WHERE t.family_id = ");
            builder.push_bind(family_id);
        }
    }
    if let Some(from) = filter.from {
        builder.push(" AND t.occurred_on >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND t.occurred_on <= ");
        builder.push_bind(to);
    }
    if let Some(kind) = filter.kind {
        builder.push(" AND t.kind = ");
        builder.push_bind(kind.as_str());
    }
    if let Some(category_id) = filter.category_id {
        builder.push(" AND t.category_id = ");
        builder.push_bind(category_id);
    }
    builder.push(" ORDER BY t.occurred_on DESC, t.created_at DESC");
    if let Some((limit, offset)) = page {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);
    }

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(entry_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

#[derive(serde::Serialize)]
struct ExportMetaLine {
    #[serde(rename = "type")]
    line_type: &'static str,
    version: u32,
    entry_count: usize,
    #[serde(with = "time::serde::rfc3339")]
    exported_at: OffsetDateTime,
}

#[derive(serde::Serialize)]
struct ExportEntryLine<'a> {
    #[serde(rename = "type")]
    line_type: &'static str,
    kind: EntryKind,
    amount_cents: i64,
    description: &'a str,
    occurred_on: Date,
    category_name: Option<&'a str>,
    family_id: Option<Uuid>,
}

/// Render entries as JSON Lines: one meta line, then one line per entry.
///
/// # Errors
///
/// Returns a serialization error (not expected for these types).
pub fn export_lines(entries: &[LedgerEntry]) -> Result<Vec<String>, serde_json::Error> {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    let meta = ExportMetaLine {
        line_type: "transactions_export_meta",
        version: EXPORT_VERSION,
        entry_count: entries.len(),
        exported_at: OffsetDateTime::now_utc(),
    };
    lines.push(format!("{}\n", serde_json::to_string(&meta)?));
    for entry in entries {
        let line = ExportEntryLine {
            line_type: "transaction",
            kind: entry.kind,
            amount_cents: entry.amount_cents,
            description: &entry.description,
            occurred_on: entry.occurred_on,
            category_name: entry.category_name.as_deref(),
            family_id: entry.family_id,
        };
        lines.push(format!("{}\n", serde_json::to_string(&line)?));
    }
    Ok(lines)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImportLineError {
    #[error("invalid json: {0}")]
    Json(String),
    #[error("{0}")]
    Invalid(String),
}

/// Parse one import line. Meta and unrelated lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns an error for malformed JSON or an entry that fails validation.
pub fn parse_import_line(line: &str, default_date: Date) -> Result<Option<ImportedEntry>, ImportLineError> {
    let value = serde_json::from_str::<serde_json::Value>(line).map_err(|e| ImportLineError::Json(e.to_string()))?;
    let Some(map) = value.as_object() else {
        return Ok(None);
    };

    let line_type = map.get("type").and_then(serde_json::Value::as_str);
    if line_type == Some("transactions_export_meta") {
        return Ok(None);
    }
    if line_type != Some("transaction") && !map.contains_key("amount_cents") {
        return Ok(None);
    }

    let kind = map
        .get("kind")
        .and_then(serde_json::Value::as_str)
        .and_then(EntryKind::parse)
        .ok_or_else(|| ImportLineError::Invalid("kind must be income or expense".to_owned()))?;
    let amount_cents = map
        .get("amount_cents")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| ImportLineError::Invalid("amount_cents must be an integer".to_owned()))?;
    let amount_cents = validate::positive_cents(amount_cents, "amount").map_err(ImportLineError::Invalid)?;
    let description = validate::optional_text(
        map.get("description")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(""),
        "description",
        DESCRIPTION_MAX,
    )
    .map_err(ImportLineError::Invalid)?;
    let occurred_on = match map.get("occurred_on").and_then(serde_json::Value::as_str) {
        Some(raw) => Date::parse(raw, format_description!("[year]-[month]-[day]"))
            .map_err(|_| ImportLineError::Invalid(format!("occurred_on is not a YYYY-MM-DD date: {raw}")))?,
        None => default_date,
    };
    let category_name = map
        .get("category_name")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned);

    Ok(Some(ImportedEntry { kind, amount_cents, description, occurred_on, category_name }))
}

/// Import JSON Lines into the caller's ledger (optionally shared with a
/// family). Valid rows are inserted in one database transaction; categories
/// are matched by name and kind against the caller's categories.
///
/// # Errors
///
/// Family errors for a family the caller cannot edit, or a database error
/// (in which case nothing is imported).
pub async fn import_jsonl(
    pool: &PgPool,
    user_id: Uuid,
    family_id: Option<Uuid>,
    jsonl: &str,
) -> Result<ImportReport, TransactionError> {
    if let Some(family_id) = family_id {
        family::ensure_permission(pool, family_id, user_id, FamilyPermission::Edit).await?;
    }

    let default_date = today();
    let mut entries = Vec::new();
    let mut skipped = 0_usize;
    for raw_line in jsonl.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_import_line(line, default_date) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "skipping import line");
                skipped = skipped.saturating_add(1);
            }
        }
    }

    if entries.is_empty() {
        return Ok(ImportReport { imported: 0, skipped });
    }

    let categories = sqlx::query("SELECT id, lower(name) AS name, kind FROM categories WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    let lookup = categories
        .iter()
        .map(|r| {
            let kind: String = r.try_get("kind")?;
            Ok(((r.try_get::<String, _>("name")?, decode_kind(&kind)?), r.try_get::<Uuid, _>("id")?))
        })
        .collect::<Result<std::collections::HashMap<_, _>, sqlx::Error>>()?;

    let mut tx = pool.begin().await?;
    for entry in &entries {
        let category_id = entry
            .category_name
            .as_ref()
            .and_then(|name| lookup.get(&(name.to_lowercase(), entry.kind)))
            .copied();
        sqlx::query(
            r"INSERT INTO transactions (user_id, family_id, category_id, kind, amount_cents, description, occurred_on)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user_id)
        .bind(family_id)
        .bind(category_id)
        .bind(entry.kind.as_str())
        .bind(entry.amount_cents)
        .bind(&entry.description)
        .bind(entry.occurred_on)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(%user_id, imported = entries.len(), skipped, "transactions imported");
    Ok(ImportReport { imported: entries.len(), skipped })
}

#[cfg(test)]
#[path = "transaction_test.rs"]
mod tests;
