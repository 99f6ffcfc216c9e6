//! Goal service: savings targets with optional deadlines.
//!
//! A goal tracks `saved_cents` toward `target_cents`. Contributions adjust
//! the saved amount atomically in SQL; withdrawals may not take it below
//! zero. Goals can be shared with a family like transactions.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::family::{self, FamilyPermission, FamilyRole};
use super::transaction::today;
use super::validate;

const GOAL_NAME_MAX: usize = 80;

#[derive(Debug, thiserror::Error)]
pub enum GoalError {
    #[error("{0}")]
    Invalid(String),
    #[error("goal not found: {0}")]
    NotFound(Uuid),
    #[error("not allowed to modify goal: {0}")]
    Forbidden(Uuid),
    #[error(transparent)]
    Family(#[from] family::FamilyError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub family_id: Option<Uuid>,
    pub name: String,
    pub target_cents: i64,
    pub saved_cents: i64,
    pub deadline: Option<Date>,
    pub created_at: OffsetDateTime,
}

/// Derived progress numbers for display.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct GoalProgress {
    /// `saved / target`, clamped to `0.0..=1.0`.
    pub fraction: f64,
    pub remaining_cents: i64,
    pub completed: bool,
    /// Days until the deadline; negative once it has passed.
    pub days_remaining: Option<i64>,
}

/// Goal plus derived progress, as returned by the API.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GoalView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub family_id: Option<Uuid>,
    pub name: String,
    pub target_cents: i64,
    pub saved_cents: i64,
    pub deadline: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub progress: GoalProgress,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewGoal {
    pub name: String,
    pub target_cents: i64,
    #[serde(default)]
    pub deadline: Option<Date>,
    #[serde(default)]
    pub family_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalPatch {
    pub name: Option<String>,
    pub target_cents: Option<i64>,
    /// Outer `Some` means present; `Some(None)` removes the deadline.
    pub deadline: Option<Option<Date>>,
}

// =============================================================================
// RULES
// =============================================================================

/// Validate a new goal against `today`.
///
/// # Errors
///
/// `Invalid` when the name is blank, the target is not positive, or the
/// deadline is not in the future.
pub fn validate_new(input: &NewGoal, today: Date) -> Result<NewGoal, GoalError> {
    let name = validate::required_text(&input.name, "goal name", GOAL_NAME_MAX).map_err(GoalError::Invalid)?;
    let target_cents = validate::positive_cents(input.target_cents, "target amount").map_err(GoalError::Invalid)?;
    let deadline = input
        .deadline
        .map(|d| validate::future_date(d, today, "deadline"))
        .transpose()
        .map_err(GoalError::Invalid)?;
    Ok(NewGoal { name, target_cents, deadline, family_id: input.family_id })
}

/// Merge a patch onto a goal and validate the result.
///
/// A deadline that is left untouched is not re-checked, so editing the name
/// of an overdue goal still works.
///
/// # Errors
///
/// `Invalid` under the same rules as [`validate_new`].
pub fn apply_patch(existing: &Goal, patch: &GoalPatch, today: Date) -> Result<Goal, GoalError> {
    let mut next = existing.clone();
    if let Some(name) = patch.name.as_deref() {
        next.name = validate::required_text(name, "goal name", GOAL_NAME_MAX).map_err(GoalError::Invalid)?;
    }
    if let Some(target) = patch.target_cents {
        next.target_cents = validate::positive_cents(target, "target amount").map_err(GoalError::Invalid)?;
    }
    if let Some(deadline) = patch.deadline {
        next.deadline = deadline
            .map(|d| validate::future_date(d, today, "deadline"))
            .transpose()
            .map_err(GoalError::Invalid)?;
    }
    Ok(next)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress(goal: &Goal, today: Date) -> GoalProgress {
    let fraction = if goal.target_cents > 0 {
        (goal.saved_cents as f64 / goal.target_cents as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    GoalProgress {
        fraction,
        remaining_cents: (goal.target_cents - goal.saved_cents).max(0),
        completed: goal.saved_cents >= goal.target_cents,
        days_remaining: goal.deadline.map(|d| (d - today).whole_days()),
    }
}

#[must_use]
pub fn view(goal: Goal, today: Date) -> GoalView {
    let progress = progress(&goal, today);
    GoalView {
        id: goal.id,
        user_id: goal.user_id,
        family_id: goal.family_id,
        name: goal.name,
        target_cents: goal.target_cents,
        saved_cents: goal.saved_cents,
        deadline: goal.deadline,
        created_at: goal.created_at,
        progress,
    }
}

fn can_modify(goal: &Goal, user_id: Uuid, role: Option<FamilyRole>) -> bool {
    goal.user_id == user_id || role.is_some_and(|r| r.allows(FamilyPermission::Admin))
}

fn goal_from_row(row: &PgRow) -> Result<Goal, sqlx::Error> {
    Ok(Goal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        family_id: row.try_get("family_id")?,
        name: row.try_get("name")?,
        target_cents: row.try_get("target_cents")?,
        saved_cents: row.try_get("saved_cents")?,
        deadline: row.try_get("deadline")?,
        created_at: row.try_get("created_at")?,
    })
}

const GOAL_COLUMNS: &str = "id, user_id, family_id, name, target_cents, saved_cents, deadline, created_at";

// =============================================================================
// CRUD
// =============================================================================

/// # Errors
///
/// `Invalid` for bad input; family errors when sharing without membership.
pub async fn create_goal(pool: &PgPool, user_id: Uuid, input: &NewGoal) -> Result<Goal, GoalError> {
    let clean = validate_new(input, today())?;
    if let Some(family_id) = clean.family_id {
        family::ensure_permission(pool, family_id, user_id, FamilyPermission::Edit).await?;
    }

    let row = sqlx::query(&format!(
        "INSERT INTO goals (user_id, family_id, name, target_cents, deadline)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {GOAL_COLUMNS}"
    ))
    .bind(user_id)
    .bind(clean.family_id)
    .bind(&clean.name)
    .bind(clean.target_cents)
    .bind(clean.deadline)
    .fetch_one(pool)
    .await?;
    Ok(goal_from_row(&row)?)
}

/// List personal goals, or a family's shared goals.
///
/// # Errors
///
/// Family errors when reading a family the caller is not in.
pub async fn list_goals(pool: &PgPool, user_id: Uuid, family_id: Option<Uuid>) -> Result<Vec<Goal>, GoalError> {
    let rows = match family_id {
        Some(family_id) => {
            family::ensure_permission(pool, family_id, user_id, FamilyPermission::View).await?;
            sqlx::query(&format!(
                "SELECT {GOAL_COLUMNS} FROM goals WHERE family_id = $1 ORDER BY deadline NULLS LAST, created_at"
            ))
            .bind(family_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {GOAL_COLUMNS} FROM goals WHERE family_id IS NULL AND user_id = $1 ORDER BY deadline NULLS LAST, created_at"
            ))
            .bind(user_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows
        .iter()
        .map(goal_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

async fn load_visible(pool: &PgPool, user_id: Uuid, goal_id: Uuid) -> Result<(Goal, Option<FamilyRole>), GoalError> {
    let row = sqlx::query(&format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = $1"))
        .bind(goal_id)
        .fetch_optional(pool)
        .await?
        .ok_or(GoalError::NotFound(goal_id))?;
    let goal = goal_from_row(&row)?;
    let role = match goal.family_id {
        Some(family_id) => family::member_role(pool, family_id, user_id).await?,
        None => None,
    };
    if goal.user_id != user_id && role.is_none() {
        return Err(GoalError::NotFound(goal_id));
    }
    Ok((goal, role))
}

/// # Errors
///
/// `NotFound` when the goal does not exist or is not visible.
pub async fn get_goal(pool: &PgPool, user_id: Uuid, goal_id: Uuid) -> Result<Goal, GoalError> {
    load_visible(pool, user_id, goal_id).await.map(|(goal, _)| goal)
}

/// # Errors
///
/// `Forbidden` without edit rights, `Invalid` for bad input.
pub async fn update_goal(pool: &PgPool, user_id: Uuid, goal_id: Uuid, patch: &GoalPatch) -> Result<Goal, GoalError> {
    let (existing, role) = load_visible(pool, user_id, goal_id).await?;
    if !can_modify(&existing, user_id, role) {
        return Err(GoalError::Forbidden(goal_id));
    }
    let next = apply_patch(&existing, patch, today())?;

    let row = sqlx::query(&format!(
        "UPDATE goals SET name = $2, target_cents = $3, deadline = $4 WHERE id = $1 RETURNING {GOAL_COLUMNS}"
    ))
    .bind(goal_id)
    .bind(&next.name)
    .bind(next.target_cents)
    .bind(next.deadline)
    .fetch_optional(pool)
    .await?
    .ok_or(GoalError::NotFound(goal_id))?;
    Ok(goal_from_row(&row)?)
}

/// # Errors
///
/// `Forbidden` without edit rights.
pub async fn delete_goal(pool: &PgPool, user_id: Uuid, goal_id: Uuid) -> Result<(), GoalError> {
    let (existing, role) = load_visible(pool, user_id, goal_id).await?;
    if !can_modify(&existing, user_id, role) {
        return Err(GoalError::Forbidden(goal_id));
    }
    sqlx::query("DELETE FROM goals WHERE id = $1")
        .bind(goal_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Saved total after applying `amount_cents` to `saved_cents`.
///
/// # Errors
///
/// `Invalid` for a zero or oversized amount, a withdrawal larger than the
/// saved total, or a total that no longer fits in `i64`.
pub fn contribution_total(saved_cents: i64, amount_cents: i64) -> Result<i64, GoalError> {
    if amount_cents == 0 {
        return Err(GoalError::Invalid("amount must not be zero".to_owned()));
    }
    validate::positive_cents(amount_cents.saturating_abs(), "amount").map_err(GoalError::Invalid)?;
    let total = saved_cents
        .checked_add(amount_cents)
        .ok_or_else(|| GoalError::Invalid("saved amount is too large".to_owned()))?;
    if total < 0 {
        return Err(GoalError::Invalid("withdrawal exceeds saved amount".to_owned()));
    }
    Ok(total)
}

/// Add (or, with a negative amount, withdraw) savings. Any member who can
/// see a shared goal may contribute to it.
///
/// # Errors
///
/// `Invalid` for an amount rejected by [`contribution_total`].
pub async fn contribute(pool: &PgPool, user_id: Uuid, goal_id: Uuid, amount_cents: i64) -> Result<Goal, GoalError> {
    let (existing, _) = load_visible(pool, user_id, goal_id).await?;
    contribution_total(existing.saved_cents, amount_cents)?;

    let row = sqlx::query(&format!(
        "UPDATE goals SET saved_cents = saved_cents + $2
         WHERE id = $1 AND saved_cents + $2 >= 0
         RETURNING {GOAL_COLUMNS}"
    ))
    .bind(goal_id)
    .bind(amount_cents)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| GoalError::Invalid("withdrawal exceeds saved amount".to_owned()))?;

    let goal = goal_from_row(&row)?;
    tracing::debug!(%goal_id, %user_id, amount_cents, saved_cents = goal.saved_cents, "goal contribution");
    Ok(goal)
}

#[cfg(test)]
#[path = "goal_test.rs"]
mod tests;
