//! Family service: shared groups, membership and roles.
//!
//! DESIGN
//! ======
//! A family is a named group whose members share transactions and goals.
//! Every member has one role: `owner`, `admin` or `member`. Authorization is
//! decided here (not in the schema) through `ensure_permission`, which maps
//! non-members to `NotFound` so family IDs do not leak.
//!
//! ERROR HANDLING
//! ==============
//! Membership changes that depend on owner counts lock the family's member
//! rows (`FOR UPDATE`) inside one transaction, so two concurrent demotions
//! cannot leave a family without an owner.

use sqlx::{PgPool, Postgres, Row, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::validate;

const FAMILY_NAME_MAX: usize = 60;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FamilyError {
    #[error("{0}")]
    Invalid(String),
    #[error("family not found: {0}")]
    NotFound(Uuid),
    #[error("not allowed in family: {0}")]
    Forbidden(Uuid),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyRole {
    Owner,
    Admin,
    Member,
}

impl FamilyRole {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    #[must_use]
    pub fn allows(self, permission: FamilyPermission) -> bool {
        match permission {
            FamilyPermission::View | FamilyPermission::Edit => true,
            FamilyPermission::Admin => matches!(self, Self::Owner | Self::Admin),
            FamilyPermission::Owner => self == Self::Owner,
        }
    }
}

/// What a caller wants to do inside a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyPermission {
    /// Read family data.
    View,
    /// Add shared transactions and goals.
    Edit,
    /// Rename, invite, remove members.
    Admin,
    /// Delete the family, change roles.
    Owner,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FamilySummary {
    pub id: Uuid,
    pub name: String,
    pub role: FamilyRole,
    pub member_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FamilyMember {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: FamilyRole,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

/// Result of a member leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    RemoveMember,
    /// The last member left; the family is deleted with them.
    DeleteFamily,
}

fn decode_role(raw: &str) -> Result<FamilyRole, sqlx::Error> {
    FamilyRole::parse(raw).ok_or_else(|| sqlx::Error::Decode(format!("unknown family role: {raw}").into()))
}

// =============================================================================
// RULES
// =============================================================================

/// Decide whether `actor` may set `target`'s role to `new_role`.
///
/// # Errors
///
/// `Forbidden` unless the actor is an owner; `Conflict` when the change would
/// leave the family without an owner.
pub fn check_role_change(
    family_id: Uuid,
    actor: FamilyRole,
    target: FamilyRole,
    new_role: FamilyRole,
    owner_count: usize,
) -> Result<(), FamilyError> {
    if !actor.allows(FamilyPermission::Owner) {
        return Err(FamilyError::Forbidden(family_id));
    }
    if target == FamilyRole::Owner && new_role != FamilyRole::Owner && owner_count <= 1 {
        return Err(FamilyError::Conflict("a family must keep at least one owner".to_owned()));
    }
    Ok(())
}

/// Decide whether `actor` may remove a member holding `target`.
///
/// # Errors
///
/// `Forbidden` for plain members and for admins removing owners; `Conflict`
/// when removing the last owner.
pub fn check_removal(
    family_id: Uuid,
    actor: FamilyRole,
    target: FamilyRole,
    owner_count: usize,
) -> Result<(), FamilyError> {
    if !actor.allows(FamilyPermission::Admin) {
        return Err(FamilyError::Forbidden(family_id));
    }
    if target == FamilyRole::Owner {
        if actor != FamilyRole::Owner {
            return Err(FamilyError::Forbidden(family_id));
        }
        if owner_count <= 1 {
            return Err(FamilyError::Conflict("a family must keep at least one owner".to_owned()));
        }
    }
    Ok(())
}

/// Decide what happens when a member holding `role` leaves.
///
/// # Errors
///
/// `Conflict` when the sole owner tries to leave while others remain.
pub fn plan_leave(role: FamilyRole, owner_count: usize, member_count: usize) -> Result<LeaveOutcome, FamilyError> {
    if member_count <= 1 {
        return Ok(LeaveOutcome::DeleteFamily);
    }
    if role == FamilyRole::Owner && owner_count <= 1 {
        return Err(FamilyError::Conflict(
            "transfer ownership to another member before leaving".to_owned(),
        ));
    }
    Ok(LeaveOutcome::RemoveMember)
}

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Return the caller's role in the family, if they are a member.
///
/// # Errors
///
/// Returns a database error if the lookup fails.
pub async fn member_role(pool: &PgPool, family_id: Uuid, user_id: Uuid) -> Result<Option<FamilyRole>, sqlx::Error> {
    let role: Option<String> =
        sqlx::query_scalar("SELECT role FROM family_members WHERE family_id = $1 AND user_id = $2")
            .bind(family_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    role.as_deref().map(decode_role).transpose()
}

/// Require `permission` for the caller and return their role.
///
/// # Errors
///
/// `NotFound` for non-members, `Forbidden` when the role is insufficient.
pub async fn ensure_permission(
    pool: &PgPool,
    family_id: Uuid,
    user_id: Uuid,
    permission: FamilyPermission,
) -> Result<FamilyRole, FamilyError> {
    let role = member_role(pool, family_id, user_id)
        .await?
        .ok_or(FamilyError::NotFound(family_id))?;
    if !role.allows(permission) {
        return Err(FamilyError::Forbidden(family_id));
    }
    Ok(role)
}

/// Lock the family's member rows and return `(user_id, role)` pairs.
async fn lock_members(
    tx: &mut Transaction<'_, Postgres>,
    family_id: Uuid,
) -> Result<Vec<(Uuid, FamilyRole)>, sqlx::Error> {
    let rows = sqlx::query("SELECT user_id, role FROM family_members WHERE family_id = $1 FOR UPDATE")
        .bind(family_id)
        .fetch_all(&mut **tx)
        .await?;
    rows.iter()
        .map(|r| {
            let role: String = r.try_get("role")?;
            Ok((r.try_get("user_id")?, decode_role(&role)?))
        })
        .collect()
}

fn owner_count(members: &[(Uuid, FamilyRole)]) -> usize {
    members
        .iter()
        .filter(|(_, role)| *role == FamilyRole::Owner)
        .count()
}

fn role_of(members: &[(Uuid, FamilyRole)], user_id: Uuid) -> Option<FamilyRole> {
    members
        .iter()
        .find(|(id, _)| *id == user_id)
        .map(|(_, role)| *role)
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a family; the creator becomes its owner.
///
/// # Errors
///
/// `Invalid` for a bad name, or a database error.
pub async fn create_family(pool: &PgPool, user_id: Uuid, name: &str) -> Result<FamilySummary, FamilyError> {
    let name = validate::required_text(name, "family name", FAMILY_NAME_MAX).map_err(FamilyError::Invalid)?;
    let mut tx = pool.begin().await?;

    let row = sqlx::query("INSERT INTO families (name, created_by) VALUES ($1, $2) RETURNING id, created_at")
        .bind(&name)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
    let family_id: Uuid = row.get("id");

    sqlx::query("INSERT INTO family_members (family_id, user_id, role) VALUES ($1, $2, 'owner')")
        .bind(family_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(%family_id, %user_id, "family created");

    Ok(FamilySummary {
        id: family_id,
        name,
        role: FamilyRole::Owner,
        member_count: 1,
        created_at: row.get("created_at"),
    })
}

const SUMMARY_SELECT: &str = r"
    SELECT f.id, f.name, f.created_at, m.role,
           (SELECT COUNT(*) FROM family_members mc WHERE mc.family_id = f.id) AS member_count
    FROM families f
    JOIN family_members m ON m.family_id = f.id AND m.user_id = $1";

fn summary_from_row(row: &sqlx::postgres::PgRow) -> Result<FamilySummary, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(FamilySummary {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        role: decode_role(&role)?,
        member_count: row.try_get("member_count")?,
        created_at: row.try_get("created_at")?,
    })
}

/// List the families the user belongs to, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_families(pool: &PgPool, user_id: Uuid) -> Result<Vec<FamilySummary>, FamilyError> {
    let rows = sqlx::query(&format!("{SUMMARY_SELECT} ORDER BY f.created_at DESC"))
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(summary_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

/// # Errors
///
/// `NotFound` when the family does not exist or the user is not a member.
pub async fn get_family(pool: &PgPool, user_id: Uuid, family_id: Uuid) -> Result<FamilySummary, FamilyError> {
    let row = sqlx::query(&format!("{SUMMARY_SELECT} WHERE f.id = $2"))
        .bind(user_id)
        .bind(family_id)
        .fetch_optional(pool)
        .await?
        .ok_or(FamilyError::NotFound(family_id))?;
    Ok(summary_from_row(&row)?)
}

/// # Errors
///
/// Requires admin; `Invalid` for a bad name.
pub async fn rename_family(
    pool: &PgPool,
    user_id: Uuid,
    family_id: Uuid,
    name: &str,
) -> Result<FamilySummary, FamilyError> {
    let name = validate::required_text(name, "family name", FAMILY_NAME_MAX).map_err(FamilyError::Invalid)?;
    ensure_permission(pool, family_id, user_id, FamilyPermission::Admin).await?;

    sqlx::query("UPDATE families SET name = $2 WHERE id = $1")
        .bind(family_id)
        .bind(&name)
        .execute(pool)
        .await?;
    get_family(pool, user_id, family_id).await
}

/// Delete a family. Shared transactions and goals fall back to personal.
///
/// # Errors
///
/// Requires owner.
pub async fn delete_family(pool: &PgPool, user_id: Uuid, family_id: Uuid) -> Result<(), FamilyError> {
    ensure_permission(pool, family_id, user_id, FamilyPermission::Owner).await?;
    sqlx::query("DELETE FROM families WHERE id = $1")
        .bind(family_id)
        .execute(pool)
        .await?;
    tracing::info!(%family_id, %user_id, "family deleted");
    Ok(())
}

// =============================================================================
// MEMBERS
// =============================================================================

/// # Errors
///
/// Requires membership.
pub async fn list_members(pool: &PgPool, user_id: Uuid, family_id: Uuid) -> Result<Vec<FamilyMember>, FamilyError> {
    ensure_permission(pool, family_id, user_id, FamilyPermission::View).await?;

    let rows = sqlx::query(
        r"SELECT m.user_id, u.email, u.display_name, m.role, m.joined_at
          FROM family_members m
          JOIN users u ON u.id = m.user_id
          WHERE m.family_id = $1
          ORDER BY CASE m.role WHEN 'owner' THEN 0 WHEN 'admin' THEN 1 ELSE 2 END, m.joined_at",
    )
    .bind(family_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            let role: String = r.try_get("role")?;
            Ok(FamilyMember {
                user_id: r.try_get("user_id")?,
                email: r.try_get("email")?,
                display_name: r.try_get("display_name")?,
                role: decode_role(&role)?,
                joined_at: r.try_get("joined_at")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(FamilyError::from)
}

/// Change a member's role. Owners only.
///
/// # Errors
///
/// `NotFound` for unknown members, `Forbidden`/`Conflict` per
/// [`check_role_change`].
pub async fn update_member_role(
    pool: &PgPool,
    actor_id: Uuid,
    family_id: Uuid,
    member_id: Uuid,
    new_role: FamilyRole,
) -> Result<(), FamilyError> {
    let mut tx = pool.begin().await?;
    let members = lock_members(&mut tx, family_id).await?;
    let actor = role_of(&members, actor_id).ok_or(FamilyError::NotFound(family_id))?;
    let target = role_of(&members, member_id).ok_or(FamilyError::NotFound(member_id))?;

    check_role_change(family_id, actor, target, new_role, owner_count(&members))?;

    sqlx::query("UPDATE family_members SET role = $3 WHERE family_id = $1 AND user_id = $2")
        .bind(family_id)
        .bind(member_id)
        .bind(new_role.as_str())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(%family_id, %member_id, role = new_role.as_str(), "family role changed");
    Ok(())
}

/// Remove another member. Use [`leave_family`] to remove yourself.
///
/// # Errors
///
/// `NotFound` for unknown members, `Forbidden`/`Conflict` per
/// [`check_removal`].
pub async fn remove_member(
    pool: &PgPool,
    actor_id: Uuid,
    family_id: Uuid,
    member_id: Uuid,
) -> Result<(), FamilyError> {
    if actor_id == member_id {
        return leave_family(pool, actor_id, family_id).await.map(|_| ());
    }

    let mut tx = pool.begin().await?;
    let members = lock_members(&mut tx, family_id).await?;
    let actor = role_of(&members, actor_id).ok_or(FamilyError::NotFound(family_id))?;
    let target = role_of(&members, member_id).ok_or(FamilyError::NotFound(member_id))?;

    check_removal(family_id, actor, target, owner_count(&members))?;

    sqlx::query("DELETE FROM family_members WHERE family_id = $1 AND user_id = $2")
        .bind(family_id)
        .bind(member_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(%family_id, %member_id, removed_by = %actor_id, "family member removed");
    Ok(())
}

/// Leave a family. The last member leaving deletes it.
///
/// # Errors
///
/// `NotFound` for non-members, `Conflict` for a sole owner with others left.
pub async fn leave_family(pool: &PgPool, user_id: Uuid, family_id: Uuid) -> Result<LeaveOutcome, FamilyError> {
    let mut tx = pool.begin().await?;
    let members = lock_members(&mut tx, family_id).await?;
    let role = role_of(&members, user_id).ok_or(FamilyError::NotFound(family_id))?;

    let outcome = plan_leave(role, owner_count(&members), members.len())?;
    match outcome {
        LeaveOutcome::RemoveMember => {
            sqlx::query("DELETE FROM family_members WHERE family_id = $1 AND user_id = $2")
                .bind(family_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        LeaveOutcome::DeleteFamily => {
            sqlx::query("DELETE FROM families WHERE id = $1")
                .bind(family_id)
                .execute(&mut *tx)
                .await?;
        }
    }
    tx.commit().await?;

    tracing::info!(%family_id, %user_id, ?outcome, "family member left");
    Ok(outcome)
}

#[cfg(test)]
#[path = "family_test.rs"]
mod tests;
