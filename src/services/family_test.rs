use super::*;

// =============================================================================
// FamilyRole
// =============================================================================

#[test]
fn family_role_parse_round_trips() {
    for role in [FamilyRole::Owner, FamilyRole::Admin, FamilyRole::Member] {
        assert_eq!(FamilyRole::parse(role.as_str()), Some(role));
    }
    assert_eq!(FamilyRole::parse(" ADMIN "), Some(FamilyRole::Admin));
    assert_eq!(FamilyRole::parse("guest"), None);
}

#[test]
fn role_permissions() {
    assert!(FamilyRole::Member.allows(FamilyPermission::View));
    assert!(FamilyRole::Member.allows(FamilyPermission::Edit));
    assert!(!FamilyRole::Member.allows(FamilyPermission::Admin));
    assert!(FamilyRole::Admin.allows(FamilyPermission::Admin));
    assert!(!FamilyRole::Admin.allows(FamilyPermission::Owner));
    assert!(FamilyRole::Owner.allows(FamilyPermission::Owner));
}

#[test]
fn family_role_serializes_lowercase() {
    assert_eq!(serde_json::to_value(FamilyRole::Admin).unwrap(), serde_json::json!("admin"));
}

// =============================================================================
// check_role_change
// =============================================================================

#[test]
fn only_owners_change_roles() {
    let fid = Uuid::new_v4();
    let err = check_role_change(fid, FamilyRole::Admin, FamilyRole::Member, FamilyRole::Admin, 1).unwrap_err();
    assert!(matches!(err, FamilyError::Forbidden(id) if id == fid));
    assert!(check_role_change(fid, FamilyRole::Owner, FamilyRole::Member, FamilyRole::Admin, 1).is_ok());
}

#[test]
fn last_owner_cannot_be_demoted() {
    let fid = Uuid::new_v4();
    let err = check_role_change(fid, FamilyRole::Owner, FamilyRole::Owner, FamilyRole::Member, 1).unwrap_err();
    assert!(matches!(err, FamilyError::Conflict(_)));
    assert!(check_role_change(fid, FamilyRole::Owner, FamilyRole::Owner, FamilyRole::Member, 2).is_ok());
}

#[test]
fn promoting_to_owner_is_allowed() {
    let fid = Uuid::new_v4();
    assert!(check_role_change(fid, FamilyRole::Owner, FamilyRole::Member, FamilyRole::Owner, 1).is_ok());
}

// =============================================================================
// check_removal
// =============================================================================

#[test]
fn members_cannot_remove_anyone() {
    let fid = Uuid::new_v4();
    assert!(matches!(
        check_removal(fid, FamilyRole::Member, FamilyRole::Member, 1),
        Err(FamilyError::Forbidden(_))
    ));
}

#[test]
fn admins_remove_members_but_not_owners() {
    let fid = Uuid::new_v4();
    assert!(check_removal(fid, FamilyRole::Admin, FamilyRole::Member, 1).is_ok());
    assert!(check_removal(fid, FamilyRole::Admin, FamilyRole::Admin, 1).is_ok());
    assert!(matches!(
        check_removal(fid, FamilyRole::Admin, FamilyRole::Owner, 2),
        Err(FamilyError::Forbidden(_))
    ));
}

#[test]
fn owner_removal_keeps_one_owner() {
    let fid = Uuid::new_v4();
    assert!(check_removal(fid, FamilyRole::Owner, FamilyRole::Owner, 2).is_ok());
    assert!(matches!(
        check_removal(fid, FamilyRole::Owner, FamilyRole::Owner, 1),
        Err(FamilyError::Conflict(_))
    ));
}

// =============================================================================
// plan_leave
// =============================================================================

#[test]
fn last_member_leaving_deletes_family() {
    assert_eq!(plan_leave(FamilyRole::Owner, 1, 1).unwrap(), LeaveOutcome::DeleteFamily);
}

#[test]
fn sole_owner_cannot_leave_others_behind() {
    assert!(matches!(plan_leave(FamilyRole::Owner, 1, 3), Err(FamilyError::Conflict(_))));
}

#[test]
fn regular_members_and_co_owners_leave_normally() {
    assert_eq!(plan_leave(FamilyRole::Member, 1, 3).unwrap(), LeaveOutcome::RemoveMember);
    assert_eq!(plan_leave(FamilyRole::Owner, 2, 3).unwrap(), LeaveOutcome::RemoveMember);
}

// =============================================================================
// LIVE DB
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn family_lifecycle_against_live_db() {
    use crate::state::test_helpers::{live_app_state, seed_user};

    let (state, _mailer) = live_app_state().await;
    let (owner, _) = seed_user(&state.pool, "owner").await;
    let (outsider, _) = seed_user(&state.pool, "outsider").await;

    let family = create_family(&state.pool, owner, "  The Parkers ").await.unwrap();
    assert_eq!(family.name, "The Parkers");
    assert_eq!(family.role, FamilyRole::Owner);

    let listed = list_families(&state.pool, owner).await.unwrap();
    assert!(listed.iter().any(|f| f.id == family.id && f.member_count == 1));

    assert!(matches!(
        get_family(&state.pool, outsider, family.id).await,
        Err(FamilyError::NotFound(_))
    ));

    assert!(matches!(
        leave_family(&state.pool, owner, family.id).await.unwrap(),
        LeaveOutcome::DeleteFamily
    ));
    assert!(matches!(get_family(&state.pool, owner, family.id).await, Err(FamilyError::NotFound(_))));
}
