pub mod category;
pub mod charts;
pub mod email_auth;
pub mod family;
pub mod goal;
pub mod invite;
pub mod maintenance;
pub mod profile;
pub mod session;
pub mod transaction;
pub mod validate;

/// True when `err` is a Postgres unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
