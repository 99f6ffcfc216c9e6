//! Maintenance service: periodic cleanup of expired auth rows and stale
//! invites.
//!
//! ERROR HANDLING
//! ==============
//! A failed sweep is logged and retried on the next tick; the loop never
//! exits on its own.

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::state::AppState;

/// Pending invites are kept this long past expiry so recipients see
/// "expired" rather than "not found".
pub const STALE_INVITE_GRACE_DAYS: i32 = 30;

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: u64,
    pub login_codes: u64,
    pub invites: u64,
}

impl SweepReport {
    #[must_use]
    pub fn total(self) -> u64 {
        self.sessions + self.login_codes + self.invites
    }
}

/// Delete expired sessions, spent or expired login codes, and pending
/// invites that expired more than [`STALE_INVITE_GRACE_DAYS`] ago.
///
/// # Errors
///
/// Returns the first database error; earlier deletes stay committed.
pub async fn sweep(pool: &PgPool) -> Result<SweepReport, sqlx::Error> {
    let sessions = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?
        .rows_affected();
    let login_codes = sqlx::query("DELETE FROM email_login_codes WHERE consumed_at IS NOT NULL OR expires_at <= now()")
        .execute(pool)
        .await?
        .rows_affected();
    let invites = sqlx::query(
        "DELETE FROM family_invites WHERE status = 'pending' AND expires_at <= now() - make_interval(days => $1)",
    )
    .bind(STALE_INVITE_GRACE_DAYS)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(SweepReport { sessions, login_codes, invites })
}

/// Spawn the background cleanup task. Returns a handle for shutdown.
pub fn spawn_cleanup_task(state: AppState) -> JoinHandle<()> {
    let interval = state.config.cleanup_interval;
    info!(interval_secs = interval.as_secs(), "cleanup task configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            state.mail_limiter.prune_idle();
            match sweep(&state.pool).await {
                Ok(report) if report.total() > 0 => info!(
                    sessions = report.sessions,
                    login_codes = report.login_codes,
                    invites = report.invites,
                    "cleanup sweep removed rows"
                ),
                Ok(_) => debug!("cleanup sweep found nothing"),
                Err(e) => error!(error = %e, "cleanup sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_report_total_adds_all_kinds() {
        let report = SweepReport { sessions: 2, login_codes: 3, invites: 1 };
        assert_eq!(report.total(), 6);
        assert_eq!(SweepReport::default().total(), 0);
    }

    #[cfg(feature = "live-db-tests")]
    #[tokio::test]
    async fn sweep_removes_expired_sessions() {
        use crate::state::test_helpers::{live_app_state, seed_user};

        let (state, _mailer) = live_app_state().await;
        let (user, _) = seed_user(&state.pool, "sweep").await;
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, now() - interval '1 hour')")
            .bind(crate::services::session::generate_token())
            .bind(user)
            .execute(&state.pool)
            .await
            .unwrap();

        let report = sweep(&state.pool).await.unwrap();
        assert!(report.sessions >= 1);
    }
}
