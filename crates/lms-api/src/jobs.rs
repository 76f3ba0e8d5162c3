//! Periodic maintenance: expired refresh tokens, stale OTPs and accounts that
//! never finished verification.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::time::interval;

use lms_db::repositories::{token as token_repo, user as user_repo};

const CREDENTIAL_CLEANUP_DELAY: Duration = Duration::from_secs(60 * 60);
const CREDENTIAL_CLEANUP_PERIOD: Duration = Duration::from_secs(6 * 60 * 60);
const ACCOUNT_CLEANUP_DELAY: Duration = Duration::from_secs(2 * 60 * 60);
const ACCOUNT_CLEANUP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Unverified accounts older than this are removed
pub const UNVERIFIED_ACCOUNT_MAX_AGE_DAYS: i64 = 7;

/// Start all background jobs
///
/// Returns the join handles so the caller can abort them on shutdown.
pub fn start_background_jobs(pool: PgPool, otp_expiry_minutes: i64) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        tokio::spawn(periodic_credential_cleanup_job(pool.clone(), otp_expiry_minutes)),
        tokio::spawn(periodic_unverified_accounts_cleanup_job(pool)),
    ]
}

async fn periodic_credential_cleanup_job(pool: PgPool, otp_expiry_minutes: i64) {
    tokio::time::sleep(CREDENTIAL_CLEANUP_DELAY).await;

    let mut interval = interval(CREDENTIAL_CLEANUP_PERIOD);

    loop {
        interval.tick().await;

        match cleanup_credentials(&pool, otp_expiry_minutes).await {
            Ok((tokens, otps)) if tokens + otps > 0 => {
                tracing::info!(tokens, otps, "Removed expired refresh tokens and stale OTPs");
            }
            Ok(_) => tracing::debug!("Credential cleanup complete: nothing expired"),
            Err(e) => tracing::error!(error = %e, "Failed to run credential cleanup"),
        }
    }
}

async fn periodic_unverified_accounts_cleanup_job(pool: PgPool) {
    tokio::time::sleep(ACCOUNT_CLEANUP_DELAY).await;

    let mut interval = interval(ACCOUNT_CLEANUP_PERIOD);

    loop {
        interval.tick().await;

        match cleanup_unverified_accounts(&pool).await {
            Ok(deleted) if deleted > 0 => {
                tracing::info!(
                    deleted,
                    "Cleaned up unverified accounts older than {UNVERIFIED_ACCOUNT_MAX_AGE_DAYS} days"
                );
            }
            Ok(_) => tracing::debug!("No old unverified accounts to clean up"),
            Err(e) => tracing::error!(error = %e, "Failed to clean up unverified accounts"),
        }
    }
}

/// Returns `(refresh tokens removed, OTPs cleared)`.
pub async fn cleanup_credentials(
    pool: &PgPool,
    otp_expiry_minutes: i64,
) -> Result<(u64, u64), sqlx::Error> {
    let tokens = token_repo::purge_expired_refresh_tokens(pool, Utc::now()).await?;
    let otp_cutoff = Utc::now() - chrono::Duration::minutes(otp_expiry_minutes);
    let otps = user_repo::clear_stale_otps(pool, otp_cutoff).await?;
    Ok((tokens, otps))
}

pub async fn cleanup_unverified_accounts(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::days(UNVERIFIED_ACCOUNT_MAX_AGE_DAYS);
    user_repo::delete_unverified_before(pool, cutoff).await
}
