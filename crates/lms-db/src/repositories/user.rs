use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::{Role, UserCredentials, UserIdentity, UserOtp, UserProfile};

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub mobile_no: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub role: Role,
    pub otp_hash: &'a str,
}

pub async fn create_user<'e, E>(executor: E, user: &NewUser<'_>) -> Result<UserProfile, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO users (username, email, password_hash, full_name, mobile_no, avatar_url, role, otp_hash, otp_created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING id, username, email, full_name, avatar_url, mobile_no, role, is_verified, created_at
        "#,
    )
    .bind(user.username)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.full_name)
    .bind(user.mobile_no)
    .bind(user.avatar_url)
    .bind(user.role)
    .bind(user.otp_hash)
    .fetch_one(executor)
    .await
}

pub async fn email_exists<'e, E>(executor: E, email: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1))
        "#,
    )
    .bind(email)
    .fetch_one(executor)
    .await
}

pub async fn username_exists<'e, E>(
    executor: E,
    username: &str,
    exclude_user_id: Option<Uuid>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2)
            )
        "#,
    )
    .bind(username)
    .bind(exclude_user_id)
    .fetch_one(executor)
    .await
}

pub async fn find_profile_by_id<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<UserProfile>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, username, email, full_name, avatar_url, mobile_no, role, is_verified, created_at
            FROM users
            WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn find_identity_by_id<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<UserIdentity>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, email, role, is_verified
            FROM users
            WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn find_credentials_by_email<'e, E>(
    executor: E,
    email: &str,
) -> Result<Option<UserCredentials>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, username, email, password_hash, role, is_verified
            FROM users
            WHERE lower(email) = lower($1)
        "#,
    )
    .bind(email)
    .fetch_optional(executor)
    .await
}

pub async fn find_otp_by_email<'e, E>(executor: E, email: &str) -> Result<Option<UserOtp>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, username, email, is_verified, otp_hash, otp_created_at
            FROM users
            WHERE lower(email) = lower($1)
            FOR UPDATE
        "#,
    )
    .bind(email)
    .fetch_optional(executor)
    .await
}

/// Replace the pending OTP of a user.
pub async fn set_otp<'e, E>(executor: E, user_id: Uuid, otp_hash: &str) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE users
            SET otp_hash = $1, otp_created_at = NOW(), updated_at = NOW()
            WHERE id = $2
        "#,
    )
    .bind(otp_hash)
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Mark a user verified and consume the pending OTP.
pub async fn mark_verified<'e, E>(executor: E, user_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE users
            SET is_verified = TRUE, otp_hash = NULL, otp_created_at = NULL, updated_at = NOW()
            WHERE id = $1
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Store a new password hash and consume the pending OTP.
pub async fn reset_password<'e, E>(
    executor: E,
    user_id: Uuid,
    password_hash: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE users
            SET password_hash = $1, otp_hash = NULL, otp_created_at = NULL, updated_at = NOW()
            WHERE id = $2
        "#,
    )
    .bind(password_hash)
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Default)]
pub struct ProfileUpdate<'a> {
    pub username: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub mobile_no: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
}

pub async fn update_profile<'e, E>(
    executor: E,
    user_id: Uuid,
    update: &ProfileUpdate<'_>,
) -> Result<UserProfile, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            UPDATE users
            SET username = COALESCE($1, username),
                full_name = COALESCE($2, full_name),
                mobile_no = COALESCE($3, mobile_no),
                avatar_url = COALESCE($4, avatar_url),
                updated_at = NOW()
            WHERE id = $5
            RETURNING id, username, email, full_name, avatar_url, mobile_no, role, is_verified, created_at
        "#,
    )
    .bind(update.username)
    .bind(update.full_name)
    .bind(update.mobile_no)
    .bind(update.avatar_url)
    .bind(user_id)
    .fetch_one(executor)
    .await
}

/// Drop OTPs that can no longer be redeemed.
pub async fn clear_stale_otps<'e, E>(executor: E, older_than: DateTime<Utc>) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE users
            SET otp_hash = NULL, otp_created_at = NULL
            WHERE otp_created_at IS NOT NULL AND otp_created_at < $1
        "#,
    )
    .bind(older_than)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Remove accounts that never completed verification.
pub async fn delete_unverified_before<'e, E>(
    executor: E,
    created_before: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM users
            WHERE is_verified = FALSE AND created_at < $1
        "#,
    )
    .bind(created_before)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
