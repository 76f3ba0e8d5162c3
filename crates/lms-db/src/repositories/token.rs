//! Refresh token storage. Only SHA-256 hashes of the tokens are kept.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::ConsumedRefreshToken;

pub async fn insert_refresh_token<'e, E>(
    executor: E,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Delete a token and return who it belonged to.
///
/// A single statement, so of two concurrent callers presenting the same
/// token only one gets it back.
pub async fn consume_refresh_token<'e, E>(
    executor: E,
    token_hash: &str,
) -> Result<Option<ConsumedRefreshToken>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1
            RETURNING user_id, expires_at
        "#,
    )
    .bind(token_hash)
    .fetch_optional(executor)
    .await
}

/// Returns `false` when no such token was stored.
pub async fn revoke_refresh_token<'e, E>(executor: E, token_hash: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
        .bind(token_hash)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn revoke_user_refresh_tokens<'e, E>(executor: E, user_id: Uuid) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn purge_expired_refresh_tokens<'e, E>(
    executor: E,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
        .bind(now)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
