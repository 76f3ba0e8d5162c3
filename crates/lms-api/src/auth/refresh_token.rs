//! Opaque, single-use refresh tokens.
//!
//! Clients get 32 random bytes encoded as URL-safe base64; the database only
//! sees the SHA-256 of that string. Every refresh consumes the presented token
//! and hands out a new one.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use lms_db::repositories::token as token_repo;

use super::hash_secret;
use crate::error::ApiError;

#[derive(Debug)]
pub struct RefreshToken {
    /// Sent to the client once and never stored
    pub value: String,
    pub hash: String,
}

impl RefreshToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);

        let value = URL_SAFE_NO_PAD.encode(bytes);
        let hash = hash_secret(&value);
        Self { value, hash }
    }
}

fn invalid_token() -> ApiError {
    ApiError::Auth("Invalid refresh token".to_string())
}

/// Store a fresh token for `user_id` and return its plain value.
pub async fn issue(pool: &PgPool, user_id: Uuid, ttl_days: i64) -> Result<String, ApiError> {
    let token = RefreshToken::generate();
    token_repo::insert_refresh_token(pool, user_id, &token.hash, Utc::now() + Duration::days(ttl_days))
        .await?;
    Ok(token.value)
}

/// Trade `presented` for a new token, returning the owner and the new value.
///
/// An expired token is still consumed so it cannot be retried.
pub async fn rotate(
    pool: &PgPool,
    presented: &str,
    ttl_days: i64,
) -> Result<(Uuid, String), ApiError> {
    let mut tx = pool.begin().await?;

    let consumed = token_repo::consume_refresh_token(&mut *tx, &hash_secret(presented))
        .await?
        .ok_or_else(invalid_token)?;

    if consumed.expires_at < Utc::now() {
        tx.commit().await?;
        return Err(ApiError::Auth("Refresh token expired".to_string()));
    }

    let replacement = RefreshToken::generate();
    token_repo::insert_refresh_token(
        &mut *tx,
        consumed.user_id,
        &replacement.hash,
        Utc::now() + Duration::days(ttl_days),
    )
    .await?;

    tx.commit().await?;

    Ok((consumed.user_id, replacement.value))
}

pub async fn revoke(pool: &PgPool, presented: &str) -> Result<(), ApiError> {
    if token_repo::revoke_refresh_token(pool, &hash_secret(presented)).await? {
        Ok(())
    } else {
        Err(invalid_token())
    }
}

/// End every session of a user, in the caller's transaction.
pub async fn revoke_all(conn: &mut PgConnection, user_id: Uuid) -> Result<u64, ApiError> {
    Ok(token_repo::revoke_user_refresh_tokens(conn, user_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_and_hashed() {
        let a = RefreshToken::generate();
        let b = RefreshToken::generate();

        assert_ne!(a.value, b.value);
        assert_ne!(a.hash, b.hash);
        // 32 bytes, unpadded base64
        assert_eq!(a.value.len(), 43);
        assert_eq!(a.hash, hash_secret(&a.value));
        assert!(!a.value.contains(['+', '/', '=']));
    }
}
