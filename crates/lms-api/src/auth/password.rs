use crate::error::ApiError;

/// Hash a password on the blocking thread pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

/// Check a password against a stored bcrypt hash on the blocking thread pool.
pub async fn verify_password(password: String, password_hash: String) -> Result<bool, ApiError> {
    let matches =
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &password_hash)).await??;
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("password123".to_string(), 4)
            .await
            .expect("hashing should succeed");

        assert!(hash.starts_with("$2"));
        assert!(
            verify_password("password123".to_string(), hash.clone())
                .await
                .expect("verify should succeed")
        );
        assert!(
            !verify_password("password124".to_string(), hash)
                .await
                .expect("verify should succeed")
        );
    }

    #[tokio::test]
    async fn test_malformed_hash_is_an_error() {
        let result = verify_password("password123".to_string(), "not-a-hash".to_string()).await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }
}
