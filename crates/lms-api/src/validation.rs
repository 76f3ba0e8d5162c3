use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// Number of digits in a one-time passcode
pub const OTP_LENGTH: usize = 6;

/// JSON body extractor that runs the payload's `validator` rules.
///
/// Malformed bodies and rule violations are both rejected with a
/// `400 {detail}` response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if password.len() > 128 {
        return Err(ApiError::Validation(
            "Password must be at most 128 characters long".to_string(),
        ));
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_number = password.chars().any(|c| c.is_numeric());

    if !has_letter || !has_number {
        return Err(ApiError::Validation(
            "Password must contain at least one letter and one number".to_string(),
        ));
    }

    Ok(())
}

/// Validate a password and its confirmation field
pub fn validate_password_pair(password: &str, confirmation: &str) -> Result<(), ApiError> {
    if password != confirmation {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }
    validate_password(password)
}

/// Validate username
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::Validation("Username cannot be empty".to_string()));
    }

    if username.len() < 3 {
        return Err(ApiError::Validation(
            "Username must be at least 3 characters long".to_string(),
        ));
    }

    if username.len() > 30 {
        return Err(ApiError::Validation(
            "Username must be at most 30 characters long".to_string(),
        ));
    }

    // Letters, digits, underscore and hyphen only; rules out markup in names
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::Validation(
            "Username can only contain letters, numbers, underscores, and hyphens".to_string(),
        ));
    }

    Ok(())
}

/// Validate a one-time passcode: exactly six ASCII digits.
pub fn validate_otp(otp: &str) -> Result<(), ApiError> {
    if otp.len() != OTP_LENGTH || !otp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::Validation(format!(
            "OTP must be a {OTP_LENGTH}-digit code"
        )));
    }
    Ok(())
}

/// Validate a user supplied link (avatar, banner, video, material file).
///
/// Empty means "no link". Only `http(s)` URLs are accepted.
pub fn validate_url(field: &str, url: &str) -> Result<(), ApiError> {
    if url.is_empty() {
        return Ok(());
    }

    if url.len() > 2048 {
        return Err(ApiError::Validation(format!("{field} is too long")));
    }

    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(ApiError::Validation(format!(
            "{field} must be an http or https URL"
        )));
    }

    let url_lower = url.to_lowercase();
    if url_lower.contains("javascript:")
        || url_lower.contains("<script")
        || url_lower.contains("onerror=")
        || url_lower.contains("onload=")
    {
        return Err(ApiError::Validation(format!(
            "{field} contains invalid patterns"
        )));
    }

    Ok(())
}

/// Reject blank or overly long free-text fields.
pub fn validate_text(field: &str, value: &str, max_len: usize) -> Result<(), ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ApiError::Validation(format!(
            "{field} must be at most {max_len} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("noNumbers").is_err());
        assert!(validate_password("12345678").is_err());
    }

    #[test]
    fn test_validate_password_pair() {
        assert!(validate_password_pair("password123", "password123").is_ok());

        match validate_password_pair("password123", "password124") {
            Err(ApiError::Validation(msg)) => assert_eq!(msg, "Passwords do not match"),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("user123").is_ok());
        assert!(validate_username("user_name").is_ok());
        assert!(validate_username("user-name").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username("user name").is_err());
        assert!(validate_username("<script>alert('xss')</script>").is_err());
        assert!(validate_username("user&test").is_err());
    }

    #[test]
    fn test_validate_otp() {
        assert!(validate_otp("012345").is_ok());
        assert!(validate_otp("999999").is_ok());

        assert!(validate_otp("").is_err());
        assert!(validate_otp("12345").is_err());
        assert!(validate_otp("1234567").is_err());
        assert!(validate_otp("12a456").is_err());
        assert!(validate_otp("１２３４５６").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("Avatar", "").is_ok());
        assert!(validate_url("Avatar", "https://cdn.example.com/a.png").is_ok());
        assert!(validate_url("Video", "http://videos.example.com/1").is_ok());

        assert!(validate_url("Avatar", "javascript:alert(1)").is_err());
        assert!(validate_url("Avatar", "ftp://example.com/a.png").is_err());
        assert!(validate_url("Avatar", "https://example.com/a.png?onerror=x").is_err());

        let long_url = format!("https://example.com/{}", "a".repeat(2050));
        assert!(validate_url("Avatar", &long_url).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("Title", "Rust for beginners", 200).is_ok());
        assert!(validate_text("Title", "   ", 200).is_err());
        assert!(validate_text("Title", &"x".repeat(201), 200).is_err());
    }
}
