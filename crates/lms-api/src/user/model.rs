use lms_db::models::{Role, UserProfile};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    pub username: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 150, message = "Full name must be 1-150 characters"))]
    pub full_name: String,
    pub password: String,
    pub password2: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[validate(length(max = 20, message = "Mobile number must be at most 20 characters"))]
    pub mobile_no: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub email: String,
    pub username: String,
    pub role: Role,
    pub full_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub full_name: String,
    pub mobile_no: Option<String>,
    pub avatar: Option<String>,
    pub tokens: TokenPair,
}

impl LoginResponse {
    pub fn new(profile: UserProfile, tokens: TokenPair) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            username: profile.username,
            role: profile.role,
            full_name: profile.full_name,
            mobile_no: profile.mobile_no,
            avatar: profile.avatar_url,
            tokens,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdateRequest {
    pub username: Option<String>,
    #[validate(length(min = 1, max = 150, message = "Full name must be 1-150 characters"))]
    pub full_name: Option<String>,
    #[validate(length(max = 20, message = "Mobile number must be at most 20 characters"))]
    pub mobile_no: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetConfirmRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub otp: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_role_defaults_to_none() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "ada",
            "email": "ada@example.com",
            "full_name": "Ada Lovelace",
            "password": "password123",
            "password2": "password123"
        }))
        .expect("request should parse");

        assert!(req.role.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_register_request_rejects_bad_email() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "ada",
            "email": "not-an-email",
            "full_name": "Ada",
            "password": "password123",
            "password2": "password123",
            "role": "teacher"
        }))
        .expect("request should parse");

        assert_eq!(req.role, Some(Role::Teacher));
        assert!(req.validate().is_err());
    }
}
