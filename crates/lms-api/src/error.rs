use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotEnrolled(String),
    #[error("Payment does not match this enrollment: {0}")]
    PaymentMismatch(String),
    #[error("External service error: {0}")]
    ExternalService(String),
    #[error("Email error: {0}")]
    Email(String),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) | Self::NotEnrolled(_) => StatusCode::FORBIDDEN,
            Self::Auth(_) | Self::Jwt(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) | Self::PaymentMismatch(_) => StatusCode::BAD_REQUEST,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::Email(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message sent to the client. Server-side failures never leak their cause.
    fn detail(&self) -> String {
        match self {
            Self::ExternalService(_) => "Payment provider is unavailable, please try again later".to_string(),
            Self::Email(_) => "Failed to send email, please try again later".to_string(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Jwt(_) => "Invalid or expired token".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Internal(format!("password hashing failed: {err}"))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {err}"))
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[tokio::test]
    async fn test_client_errors_return_detail_verbatim() {
        let response = ApiError::Conflict("You have already reviewed this course".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "You have already reviewed this course");
    }

    #[tokio::test]
    async fn test_server_errors_hide_cause() {
        let response = ApiError::ExternalService("stripe returned 500: card_error".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert!(!body["detail"].as_str().unwrap_or_default().contains("stripe"));

        let response = ApiError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["detail"], "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotFound(String::new()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::NotEnrolled(String::new()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Auth(String::new()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::PaymentMismatch(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Validation(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
