use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use lms_db::models::Role;
use uuid::Uuid;

use super::jwt::verify_jwt_token;
use crate::{error::ApiError, state::AuthConfig};

/// Authenticated user extractor
///
/// Reads `Authorization: Bearer <jwt>` and validates the access token.
///
/// # Example
/// ```
/// use axum::extract::State;
/// use lms_api::{error::ApiError, auth::AuthUser, ApiState};
///
/// async fn protected_route(
///     auth_user: AuthUser,
///     State(state): State<ApiState>,
/// ) -> Result<(), ApiError> {
///     // auth_user.user_id, auth_user.email and auth_user.role are available
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_config = AuthConfig::from_ref(state);

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    ApiError::Auth("Authentication credentials were not provided".to_string())
                })?;

        let claims = verify_jwt_token(bearer.token(), &auth_config.jwt_secret)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::Auth("Invalid user ID in token".to_string()))?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
            role: claims.role,
        })
    }
}
