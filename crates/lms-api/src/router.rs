use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::{catalog, enrollment, error::ApiError, review, state::ApiState, user};

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health))
        .merge(user::routes())
        .merge(catalog::routes())
        .merge(enrollment::routes())
        .merge(review::routes())
        .fallback(handler_404)
}

/// Liveness plus a database round trip
async fn health(State(state): State<ApiState>) -> StatusCode {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, "Health check failed: database unreachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn handler_404() -> ApiError {
    ApiError::NotFound("The requested resource was not found".to_string())
}
