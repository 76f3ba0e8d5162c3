use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde_json::json;

use lms_db::{
    is_unique_violation,
    models::Role,
    repositories::user::{self as user_repo, NewUser, ProfileUpdate},
};

use super::model::{
    EmailRequest, LoginRequest, LoginResponse, PasswordResetConfirmRequest, ProfileUpdateRequest,
    RefreshRequest, RegisterRequest, RegisteredUser, TokenPair, VerifyOtpRequest,
};
use crate::{
    ApiState,
    auth::{
        AuthUser, hash_secret, jwt,
        otp::{generate_otp, is_otp_fresh},
        password::{hash_password, verify_password},
        refresh_token as rt,
    },
    error::ApiError,
    metrics,
    middleware::rate_limit,
    notify::{self, Notification},
    response::{created, success},
    validation::{
        ValidJson, validate_otp, validate_password_pair, validate_url, validate_username,
    },
};

pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    // Every route here can send an email
    let sensitive_routes = Router::new()
        .route("/users/register", post(register))
        .route("/users/verify-otp", post(verify_otp))
        .route("/users/resend-otp", post(resend_otp))
        .route("/users/password-reset", post(password_reset_request))
        .route("/users/password-reset-confirm", post(password_reset_confirm))
        .layer(make_rate_limit_layer!(
            rate_limit::SENSITIVE_REPLENISH_MS,
            rate_limit::SENSITIVE_BURST_SIZE
        ));

    let auth_routes = Router::new()
        .route("/users/login", post(login))
        .route("/users/token/refresh", post(refresh_token))
        .route("/users/logout", post(logout))
        .layer(make_rate_limit_layer!(
            rate_limit::AUTH_REPLENISH_MS,
            rate_limit::AUTH_BURST_SIZE
        ));

    let profile_routes = Router::new()
        .route("/users/profile", get(get_profile).patch(update_profile))
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ));

    Router::new()
        .merge(sensitive_routes)
        .merge(auth_routes)
        .merge(profile_routes)
}

/// Check a submitted OTP against the stored hash and issue time.
fn check_otp(
    otp_hash: Option<&str>,
    otp_created_at: Option<DateTime<Utc>>,
    submitted: &str,
    expiry_minutes: i64,
) -> Result<(), ApiError> {
    let (Some(stored), Some(issued_at)) = (otp_hash, otp_created_at) else {
        return Err(ApiError::Validation("Invalid OTP.".to_string()));
    };

    if stored != hash_secret(submitted) {
        return Err(ApiError::Validation("Invalid OTP.".to_string()));
    }

    if !is_otp_fresh(issued_at, expiry_minutes, Utc::now()) {
        return Err(ApiError::Validation("OTP has expired.".to_string()));
    }

    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn register(
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;
    validate_password_pair(&req.password, &req.password2)?;
    if let Some(avatar) = req.avatar.as_deref() {
        validate_url("Avatar", avatar)?;
    }

    let role = req.role.unwrap_or(Role::Student);
    if role == Role::Admin {
        return Err(ApiError::Validation(
            "Invalid role. Choose either teacher or student".to_string(),
        ));
    }

    let email = normalize_email(&req.email);
    if user_repo::email_exists(&state.pool, &email).await? {
        return Err(ApiError::Conflict(
            "A user with this email already exists".to_string(),
        ));
    }
    if user_repo::username_exists(&state.pool, &req.username, None).await? {
        return Err(ApiError::Conflict(
            "A user with this username already exists".to_string(),
        ));
    }

    let password_hash = hash_password(req.password, state.bcrypt_cost).await?;
    let otp = generate_otp();

    // The account only persists if the verification email goes out
    let mut tx = state.pool.begin().await?;

    let user = user_repo::create_user(
        &mut *tx,
        &NewUser {
            username: &req.username,
            email: &email,
            password_hash: &password_hash,
            full_name: req.full_name.trim(),
            mobile_no: req.mobile_no.as_deref(),
            avatar_url: req.avatar.as_deref().filter(|a| !a.is_empty()),
            role,
            otp_hash: &hash_secret(&otp),
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("A user with this email or username already exists".to_string())
        } else {
            ApiError::Database(e)
        }
    })?;

    notify::deliver(
        state.notifier.as_ref(),
        &user.email,
        &Notification::VerificationOtp {
            otp,
            expiry_minutes: state.otp_expiry_minutes,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, role = role.as_str(), "User registered");

    Ok(created(
        "User registered successfully. OTP sent to email.",
        RegisteredUser {
            email: user.email,
            username: user.username,
            role: user.role,
            full_name: user.full_name,
        },
    ))
}

async fn verify_otp(
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_otp(&req.otp)?;

    let mut tx = state.pool.begin().await?;

    let user = user_repo::find_otp_by_email(&mut *tx, &normalize_email(&req.email))
        .await?
        .ok_or_else(|| ApiError::Validation("User with this email does not exist.".to_string()))?;

    if user.is_verified {
        return Err(ApiError::Validation("User is already verified.".to_string()));
    }

    if let Err(e) = check_otp(
        user.otp_hash.as_deref(),
        user.otp_created_at,
        &req.otp,
        state.otp_expiry_minutes,
    ) {
        metrics::record_auth_event("verify_otp", false);
        return Err(e);
    }

    user_repo::mark_verified(&mut *tx, user.id).await?;
    tx.commit().await?;

    metrics::record_auth_event("verify_otp", true);
    tracing::info!(user_id = %user.id, "Email verified");

    Ok(success(
        "Email verified successfully. Account activated.",
        json!({ "email": user.email, "is_verified": true }),
    ))
}

async fn resend_otp(
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.pool.begin().await?;

    let user = user_repo::find_otp_by_email(&mut *tx, &normalize_email(&req.email))
        .await?
        .ok_or_else(|| ApiError::Validation("User with this email does not exist.".to_string()))?;

    if user.is_verified {
        return Err(ApiError::Validation("User is already verified.".to_string()));
    }

    let otp = generate_otp();
    user_repo::set_otp(&mut *tx, user.id, &hash_secret(&otp)).await?;

    notify::deliver(
        state.notifier.as_ref(),
        &user.email,
        &Notification::VerificationOtp {
            otp,
            expiry_minutes: state.otp_expiry_minutes,
        },
    )
    .await?;

    tx.commit().await?;

    Ok(success(
        "OTP resent successfully. Please check your email.",
        json!({ "email": user.email }),
    ))
}

async fn login(
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || {
        metrics::record_auth_event("login", false);
        ApiError::Auth("Invalid email or password".to_string())
    };

    let email = normalize_email(&req.email);
    let credentials = user_repo::find_credentials_by_email(&state.pool, &email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(req.password, credentials.password_hash).await? {
        return Err(invalid());
    }

    if !credentials.is_verified {
        metrics::record_auth_event("login", false);
        return Err(ApiError::Auth(
            "Account not verified. Please verify your email first.".to_string(),
        ));
    }

    let profile = user_repo::find_profile_by_id(&state.pool, credentials.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let access = jwt::generate_jwt_token(
        profile.id,
        &profile.email,
        profile.role,
        &state.auth.jwt_secret,
        state.auth.jwt_expiry_hours,
    )?;
    let refresh = rt::issue(&state.pool, profile.id, state.auth.refresh_token_expiry_days).await?;

    metrics::record_auth_event("login", true);
    tracing::info!(user_id = %profile.id, "User logged in");

    Ok(success(
        "Login successful",
        LoginResponse::new(profile, TokenPair { access, refresh }),
    ))
}

async fn refresh_token(
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rotated =
        rt::rotate(&state.pool, &req.refresh, state.auth.refresh_token_expiry_days).await;

    let (user_id, refresh) = match rotated {
        Ok(pair) => pair,
        Err(e) => {
            metrics::record_auth_event("token_refresh", false);
            return Err(e);
        }
    };

    let identity = user_repo::find_identity_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::Auth("User not found".to_string()))?;

    let access = jwt::generate_jwt_token(
        identity.id,
        &identity.email,
        identity.role,
        &state.auth.jwt_secret,
        state.auth.jwt_expiry_hours,
    )?;

    metrics::record_auth_event("token_refresh", true);

    Ok(success("Token refreshed", TokenPair { access, refresh }))
}

async fn logout(
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    rt::revoke(&state.pool, &req.refresh).await?;

    Ok(success("Logged out successfully", json!({})))
}

async fn get_profile(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = user_repo::find_profile_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(success("User profile retrieved successfully", profile))
}

async fn update_profile(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<ProfileUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(username) = req.username.as_deref() {
        validate_username(username)?;
        if user_repo::username_exists(&state.pool, username, Some(auth_user.user_id)).await? {
            return Err(ApiError::Conflict(
                "A user with this username already exists".to_string(),
            ));
        }
    }
    if let Some(avatar) = req.avatar.as_deref() {
        validate_url("Avatar", avatar)?;
    }

    let profile = user_repo::update_profile(
        &state.pool,
        auth_user.user_id,
        &ProfileUpdate {
            username: req.username.as_deref(),
            full_name: req.full_name.as_deref().map(str::trim),
            mobile_no: req.mobile_no.as_deref(),
            avatar_url: req.avatar.as_deref(),
        },
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => ApiError::NotFound("User not found".to_string()),
        e if is_unique_violation(&e) => {
            ApiError::Conflict("A user with this username already exists".to_string())
        }
        e => ApiError::Database(e),
    })?;

    Ok(success("Profile updated successfully", profile))
}

/// Always answers the same way so the endpoint cannot be used to probe
/// which emails are registered.
async fn password_reset_request(
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match user_repo::find_otp_by_email(&state.pool, &normalize_email(&req.email)).await? {
        Some(user) => {
            let otp = generate_otp();
            user_repo::set_otp(&state.pool, user.id, &hash_secret(&otp)).await?;

            // The reply is the same whether or not the email went out
            match notify::deliver(
                state.notifier.as_ref(),
                &user.email,
                &Notification::PasswordResetOtp {
                    otp,
                    expiry_minutes: state.otp_expiry_minutes,
                },
            )
            .await
            {
                Ok(()) => tracing::info!(user_id = %user.id, "Password reset OTP sent"),
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "Failed to send password reset OTP")
                }
            }
        }
        None => tracing::debug!("Password reset requested for unknown email"),
    }

    Ok(success(
        "If an account exists for this email, a password reset OTP has been sent.",
        json!({ "email": req.email }),
    ))
}

async fn password_reset_confirm(
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<PasswordResetConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_otp(&req.otp)?;
    validate_password_pair(&req.new_password, &req.confirm_password)?;

    let password_hash = hash_password(req.new_password, state.bcrypt_cost).await?;

    let mut tx = state.pool.begin().await?;

    let user = user_repo::find_otp_by_email(&mut *tx, &normalize_email(&req.email))
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid OTP.".to_string()))?;

    check_otp(
        user.otp_hash.as_deref(),
        user.otp_created_at,
        &req.otp,
        state.otp_expiry_minutes,
    )?;

    user_repo::reset_password(&mut *tx, user.id, &password_hash).await?;
    // Sessions opened with the old password end here
    let revoked = rt::revoke_all(&mut tx, user.id).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, revoked, "Password reset");

    Ok(success(
        "Password reset successfully. You can now login with your new password.",
        json!({ "email": user.email }),
    ))
}
