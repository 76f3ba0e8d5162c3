use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    ApiConfig,
    config::Environment,
    notify::{LogNotifier, Notifier, SmtpNotifier},
    payment::{DisabledGateway, PaymentGateway, StripeGateway},
};

/// Token settings needed by the [`AuthUser`](crate::auth::AuthUser) extractor
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub refresh_token_expiry_days: i64,
}

#[derive(Clone)]
pub struct ApiState {
    pub pool: PgPool,
    pub auth: AuthConfig,
    pub otp_expiry_minutes: i64,
    pub bcrypt_cost: u32,
    pub environment: Environment,
    pub payment_currency: String,
    pub payments: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}

impl ApiState {
    pub fn new(config: ApiConfig, pool: PgPool) -> anyhow::Result<Self> {
        let notifier: Arc<dyn Notifier> = match (
            config.smtp_host.as_deref(),
            config.smtp_username.as_deref(),
            config.smtp_password.as_deref(),
            config.smtp_from_email.as_deref(),
        ) {
            (Some(host), Some(username), Some(password), Some(from_email)) => Arc::new(
                SmtpNotifier::new(host, username, password, from_email, &config.site_name)?,
            ),
            _ => {
                if config.env.is_production() {
                    anyhow::bail!("SMTP settings are required in production");
                }
                tracing::warn!("Email service not configured (missing SMTP environment variables)");
                Arc::new(LogNotifier::new(config.site_name.clone()))
            }
        };

        let payments: Arc<dyn PaymentGateway> = match config.stripe_secret_key.as_deref() {
            Some(secret_key) => Arc::new(StripeGateway::new(&config.stripe_api_base, secret_key)?),
            None => {
                tracing::warn!("Payment gateway not configured (missing STRIPE_SECRET_KEY)");
                Arc::new(DisabledGateway)
            }
        };

        Ok(Self {
            pool,
            auth: AuthConfig {
                jwt_secret: config.jwt_secret,
                jwt_expiry_hours: config.jwt_expiry_hours,
                refresh_token_expiry_days: config.refresh_token_expiry_days,
            },
            otp_expiry_minutes: config.otp_expiry_minutes,
            bcrypt_cost: config.bcrypt_cost,
            environment: config.env,
            payment_currency: config.payment_currency,
            payments,
            notifier,
        })
    }
}

impl FromRef<ApiState> for AuthConfig {
    fn from_ref(state: &ApiState) -> Self {
        state.auth.clone()
    }
}
