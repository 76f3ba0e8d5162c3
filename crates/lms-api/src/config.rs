use serde::Deserialize;

/// Deployment environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Minimum JWT secret length accepted in production
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub env: Environment,
    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: i64,
    #[serde(default = "default_refresh_token_expiry_days")]
    pub refresh_token_expiry_days: i64,
    #[serde(default = "default_otp_expiry_minutes")]
    pub otp_expiry_minutes: i64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Comma separated list of origins allowed by CORS
    #[serde(default)]
    pub allowed_origins: Option<String>,

    // SMTP, all four must be set to send real emails
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from_email: Option<String>,

    // Payment gateway
    pub stripe_secret_key: Option<String>,
    #[serde(default = "default_stripe_api_base")]
    pub stripe_api_base: String,
    #[serde(default = "default_payment_currency")]
    pub payment_currency: String,
}

fn default_port() -> u16 {
    3000
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_jwt_expiry_hours() -> i64 {
    24 * 7
}

fn default_refresh_token_expiry_days() -> i64 {
    7
}

fn default_otp_expiry_minutes() -> i64 {
    5
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_site_name() -> String {
    "The Learning Hall".to_string()
}

fn default_stripe_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_payment_currency() -> String {
    "usd".to_string()
}

impl ApiConfig {
    /// Load the configuration from the process environment.
    ///
    /// Variable names are the upper-case field names, e.g. `DATABASE_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.env.is_production() && self.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
            anyhow::bail!(
                "JWT_SECRET must be at least {MIN_PRODUCTION_SECRET_LEN} bytes in production"
            );
        }
        if self.otp_expiry_minutes <= 0 {
            anyhow::bail!("OTP_EXPIRY_MINUTES must be positive");
        }
        Ok(())
    }

    pub fn parsed_allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .as_deref()
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_else(|| vec!["http://localhost:5173".to_string()])
    }
}
