pub mod stripe;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

pub use stripe::StripeGateway;

use crate::error::ApiError;

/// Intent status that allows an enrollment to be created
pub const STATUS_SUCCEEDED: &str = "succeeded";

/// Key/value pairs attached to an intent and echoed back on retrieval
pub type Metadata = BTreeMap<String, String>;

/// Freshly created intent; the client secret is handed to the payer's browser
#[derive(Debug, Clone, Serialize)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
    pub currency: String,
}

/// Intent as reported by the gateway
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub metadata: Metadata,
}

impl PaymentIntent {
    /// Check that the intent paid for `course_id` on behalf of `user_id`.
    pub fn confirm_for(&self, course_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        if self.status != STATUS_SUCCEEDED {
            return Err(ApiError::PaymentMismatch(format!(
                "payment not completed, status: {}",
                self.status
            )));
        }

        let matches = |key: &str, expected: Uuid| {
            self.metadata
                .get(key)
                .is_some_and(|value| *value == expected.to_string())
        };

        if !matches("course_id", course_id) || !matches("user_id", user_id) {
            return Err(ApiError::PaymentMismatch(
                "payment validation failed".to_string(),
            ));
        }

        Ok(())
    }
}

/// Card payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        description: &str,
        metadata: &Metadata,
    ) -> Result<CreatedIntent, ApiError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ApiError>;
}

/// Gateway used when no payment provider is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_intent(
        &self,
        _amount: i64,
        _currency: &str,
        _description: &str,
        _metadata: &Metadata,
    ) -> Result<CreatedIntent, ApiError> {
        Err(ApiError::ExternalService(
            "payment gateway is not configured".to_string(),
        ))
    }

    async fn retrieve_intent(&self, _intent_id: &str) -> Result<PaymentIntent, ApiError> {
        Err(ApiError::ExternalService(
            "payment gateway is not configured".to_string(),
        ))
    }
}

/// Metadata attached to an intent so that it can be matched on confirmation
pub fn intent_metadata(course_id: Uuid, user_id: Uuid, user_email: &str) -> Metadata {
    Metadata::from([
        ("course_id".to_string(), course_id.to_string()),
        ("user_id".to_string(), user_id.to_string()),
        ("user_email".to_string(), user_email.to_string()),
    ])
}
