use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{CreatedIntent, Metadata, PaymentGateway, PaymentIntent};
use crate::error::ApiError;

/// Stripe PaymentIntents over the REST API
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    status: String,
    amount: i64,
    currency: String,
    client_secret: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(api_base: &str, secret_key: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ApiError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    async fn decode(response: reqwest::Response) -> Result<StripeIntent, ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::ExternalService(format!("failed to read stripe response: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::ExternalService(describe_error(status.as_u16(), &body)));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::ExternalService(format!("unexpected stripe response: {e}")))
    }
}

/// Form fields of a create-intent request, metadata flattened Stripe style.
fn create_intent_form(
    amount: i64,
    currency: &str,
    description: &str,
    metadata: &Metadata,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), amount.to_string()),
        ("currency".to_string(), currency.to_string()),
        ("description".to_string(), description.to_string()),
        ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    if let Some(email) = metadata.get("user_email") {
        form.push(("receipt_email".to_string(), email.clone()));
    }
    form.extend(
        metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
    );
    form
}

fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(StripeErrorBody { error }) => format!(
            "stripe returned {status} ({}): {}",
            error.kind.as_deref().unwrap_or("unknown"),
            error.message.as_deref().unwrap_or("no message")
        ),
        Err(_) => format!("stripe returned {status}"),
    }
}

/// Intent ids are opaque tokens such as `pi_3Nx...`; anything else never
/// reaches the request path.
fn is_valid_intent_id(intent_id: &str) -> bool {
    !intent_id.is_empty()
        && intent_id.len() <= 255
        && intent_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        description: &str,
        metadata: &Metadata,
    ) -> Result<CreatedIntent, ApiError> {
        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&create_intent_form(amount, currency, description, metadata))
            .send()
            .await
            .map_err(|e| ApiError::ExternalService(format!("stripe request failed: {e}")))?;

        let intent = Self::decode(response).await?;
        let client_secret = intent.client_secret.ok_or_else(|| {
            ApiError::ExternalService("stripe intent has no client secret".to_string())
        })?;

        tracing::info!(intent_id = %intent.id, amount, "payment intent created");

        Ok(CreatedIntent {
            id: intent.id,
            client_secret,
            currency: intent.currency,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ApiError> {
        if !is_valid_intent_id(intent_id) {
            return Err(ApiError::Validation("Invalid payment intent id".to_string()));
        }

        let response = self
            .client
            .get(format!("{}/v1/payment_intents/{intent_id}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ApiError::ExternalService(format!("stripe request failed: {e}")))?;

        let intent = Self::decode(response).await?;

        Ok(PaymentIntent {
            id: intent.id,
            status: intent.status,
            amount: intent.amount,
            currency: intent.currency,
            metadata: intent.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::payment::intent_metadata;

    #[test]
    fn test_decode_intent_payload() {
        let body = r#"{
            "id": "pi_3Nx",
            "object": "payment_intent",
            "amount": 4999,
            "currency": "usd",
            "status": "succeeded",
            "client_secret": "pi_3Nx_secret_abc",
            "metadata": {"course_id": "c", "user_id": "u", "user_email": "a@example.com"}
        }"#;

        let intent: StripeIntent = serde_json::from_str(body).expect("payload should decode");
        assert_eq!(intent.id, "pi_3Nx");
        assert_eq!(intent.amount, 4999);
        assert_eq!(intent.status, "succeeded");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_3Nx_secret_abc"));
        assert_eq!(intent.metadata.get("user_id").map(String::as_str), Some("u"));
    }

    #[test]
    fn test_decode_intent_without_metadata() {
        let body = r#"{"id": "pi_1", "amount": 100, "currency": "eur", "status": "processing"}"#;
        let intent: StripeIntent = serde_json::from_str(body).expect("payload should decode");

        assert!(intent.metadata.is_empty());
        assert!(intent.client_secret.is_none());
    }

    #[test]
    fn test_describe_error_uses_stripe_message() {
        let body = r#"{"error": {"type": "invalid_request_error", "message": "No such payment_intent: 'pi_x'"}}"#;
        let message = describe_error(404, body);

        assert!(message.contains("404"));
        assert!(message.contains("invalid_request_error"));
        assert!(message.contains("No such payment_intent"));
        assert_eq!(describe_error(500, "<html>"), "stripe returned 500");
    }

    #[test]
    fn test_create_intent_form_flattens_metadata() {
        let course_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let metadata = intent_metadata(course_id, user_id, "a@example.com");

        let form = create_intent_form(4999, "usd", "Payment for Rust 101", &metadata);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("amount"), Some("4999"));
        assert_eq!(get("currency"), Some("usd"));
        assert_eq!(get("receipt_email"), Some("a@example.com"));
        assert_eq!(get("metadata[course_id]"), Some(course_id.to_string().as_str()));
        assert_eq!(get("metadata[user_id]"), Some(user_id.to_string().as_str()));
        assert_eq!(get("automatic_payment_methods[enabled]"), Some("true"));
    }

    #[test]
    fn test_intent_id_validation() {
        assert!(is_valid_intent_id("pi_3NxAbc123"));
        assert!(!is_valid_intent_id(""));
        assert!(!is_valid_intent_id("pi_1/../../customers"));
        assert!(!is_valid_intent_id("pi 1"));
    }
}
