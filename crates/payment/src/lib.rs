//! Payment Gateway Adapter.
//!
//! Isolates the rest of the system from the hosted payment processor's
//! request/response shapes: payment intents, hosted checkout sessions,
//! status lookups, and webhook signature verification.

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

pub mod webhook;

pub use webhook::{construct_event, verify_signature, WebhookEvent};

/// Intent ids carrying this prefix short-circuit to a synthetic successful
/// status without contacting the processor, so manual/test flows do not
/// require live credentials.
pub const MOCK_INTENT_PREFIX: &str = "pi_mock_";

/// Webhook event type that confirms an order.
pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
/// Webhook event type that fails an order.
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Payment operation errors.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Required processor credential absent — a deployment defect.
    #[error("Missing {0} in environment")]
    Configuration(&'static str),

    /// Invalid parameters supplied by the caller.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The processor rejected the request.
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid webhook signature
    #[error("Invalid webhook signature")]
    InvalidSignature,
}

/// A created payment intent: opaque id plus the client-usable secret.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub status: String,
}

/// A created hosted checkout session: id plus the redirect URL.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Read-only payment status as reported by the processor.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct PaymentStatusInfo {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount: i64,
}

/// Parameters for creating a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub amount: f64,
    pub currency: String,
    /// Single line-item description, derived from case type and fulfillment.
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Converts a major-unit amount to the integer minor units the processor
/// expects (e.g. 29.99 -> 2999).
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Thin client over the processor's REST API.
///
/// Constructed once at startup and shared across requests; holds no
/// per-request state.
#[derive(Debug, Clone)]
pub struct StripeClient {
    secret_key: String,
    http: reqwest::Client,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Points the client at a different API base, for tests against a stub.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn ensure_configured(&self) -> Result<(), PaymentError> {
        if self.secret_key.trim().is_empty() {
            return Err(PaymentError::Configuration("STRIPE_SECRET_KEY"));
        }
        Ok(())
    }

    /// Creates a payment intent for the given major-unit amount.
    pub async fn create_payment_intent(
        &self,
        amount: f64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, PaymentError> {
        self.ensure_configured()?;
        if amount <= 0.0 {
            return Err(PaymentError::InvalidParameters(
                "amount must be positive".into(),
            ));
        }

        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), to_minor_units(amount).to_string()),
            ("currency".into(), currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Creates a hosted checkout session with a single line item.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<CheckoutSession, PaymentError> {
        self.ensure_configured()?;
        if params.amount <= 0.0 {
            return Err(PaymentError::InvalidParameters(
                "amount must be positive".into(),
            ));
        }
        for (name, value) in [
            ("product_name", &params.product_name),
            ("success_url", &params.success_url),
            ("cancel_url", &params.cancel_url),
        ] {
            if value.trim().is_empty() {
                return Err(PaymentError::InvalidParameters(format!(
                    "{name} is required"
                )));
            }
        }

        let form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), params.success_url.clone()),
            ("cancel_url".into(), params.cancel_url.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "line_items[0][price_data][currency]".into(),
                params.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                to_minor_units(params.amount).to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                params.product_name.clone(),
            ),
        ];

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Read-only status passthrough; mock ids never hit the network.
    pub async fn get_payment_status(&self, intent_id: &str) -> Result<PaymentStatusInfo, PaymentError> {
        if intent_id.starts_with(MOCK_INTENT_PREFIX) {
            info!(intent_id, "Returning synthetic status for mock payment intent");
            return Ok(PaymentStatusInfo {
                id: intent_id.to_string(),
                status: "succeeded".to_string(),
                amount: 0,
            });
        }

        self.ensure_configured()?;
        let response = self
            .http
            .get(format!("{}/v1/payment_intents/{intent_id}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PaymentError::Provider(format!("{status}: {body}")));
        }
        Ok(serde_json::from_str(&body)?)
    }
}
