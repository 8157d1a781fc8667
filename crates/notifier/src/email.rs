//! Email providers.
//!
//! `SendGridMailer` talks to the hosted API; `NullMailer` is the degraded
//! mode selected when no real credential is configured; `MemoryMailer`
//! records messages for tests.

use crate::NotifyError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::info;

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// One outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound email channel.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct SendGridAddress {
    email: String,
}

#[derive(Serialize)]
struct SendGridPersonalization {
    to: Vec<SendGridAddress>,
    subject: String,
}

#[derive(Serialize)]
struct SendGridContent {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Serialize)]
struct SendGridRequest {
    personalizations: Vec<SendGridPersonalization>,
    from: SendGridAddress,
    content: Vec<SendGridContent>,
}

/// Sends mail through the SendGrid REST API.
pub struct SendGridMailer {
    api_key: String,
    from: String,
    http: reqwest::Client,
    api_url: String,
}

impl SendGridMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from: from.into(),
            http: reqwest::Client::new(),
            api_url: SENDGRID_API_URL.to_string(),
        }
    }

    /// Points the mailer at a different endpoint, for tests against a stub.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl EmailProvider for SendGridMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let request = SendGridRequest {
            personalizations: vec![SendGridPersonalization {
                to: vec![SendGridAddress {
                    email: message.to.clone(),
                }],
                subject: message.subject.clone(),
            }],
            from: SendGridAddress {
                email: self.from.clone(),
            },
            content: vec![SendGridContent {
                content_type: "text/plain".to_string(),
                value: message.body.clone(),
            }],
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Provider(format!("sendgrid {status}: {body}")));
        }
        Ok(())
    }
}

/// Degraded-mode mailer: logs the would-be message and reports success, so
/// checkout is never blocked in environments without a provider credential.
#[derive(Debug, Default)]
pub struct NullMailer;

impl NullMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailProvider for NullMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "Email provider not configured; message logged instead of sent"
        );
        Ok(())
    }
}

/// Test mailer recording every message, with a failure switch for
/// channel-independence tests.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }
}

#[async_trait]
impl EmailProvider for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Provider("memory mailer set to fail".into()));
        }
        self.sent
            .lock()
            .expect("mailer lock poisoned")
            .push(message.clone());
        Ok(())
    }
}
