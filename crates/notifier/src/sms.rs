//! SMS providers: Twilio REST sender, a degraded-mode null sender, and an
//! in-memory test sender.

use crate::NotifyError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::info;

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// One outbound SMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

/// Outbound SMS channel.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError>;
}

/// Sends SMS through the Twilio REST API.
pub struct TwilioSender {
    account_sid: String,
    auth_token: String,
    from_number: String,
    http: reqwest::Client,
    api_base: String,
}

impl TwilioSender {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            http: reqwest::Client::new(),
            api_base: TWILIO_API_BASE.to_string(),
        }
    }

    /// Points the sender at a different endpoint, for tests against a stub.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl SmsProvider for TwilioSender {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let form = [
            ("To", message.to.as_str()),
            ("From", self.from_number.as_str()),
            ("Body", message.body.as_str()),
        ];

        let response = self
            .http
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Provider(format!("twilio {status}: {body}")));
        }
        Ok(())
    }
}

/// Degraded-mode sender: logs and reports success without network I/O.
#[derive(Debug, Default)]
pub struct NullSender;

impl NullSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SmsProvider for NullSender {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError> {
        info!(
            to = %message.to,
            "SMS provider not configured; message logged instead of sent"
        );
        Ok(())
    }
}

/// Test sender recording every message, with a failure switch.
#[derive(Debug, Default)]
pub struct MemorySender {
    sent: Mutex<Vec<SmsMessage>>,
    fail: AtomicBool,
}

impl MemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        self.sent.lock().expect("sender lock poisoned").clone()
    }
}

#[async_trait]
impl SmsProvider for MemorySender {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Provider("memory sender set to fail".into()));
        }
        self.sent
            .lock()
            .expect("sender lock poisoned")
            .push(message.clone());
        Ok(())
    }
}
