//! Webhook signature verification and event parsing.
//!
//! Signature verification is a security boundary: mismatches reject the
//! request, never degrade to best-effort.

use crate::PaymentError;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use subtle::ConstantTimeEq;

/// Replay window for the signature timestamp.
const TOLERANCE_SECS: i64 = 300;

/// A verified, typed webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: WebhookObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl WebhookEvent {
    /// The order this event refers to, when the intent carried one.
    pub fn order_id(&self) -> Option<&str> {
        self.data.object.metadata.get("order_id").map(String::as_str)
    }
}

/// Parses a `Stripe-Signature`-style header.
///
/// # Format
/// ```text
/// t=timestamp,v1=signature
/// ```
fn parse_signature_header(signature: &str) -> Result<(String, String), PaymentError> {
    let mut timestamp = String::new();
    let mut v1_signature = String::new();

    for part in signature.split(',') {
        let kv: Vec<&str> = part.split('=').collect();
        if kv.len() != 2 {
            continue;
        }

        match kv[0] {
            "t" => timestamp = kv[1].to_string(),
            "v1" => v1_signature = kv[1].to_string(),
            _ => {}
        }
    }

    if timestamp.is_empty() || v1_signature.is_empty() {
        return Err(PaymentError::InvalidSignature);
    }

    Ok((timestamp, v1_signature))
}

/// Verifies the webhook signature using HMAC-SHA256.
///
/// Uses constant-time comparison, and validates the timestamp against a
/// 5-minute replay window. Any mismatch rejects with
/// [`PaymentError::InvalidSignature`].
pub fn verify_signature(
    payload: &[u8],
    signature: &str,
    secret: &str,
) -> Result<(), PaymentError> {
    let (timestamp, v1_sig) = parse_signature_header(signature)?;

    let timestamp_num: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature)?;
    let now = chrono::Utc::now().timestamp();
    if (now - timestamp_num).abs() > TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature);
    }

    // Signed payload is "timestamp.payload".
    let payload_str =
        std::str::from_utf8(payload).map_err(|_| PaymentError::InvalidSignature)?;
    let signed_payload = format!("{timestamp}.{payload_str}");

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if bool::from(expected.as_bytes().ct_eq(v1_sig.as_bytes())) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

/// Verifies the signature and parses the payload into a typed event.
pub fn construct_event(
    payload: &[u8],
    signature: &str,
    secret: &str,
) -> Result<WebhookEvent, PaymentError> {
    verify_signature(payload, signature, secret)?;
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn test_parse_signature_header() {
        let (timestamp, v1) =
            parse_signature_header("t=1609459200,v1=abcdef1234567890").unwrap();
        assert_eq!(timestamp, "1609459200");
        assert_eq!(v1, "abcdef1234567890");
    }

    #[test]
    fn test_parse_signature_header_invalid() {
        assert!(parse_signature_header("invalid").is_err());
    }

    #[test]
    fn test_verify_valid_signature() {
        let payload = r#"{"type":"payment_intent.succeeded"}"#;
        let header = sign(payload, SECRET, chrono::Utc::now().timestamp());
        assert!(verify_signature(payload.as_bytes(), &header, SECRET).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let header = sign("{\"a\":1}", SECRET, chrono::Utc::now().timestamp());
        let err = verify_signature(b"{\"a\":2}", &header, SECRET).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSignature));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let payload = "{}";
        let header = sign(payload, "whsec_other", chrono::Utc::now().timestamp());
        assert!(verify_signature(payload.as_bytes(), &header, SECRET).is_err());
    }

    #[test]
    fn test_verify_rejects_stale_timestamp() {
        let payload = "{}";
        let stale = chrono::Utc::now().timestamp() - TOLERANCE_SECS - 60;
        let header = sign(payload, SECRET, stale);
        assert!(verify_signature(payload.as_bytes(), &header, SECRET).is_err());
    }

    #[test]
    fn test_construct_event_exposes_order_metadata() {
        let payload = r#"{
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_123",
                "metadata": { "order_id": "o1" }
            } }
        }"#;
        let header = sign(payload, SECRET, chrono::Utc::now().timestamp());
        let event = construct_event(payload.as_bytes(), &header, SECRET).unwrap();
        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.data.object.id, "pi_123");
        assert_eq!(event.order_id(), Some("o1"));
    }
}
