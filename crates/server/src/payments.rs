//! Payment-facing routes: order creation at checkout, payment intents,
//! hosted checkout sessions, webhook ingestion, and status lookups.

use crate::error::ApiError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use model::OrderSubmission;
use payment::CheckoutParams;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{error, warn};

/// `POST /api/payments/create-order`
pub async fn handle_create_order(
    State(state): State<AppState>,
    Json(submission): Json<OrderSubmission>,
) -> Result<Response, ApiError> {
    let submitted = state.workflow.submit_order(submission).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "order": submitted.order,
            "notifications": submitted.notifications,
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
    pub order_data: OrderSubmission,
}

/// `POST /api/payments/confirm-payment` — pre-authorized payment path.
pub async fn handle_confirm_payment(
    State(state): State<AppState>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Response, ApiError> {
    let submitted = state
        .workflow
        .confirm_payment(&request.payment_intent_id, request.order_data)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "order": submitted.order,
            "payment": {
                "id": request.payment_intent_id,
                "status": "succeeded",
            },
            "notifications": submitted.notifications,
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

/// `POST /api/payments/create-payment-intent`
pub async fn handle_create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<Response, ApiError> {
    let amount = request
        .amount
        .filter(|a| *a > 0.0)
        .ok_or_else(|| ApiError::Validation("amount must be a positive number".into()))?;
    let currency = request.currency.unwrap_or_else(|| "usd".to_string());
    let metadata = request.metadata.unwrap_or_default();

    let intent = state
        .payments
        .create_payment_intent(amount, &currency, &metadata)
        .await?;

    Ok(Json(json!({
        "success": true,
        "client_secret": intent.client_secret,
        "payment_intent_id": intent.id,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub order_data: Option<OrderSubmission>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// `POST /api/payments/create-checkout-session`
pub async fn handle_create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Response, ApiError> {
    let amount = request
        .amount
        .ok_or_else(|| ApiError::Validation("amount is required".into()))?;
    let order_data = request
        .order_data
        .ok_or_else(|| ApiError::Validation("orderData is required".into()))?;
    let success_url = request
        .success_url
        .ok_or_else(|| ApiError::Validation("successUrl is required".into()))?;
    let cancel_url = request
        .cancel_url
        .ok_or_else(|| ApiError::Validation("cancelUrl is required".into()))?;

    let session = state
        .payments
        .create_checkout_session(&CheckoutParams {
            amount,
            currency: request.currency.unwrap_or_else(|| "usd".to_string()),
            product_name: product_summary(&order_data),
            success_url,
            cancel_url,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "sessionId": session.id,
        "url": session.url,
    }))
    .into_response())
}

/// Single line-item description shown on the hosted checkout page.
fn product_summary(order: &OrderSubmission) -> String {
    let case_type = order.case_type.unwrap_or_default();
    let fulfillment = order.fulfillment_method.unwrap_or_default();
    match &order.phone_model {
        Some(model) => format!("Custom {case_type} case for {model} ({fulfillment})"),
        None => format!("Custom {case_type} phone case ({fulfillment})"),
    }
}

/// `POST /api/payments/webhook`
///
/// Raw body; the signature check is a security boundary, so any mismatch
/// rejects the request before the referenced order is touched.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let event = match payment::construct_event(&body, signature, &state.webhook_secret) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Rejected webhook with bad signature");
            return (StatusCode::BAD_REQUEST, format!("Webhook error: {e}")).into_response();
        }
    };

    if let Err(e) = state.workflow.apply_payment_event(&event).await {
        error!(error = %e, "Failed to apply payment event");
        return ApiError::Internal(e.to_string()).into_response();
    }

    Json(json!({ "received": true })).into_response()
}

/// `GET /api/payments/payment-status/{id}`
pub async fn handle_payment_status(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> Result<Response, ApiError> {
    let status = state.payments.get_payment_status(&intent_id).await?;
    Ok(Json(json!({ "success": true, "payment": status })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{sample_order, test_app};
    use axum::http::HeaderValue;
    use hmac::{Hmac, Mac};
    use model::{OrderStatus, PaymentStatus};
    use sha2::Sha256;
    use uuid::Uuid;

    fn sign(secret: &str, timestamp: i64, payload: &str) -> HeaderMap {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut headers = HeaderMap::new();
        headers.insert(
            "stripe-signature",
            HeaderValue::from_str(&format!("t={timestamp},v1={signature}")).unwrap(),
        );
        headers
    }

    fn event_payload(event_type: &str, intent_id: &str, order_id: Uuid) -> String {
        serde_json::json!({
            "type": event_type,
            "data": {
                "object": {
                    "id": intent_id,
                    "metadata": { "order_id": order_id.to_string() },
                },
            },
        })
        .to_string()
    }

    #[tokio::test]
    async fn webhook_rejects_bad_signature_without_touching_orders() {
        let app = test_app();
        let order = sample_order("Alice");
        let id = order.id;
        app.orders.put(order).await;

        let payload = event_payload("payment_intent.succeeded", "pi_123", id);
        let headers = sign("wrong-secret", chrono::Utc::now().timestamp(), &payload);

        let response =
            handle_webhook(State(app.state.clone()), headers, Bytes::from(payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let stored = app.state.orders.get_by_id(id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert_eq!(stored.payment_transaction_id, None);
    }

    #[tokio::test]
    async fn webhook_rejects_missing_signature_header() {
        let app = test_app();

        let response = handle_webhook(
            State(app.state.clone()),
            HeaderMap::new(),
            Bytes::from_static(b"{}"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_rejects_stale_timestamp() {
        let app = test_app();
        let order = sample_order("Alice");
        let id = order.id;
        app.orders.put(order).await;

        let payload = event_payload("payment_intent.succeeded", "pi_123", id);
        let stale = chrono::Utc::now().timestamp() - 3600;
        let headers = sign(&app.state.webhook_secret, stale, &payload);

        let response =
            handle_webhook(State(app.state.clone()), headers, Bytes::from(payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let stored = app.state.orders.get_by_id(id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn webhook_confirms_order_on_succeeded_event() {
        let app = test_app();
        let order = sample_order("Alice");
        let id = order.id;
        app.orders.put(order).await;

        let payload = event_payload("payment_intent.succeeded", "pi_123", id);
        let headers = sign(
            &app.state.webhook_secret,
            chrono::Utc::now().timestamp(),
            &payload,
        );

        let response =
            handle_webhook(State(app.state.clone()), headers, Bytes::from(payload)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let stored = app.state.orders.get_by_id(id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.payment_status, PaymentStatus::Completed);
        assert_eq!(stored.payment_transaction_id.as_deref(), Some("pi_123"));
    }

    #[tokio::test]
    async fn webhook_fails_order_on_failed_event() {
        let app = test_app();
        let order = sample_order("Bob");
        let id = order.id;
        app.orders.put(order).await;

        let payload = event_payload("payment_intent.payment_failed", "pi_456", id);
        let headers = sign(
            &app.state.webhook_secret,
            chrono::Utc::now().timestamp(),
            &payload,
        );

        let response =
            handle_webhook(State(app.state.clone()), headers, Bytes::from(payload)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let stored = app.state.orders.get_by_id(id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn create_payment_intent_requires_positive_amount() {
        let app = test_app();

        let result = handle_create_payment_intent(
            State(app.state.clone()),
            Json(CreateIntentRequest {
                amount: Some(0.0),
                currency: None,
                metadata: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn product_summary_names_the_case_and_fulfillment() {
        let order = OrderSubmission {
            phone_model: Some("Pixel 9".to_string()),
            case_type: Some(model::CaseType::Magsafe),
            fulfillment_method: Some(model::FulfillmentMethod::Delivery),
            ..Default::default()
        };
        assert_eq!(
            product_summary(&order),
            "Custom magsafe case for Pixel 9 (delivery)"
        );

        let bare = OrderSubmission::default();
        assert_eq!(product_summary(&bare), "Custom regular phone case (pickup)");
    }
}
