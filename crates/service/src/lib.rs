//! Business logic layer: the order workflow.
//!
//! The workflow accepts a raw checkout submission, validates it, persists it,
//! and guarantees that notification dispatch is attempted exactly once per
//! successful persistence — independent of notification outcome. Every entry
//! point that inserts an order goes through this module, so notification
//! behavior cannot diverge between routes.

use chrono::Utc;
use model::{
    CaseType, FulfillmentMethod, NewOrder, NotificationOutcome, Order, OrderChanges,
    OrderStatus, OrderSubmission, PaymentStatus,
};
use notifier::Dispatcher;
use payment::{WebhookEvent, EVENT_PAYMENT_FAILED, EVENT_PAYMENT_SUCCEEDED};
use repository::{OrdersRepository, RepositoryError};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// The main error type for workflow operations.
///
/// Notification failures deliberately have no variant here: they are
/// reported as data inside [`SubmittedOrder::notifications`], never as an
/// error.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The submission is missing required fields or fails type checks.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
    /// A repository (database) operation failed.
    #[error("Database error: {0}")]
    Db(#[from] RepositoryError),
    /// Some unexpected or unhandled error.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Result of a successful order submission: the persisted record plus the
/// per-channel notification outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedOrder {
    pub order: Order,
    pub notifications: NotificationOutcome,
}

/// Orchestrates validate -> persist -> notify for every order entry point.
pub struct OrderWorkflow {
    orders: Arc<dyn OrdersRepository>,
    dispatcher: Dispatcher,
}

impl OrderWorkflow {
    pub fn new(orders: Arc<dyn OrdersRepository>, dispatcher: Dispatcher) -> Self {
        Self { orders, dispatcher }
    }

    pub fn orders(&self) -> &Arc<dyn OrdersRepository> {
        &self.orders
    }

    /// Validates, persists, and notifies for a checkout submission.
    ///
    /// Persistence failure aborts before any notification is attempted. Once
    /// the insert succeeds, the overall call cannot fail anymore: the
    /// dispatcher's outcome is captured and returned alongside the order.
    #[instrument(skip(self, submission))]
    pub async fn submit_order(
        &self,
        submission: OrderSubmission,
    ) -> Result<SubmittedOrder, ServiceError> {
        let new_order = self.normalize(submission, None)?;
        self.persist_and_notify(new_order).await
    }

    /// Pre-authorized payment path: persists the order with payment fields
    /// already marked completed, then notifies like every other entry point.
    #[instrument(skip(self, submission))]
    pub async fn confirm_payment(
        &self,
        payment_intent_id: &str,
        submission: OrderSubmission,
    ) -> Result<SubmittedOrder, ServiceError> {
        if payment_intent_id.trim().is_empty() {
            return Err(ServiceError::InvalidOrder(
                "payment_intent_id is required".into(),
            ));
        }
        let mut new_order = self.normalize(submission, Some(payment_intent_id))?;
        new_order.status = OrderStatus::Confirmed;
        new_order.payment_status = PaymentStatus::Completed;
        self.persist_and_notify(new_order).await
    }

    /// Applies a verified payment webhook event to the referenced order.
    ///
    /// Unrecognized event types and events without an order reference are
    /// logged and ignored; the webhook is still acknowledged.
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn apply_payment_event(&self, event: &WebhookEvent) -> Result<(), ServiceError> {
        let changes = match event.event_type.as_str() {
            EVENT_PAYMENT_SUCCEEDED => OrderChanges {
                status: Some(OrderStatus::Confirmed),
                payment_status: Some(PaymentStatus::Completed),
                payment_transaction_id: Some(event.data.object.id.clone()),
                ..Default::default()
            },
            EVENT_PAYMENT_FAILED => OrderChanges {
                status: Some(OrderStatus::Failed),
                payment_status: Some(PaymentStatus::Failed),
                payment_transaction_id: Some(event.data.object.id.clone()),
                ..Default::default()
            },
            other => {
                info!(event_type = other, "Ignoring unrecognized webhook event type");
                return Ok(());
            }
        };

        let Some(order_id) = event.order_id() else {
            warn!("Payment event carries no order_id metadata; ignoring");
            return Ok(());
        };
        let Ok(order_id) = Uuid::from_str(order_id) else {
            warn!(order_id, "Payment event order_id is not a valid id; ignoring");
            return Ok(());
        };

        match self.orders.update(order_id, &changes).await {
            Ok(order) => {
                info!(
                    order_id = %order.id,
                    status = %order.status,
                    payment_status = %order.payment_status,
                    "Order updated from payment event"
                );
                Ok(())
            }
            Err(RepositoryError::NotFound) => {
                warn!(%order_id, "Payment event references an unknown order; ignoring");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn persist_and_notify(
        &self,
        new_order: NewOrder,
    ) -> Result<SubmittedOrder, ServiceError> {
        let order = self.orders.insert(&new_order).await?;
        info!(order_id = %order.id, order_number = ?order.order_number, "Order persisted");

        // Best-effort fan-out; the request succeeds regardless of outcome.
        let notifications = self.dispatcher.notify_order(&order).await;
        Ok(SubmittedOrder {
            order,
            notifications,
        })
    }

    /// Validates required fields and produces the normalized insert record.
    fn normalize(
        &self,
        submission: OrderSubmission,
        payment_transaction_id: Option<&str>,
    ) -> Result<NewOrder, ServiceError> {
        let design_image = required(submission.design_image, "design_image")?;
        let contact_name = required(submission.contact_name, "contact_name")?;
        let contact_email = required(submission.contact_email, "contact_email")?;

        let amount = submission
            .amount
            .ok_or_else(|| ServiceError::InvalidOrder("amount is required".into()))?;
        if amount <= 0.0 {
            return Err(ServiceError::InvalidOrder("amount must be positive".into()));
        }

        let fulfillment_method = submission.fulfillment_method.unwrap_or_default();
        let delivery_address = submission
            .delivery_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        match fulfillment_method {
            FulfillmentMethod::Delivery if delivery_address.is_none() => {
                return Err(ServiceError::InvalidOrder(
                    "delivery_address is required for delivery orders".into(),
                ));
            }
            FulfillmentMethod::Pickup if submission.store_location_id.is_none() => {
                // Soft requirement: accepted, but worth the operator's attention.
                warn!("Pickup order submitted without a store location");
            }
            _ => {}
        }

        Ok(NewOrder {
            order_number: Some(model::generate_order_number(Utc::now())),
            phone_model: submission.phone_model,
            case_type: submission.case_type.unwrap_or(CaseType::Regular),
            design_image,
            original_image: submission.original_image,
            adjustments: submission.adjustments,
            fulfillment_method,
            delivery_address,
            contact_name,
            contact_email,
            contact_phone: submission.contact_phone,
            store_location_id: submission.store_location_id,
            amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: submission.payment_method,
            payment_transaction_id: payment_transaction_id.map(str::to_string),
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ServiceError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::InvalidOrder(format!("{field} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notifier::{MemoryMailer, MemorySender, SmsProvider};
    use repository::MemoryOrdersRepository;
    use serde_json::json;

    struct Harness {
        repo: Arc<MemoryOrdersRepository>,
        mailer: Arc<MemoryMailer>,
        sender: Arc<MemorySender>,
        workflow: OrderWorkflow,
    }

    fn harness() -> Harness {
        let repo = Arc::new(MemoryOrdersRepository::new());
        let mailer = Arc::new(MemoryMailer::new());
        let sender = Arc::new(MemorySender::new());
        let dispatcher = Dispatcher::new(
            mailer.clone(),
            Some(sender.clone() as Arc<dyn SmsProvider>),
            "ops@example.com",
            "https://shop.example.com",
        );
        let workflow = OrderWorkflow::new(repo.clone(), dispatcher);
        Harness {
            repo,
            mailer,
            sender,
            workflow,
        }
    }

    fn valid_submission() -> OrderSubmission {
        serde_json::from_value(json!({
            "design_image": "http://x/img.png",
            "contact_name": "Ann",
            "contact_email": "ann@x.com",
            "amount": 29.99,
            "fulfillment_method": "pickup",
            "store_location_id": Uuid::new_v4(),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_valid_submission_persists_with_defaults() {
        let h = harness();
        let result = h.workflow.submit_order(valid_submission()).await.unwrap();

        assert_eq!(result.order.case_type, CaseType::Regular);
        assert_eq!(result.order.status, OrderStatus::Pending);
        assert_eq!(result.order.payment_status, PaymentStatus::Pending);
        assert!(result
            .order
            .order_number
            .as_deref()
            .unwrap()
            .starts_with("PC-"));
        assert_eq!(h.repo.len().await, 1);

        // Admin email always, customer email resolvable, SMS false (no phone).
        assert!(result.notifications.admin_email);
        assert!(result.notifications.customer_email);
        assert!(!result.notifications.customer_sms);
        assert_eq!(h.sender.sent().len(), 0);
    }

    #[tokio::test]
    async fn test_missing_required_fields_skip_persistence() {
        let h = harness();
        for field in ["design_image", "contact_name", "contact_email", "amount"] {
            let mut payload = json!({
                "design_image": "http://x/img.png",
                "contact_name": "Ann",
                "contact_email": "ann@x.com",
                "amount": 29.99,
            });
            payload.as_object_mut().unwrap().remove(field);
            let submission: OrderSubmission = serde_json::from_value(payload).unwrap();

            let err = h.workflow.submit_order(submission).await.unwrap_err();
            assert!(
                matches!(err, ServiceError::InvalidOrder(ref msg) if msg.contains(field)),
                "wrong error for {field}: {err}"
            );
        }
        assert_eq!(h.repo.insert_attempts(), 0);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let h = harness();
        let mut submission = valid_submission();
        submission.amount = Some(0.0);
        let err = h.workflow.submit_order(submission).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOrder(_)));
        assert_eq!(h.repo.insert_attempts(), 0);
    }

    #[tokio::test]
    async fn test_delivery_requires_address() {
        let h = harness();
        let submission: OrderSubmission = serde_json::from_value(json!({
            "design_image": "http://x/img.png",
            "contact_name": "Ann",
            "contact_email": "ann@x.com",
            "amount": 29.99,
            "fulfillment_method": "delivery",
        }))
        .unwrap();
        let err = h.workflow.submit_order(submission).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOrder(ref m) if m.contains("delivery_address")));
    }

    #[tokio::test]
    async fn test_pickup_without_location_is_accepted() {
        let h = harness();
        let mut submission = valid_submission();
        submission.store_location_id = None;
        let result = h.workflow.submit_order(submission).await.unwrap();
        assert_eq!(result.order.store_location_id, None);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_submission() {
        let h = harness();
        h.mailer.fail(true);
        let result = h.workflow.submit_order(valid_submission()).await.unwrap();
        assert!(!result.notifications.admin_email);
        assert!(!result.notifications.customer_email);
        assert_eq!(h.repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_aborts_without_notification() {
        let h = harness();
        h.repo.fail_inserts(true);
        let err = h.workflow.submit_order(valid_submission()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Db(_)));
        assert!(h.mailer.sent().is_empty());
        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_payment_persists_completed_and_notifies() {
        let h = harness();
        let result = h
            .workflow
            .confirm_payment("pi_test_123", valid_submission())
            .await
            .unwrap();
        assert_eq!(result.order.status, OrderStatus::Confirmed);
        assert_eq!(result.order.payment_status, PaymentStatus::Completed);
        assert_eq!(
            result.order.payment_transaction_id.as_deref(),
            Some("pi_test_123")
        );
        // Notify-after-insert holds on this entry point too.
        assert_eq!(h.mailer.sent().len(), 2);
    }

    fn event(event_type: &str, intent_id: &str, order_id: Option<Uuid>) -> WebhookEvent {
        let mut payload = json!({
            "type": event_type,
            "data": { "object": { "id": intent_id, "metadata": {} } }
        });
        if let Some(id) = order_id {
            payload["data"]["object"]["metadata"]["order_id"] = json!(id.to_string());
        }
        serde_json::from_value(payload).unwrap()
    }

    #[tokio::test]
    async fn test_succeeded_event_confirms_order() {
        let h = harness();
        let submitted = h.workflow.submit_order(valid_submission()).await.unwrap();

        h.workflow
            .apply_payment_event(&event(
                EVENT_PAYMENT_SUCCEEDED,
                "pi_777",
                Some(submitted.order.id),
            ))
            .await
            .unwrap();

        let order = h.repo.get_by_id(submitted.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(order.payment_transaction_id.as_deref(), Some("pi_777"));
    }

    #[tokio::test]
    async fn test_failed_event_fails_order() {
        let h = harness();
        let submitted = h.workflow.submit_order(valid_submission()).await.unwrap();

        h.workflow
            .apply_payment_event(&event(
                EVENT_PAYMENT_FAILED,
                "pi_778",
                Some(submitted.order.id),
            ))
            .await
            .unwrap();

        let order = h.repo.get_by_id(submitted.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_unrecognized_event_is_ignored() {
        let h = harness();
        let submitted = h.workflow.submit_order(valid_submission()).await.unwrap();

        h.workflow
            .apply_payment_event(&event(
                "charge.refunded",
                "pi_779",
                Some(submitted.order.id),
            ))
            .await
            .unwrap();

        let order = h.repo.get_by_id(submitted.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_event_without_order_reference_is_ignored() {
        let h = harness();
        h.workflow
            .apply_payment_event(&event(EVENT_PAYMENT_SUCCEEDED, "pi_780", None))
            .await
            .unwrap();
    }
}
