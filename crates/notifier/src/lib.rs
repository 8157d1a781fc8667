//! Notification Dispatcher.
//!
//! Best-effort delivery of order-event messages across two channels (email,
//! SMS) to two audiences (operator, customer). Every attempt is isolated:
//! one channel's failure never blocks or fails another, and the dispatcher
//! itself never returns an error — outcomes are data.

use async_trait::async_trait;
use model::{NotificationOutcome, Order};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

mod email;
mod sms;

pub use email::{EmailMessage, EmailProvider, MemoryMailer, NullMailer, SendGridMailer};
pub use sms::{MemorySender, NullSender, SmsMessage, SmsProvider, TwilioSender};

/// Errors raised by individual providers. These never escape the dispatcher;
/// they are logged and folded into the per-channel boolean outcome.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

const NOT_PROVIDED: &str = "Not provided";
const NOT_SPECIFIED: &str = "Not specified";

/// Fans out order notifications. Constructed once at startup; holds no
/// per-request state.
pub struct Dispatcher {
    email: Arc<dyn EmailProvider>,
    sms: Option<Arc<dyn SmsProvider>>,
    admin_email: String,
    frontend_url: String,
}

impl Dispatcher {
    /// `sms` is `None` when no SMS provider is configured; customer SMS then
    /// short-circuits to failure without attempting I/O. `frontend_url` is the
    /// storefront origin linked from customer emails.
    pub fn new(
        email: Arc<dyn EmailProvider>,
        sms: Option<Arc<dyn SmsProvider>>,
        admin_email: impl Into<String>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            email,
            sms,
            admin_email: admin_email.into(),
            frontend_url: frontend_url.into(),
        }
    }

    /// Attempts admin email, customer email and customer SMS concurrently,
    /// waits for all three to settle, and reports one boolean per channel.
    pub async fn notify_order(&self, order: &Order) -> NotificationOutcome {
        let (admin_email, customer_email, customer_sms) = tokio::join!(
            self.notify_admin(order),
            self.notify_customer_email(order),
            self.notify_customer_sms(order),
        );
        NotificationOutcome {
            admin_email,
            customer_email,
            customer_sms,
        }
    }

    /// Always attempted, even for incomplete orders, so the operator hears
    /// about every submission.
    async fn notify_admin(&self, order: &Order) -> bool {
        let message = admin_order_email(&self.admin_email, order);
        match self.email.send(&message).await {
            Ok(()) => {
                info!(order_id = %order.id, "Admin order notification sent");
                true
            }
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Admin order notification failed");
                false
            }
        }
    }

    async fn notify_customer_email(&self, order: &Order) -> bool {
        let recipient = order.contact_email.trim();
        if recipient.is_empty() {
            warn!(order_id = %order.id, "No customer email on order; skipping email");
            return false;
        }
        let message = customer_order_email(recipient, order, &self.frontend_url);
        match self.email.send(&message).await {
            Ok(()) => {
                info!(order_id = %order.id, "Customer order confirmation sent");
                true
            }
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Customer order confirmation failed");
                false
            }
        }
    }

    async fn notify_customer_sms(&self, order: &Order) -> bool {
        let Some(sender) = &self.sms else {
            debug!(order_id = %order.id, "SMS provider not configured; skipping SMS");
            return false;
        };
        let Some(phone) = order
            .contact_phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        else {
            warn!(order_id = %order.id, "No customer phone on order; skipping SMS");
            return false;
        };

        let message = SmsMessage {
            to: phone.to_string(),
            body: format!(
                "Thanks for your order! Your custom phone case order {} has been received. \
                 We'll keep you posted.",
                order_reference(order)
            ),
        };
        match sender.send(&message).await {
            Ok(()) => {
                info!(order_id = %order.id, "Customer SMS sent");
                true
            }
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Customer SMS failed");
                false
            }
        }
    }
}

fn order_reference(order: &Order) -> String {
    order
        .order_number
        .clone()
        .unwrap_or_else(|| order.id.to_string())
}

fn admin_order_email(admin_email: &str, order: &Order) -> EmailMessage {
    let body = format!(
        "New order received: {reference}\n\
         \n\
         Customer: {name}\n\
         Email: {email}\n\
         Phone: {phone}\n\
         Phone model: {model}\n\
         Case type: {case_type}\n\
         Fulfillment: {fulfillment}\n\
         Delivery address: {address}\n\
         Amount: ${amount:.2}\n\
         Design image: {design}\n",
        reference = order_reference(order),
        name = non_empty_or(&order.contact_name, NOT_PROVIDED),
        email = non_empty_or(&order.contact_email, NOT_PROVIDED),
        phone = opt_or(order.contact_phone.as_deref(), NOT_PROVIDED),
        model = opt_or(order.phone_model.as_deref(), NOT_SPECIFIED),
        case_type = order.case_type,
        fulfillment = order.fulfillment_method,
        address = opt_or(order.delivery_address.as_deref(), NOT_SPECIFIED),
        amount = order.amount,
        design = non_empty_or(&order.design_image, NOT_PROVIDED),
    );
    EmailMessage {
        to: admin_email.to_string(),
        subject: format!("New order {}", order_reference(order)),
        body,
    }
}

fn customer_order_email(recipient: &str, order: &Order, frontend_url: &str) -> EmailMessage {
    let fulfillment_line = match order.fulfillment_method {
        model::FulfillmentMethod::Pickup => {
            "We'll let you know as soon as your case is ready for pickup.".to_string()
        }
        model::FulfillmentMethod::Delivery => format!(
            "It will be delivered to: {}",
            opt_or(order.delivery_address.as_deref(), NOT_SPECIFIED)
        ),
    };
    let body = format!(
        "Hi {name},\n\
         \n\
         Thanks for your order! Your custom phone case order {reference} has been received.\n\
         {fulfillment_line}\n\
         \n\
         Order total: ${amount:.2}\n\
         \n\
         Questions? Visit {frontend_url}\n",
        name = non_empty_or(&order.contact_name, "there"),
        reference = order_reference(order),
        amount = order.amount,
    );
    EmailMessage {
        to: recipient.to_string(),
        subject: format!("Your order {} is confirmed", order_reference(order)),
        body,
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { fallback } else { trimmed }
}

fn opt_or<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::{
        CaseType, FulfillmentMethod, ImageAdjustments, OrderStatus, PaymentStatus,
    };
    use uuid::Uuid;

    fn sample_order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: Some("PC-20250314-A2B3".to_string()),
            phone_model: Some("iPhone 15".to_string()),
            case_type: CaseType::Regular,
            design_image: "https://cdn.example.com/designs/a1.png".to_string(),
            original_image: None,
            adjustments: ImageAdjustments::default(),
            fulfillment_method: FulfillmentMethod::Pickup,
            delivery_address: None,
            contact_name: "Ann".to_string(),
            contact_email: "ann@example.com".to_string(),
            contact_phone: Some("+15550001111".to_string()),
            store_location_id: Some(Uuid::new_v4()),
            amount: 29.99,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            payment_transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_all_channels_succeed() {
        let mailer = Arc::new(MemoryMailer::new());
        let sender = Arc::new(MemorySender::new());
        let dispatcher = Dispatcher::new(
            mailer.clone(),
            Some(sender.clone() as Arc<dyn SmsProvider>),
            "ops@example.com",
            "https://shop.example.com",
        );

        let outcome = dispatcher.notify_order(&sample_order()).await;
        assert_eq!(
            outcome,
            NotificationOutcome {
                admin_email: true,
                customer_email: true,
                customer_sms: true,
            }
        );

        let emails = mailer.sent();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].to, "ops@example.com");
        assert_eq!(emails[1].to, "ann@example.com");
        assert_eq!(sender.sent().len(), 1);
        assert!(sender.sent()[0].body.contains("PC-20250314-A2B3"));
    }

    #[tokio::test]
    async fn test_missing_customer_email_short_circuits() {
        let mailer = Arc::new(MemoryMailer::new());
        let dispatcher =
            Dispatcher::new(mailer.clone(), None, "ops@example.com", "https://shop.example.com");

        let mut order = sample_order();
        order.contact_email = String::new();

        let outcome = dispatcher.notify_order(&order).await;
        assert!(outcome.admin_email);
        assert!(!outcome.customer_email);
        // Only the admin message made it to the provider.
        let emails = mailer.sent();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].to, "ops@example.com");
    }

    #[tokio::test]
    async fn test_email_failure_does_not_affect_sms() {
        let mailer = Arc::new(MemoryMailer::new());
        mailer.fail(true);
        let sender = Arc::new(MemorySender::new());
        let dispatcher = Dispatcher::new(
            mailer.clone(),
            Some(sender.clone() as Arc<dyn SmsProvider>),
            "ops@example.com",
            "https://shop.example.com",
        );

        let outcome = dispatcher.notify_order(&sample_order()).await;
        assert!(!outcome.admin_email);
        assert!(!outcome.customer_email);
        assert!(outcome.customer_sms);
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_sms_failure_does_not_affect_email() {
        let mailer = Arc::new(MemoryMailer::new());
        let sender = Arc::new(MemorySender::new());
        sender.fail(true);
        let dispatcher = Dispatcher::new(
            mailer.clone(),
            Some(sender.clone() as Arc<dyn SmsProvider>),
            "ops@example.com",
            "https://shop.example.com",
        );

        let outcome = dispatcher.notify_order(&sample_order()).await;
        assert!(outcome.admin_email);
        assert!(outcome.customer_email);
        assert!(!outcome.customer_sms);
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_no_sms_provider_short_circuits() {
        let mailer = Arc::new(MemoryMailer::new());
        let dispatcher =
            Dispatcher::new(mailer, None, "ops@example.com", "https://shop.example.com");

        let outcome = dispatcher.notify_order(&sample_order()).await;
        assert!(!outcome.customer_sms);
    }

    #[tokio::test]
    async fn test_null_mailer_is_deterministic() {
        let dispatcher = Dispatcher::new(
            Arc::new(NullMailer::new()),
            None,
            "ops@example.com",
            "https://shop.example.com",
        );
        let order = sample_order();
        for _ in 0..3 {
            let outcome = dispatcher.notify_order(&order).await;
            assert!(outcome.admin_email);
            assert!(outcome.customer_email);
        }
    }

    #[tokio::test]
    async fn test_admin_email_uses_fallback_placeholders() {
        let mailer = Arc::new(MemoryMailer::new());
        let dispatcher =
            Dispatcher::new(mailer.clone(), None, "ops@example.com", "https://shop.example.com");

        let mut order = sample_order();
        order.contact_phone = None;
        order.phone_model = None;
        dispatcher.notify_order(&order).await;

        let body = &mailer.sent()[0].body;
        assert!(body.contains("Phone: Not provided"));
        assert!(body.contains("Phone model: Not specified"));
    }

    #[tokio::test]
    async fn test_customer_email_links_back_to_storefront() {
        let mailer = Arc::new(MemoryMailer::new());
        let dispatcher =
            Dispatcher::new(mailer.clone(), None, "ops@example.com", "https://shop.example.com");

        dispatcher.notify_order(&sample_order()).await;

        let emails = mailer.sent();
        assert!(emails[1].body.contains("https://shop.example.com"));
    }
}
