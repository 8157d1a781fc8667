use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// CaseType — which physical case the design is printed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseType {
    #[default]
    Regular,
    Magsafe,
}

/// FulfillmentMethod — how the finished case reaches the customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentMethod {
    #[default]
    Pickup,
    Delivery,
}

/// OrderStatus — fulfillment lifecycle of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
    Completed,
}

/// PaymentStatus — payment lifecycle, independent of but correlated with
/// [`OrderStatus`]: a completed payment moves the order toward confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(
                        "invalid {}: '{other}'", stringify!($ty)
                    )),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(CaseType { Regular => "regular", Magsafe => "magsafe" });
str_enum!(FulfillmentMethod { Pickup => "pickup", Delivery => "delivery" });
str_enum!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Failed => "failed",
    Completed => "completed",
});
str_enum!(PaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

/// Image adjustment parameters applied to the uploaded design.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAdjustments {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub brightness: i32,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub contrast: i32,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub saturation: i32,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub blur: i32,
}

/// Order — one customer request to produce a custom phone case.
///
/// `id` is assigned by the datastore on insert; `order_number` is a
/// human-readable reference generated at submission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: Option<String>,
    pub phone_model: Option<String>,
    pub case_type: CaseType,
    pub design_image: String,
    pub original_image: Option<String>,
    #[serde(flatten)]
    pub adjustments: ImageAdjustments,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub store_location_id: Option<Uuid>,
    pub amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub payment_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw checkout payload as submitted by the storefront.
///
/// Numeric adjustment fields are coerced defensively: malformed client state
/// collapses to 0 instead of rejecting the checkout. The amount accepts JSON
/// numbers or numeric strings; anything else is treated as absent and caught
/// by validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderSubmission {
    pub phone_model: Option<String>,
    #[serde(default)]
    pub case_type: Option<CaseType>,
    pub design_image: Option<String>,
    pub original_image: Option<String>,
    #[serde(flatten)]
    pub adjustments: ImageAdjustments,
    #[serde(default)]
    pub fulfillment_method: Option<FulfillmentMethod>,
    pub delivery_address: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub store_location_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    pub payment_method: Option<String>,
}

/// Normalized order data ready for insertion. Produced by the workflow from a
/// validated [`OrderSubmission`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_number: Option<String>,
    pub phone_model: Option<String>,
    pub case_type: CaseType,
    pub design_image: String,
    pub original_image: Option<String>,
    pub adjustments: ImageAdjustments,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub store_location_id: Option<Uuid>,
    pub amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub payment_transaction_id: Option<String>,
}

/// Partial update applied to a persisted order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderChanges {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
    pub payment_transaction_id: Option<String>,
}

impl OrderChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payment_status.is_none()
            && self.payment_method.is_none()
            && self.payment_transaction_id.is_none()
    }
}

/// Filter and pagination parameters for the admin order listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub fulfillment_method: Option<FulfillmentMethod>,
    /// Free-text search over contact name, email and phone model.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderFilter {
    pub const DEFAULT_PER_PAGE: u32 = 20;

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(Self::DEFAULT_PER_PAGE).clamp(1, 200)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.per_page())
    }
}

/// One page of the admin order listing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Aggregates shown on the admin dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderStats {
    pub total_orders: u64,
    pub pending_orders: u64,
    /// Sum of amounts over orders with completed payment.
    pub revenue: f64,
    pub orders_today: u64,
}

/// StoreLocation — read-mostly pickup point reference data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreLocation {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub hours: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Address components heuristically extracted from a free-text address,
/// used for display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

/// Splits a free-text address of the form
/// `"200 Main St, Springfield, IL 62704"` into display components.
/// Unrecognized shapes leave the missing parts as `None`.
pub fn parse_address(address: &str) -> ParsedAddress {
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    let mut parsed = ParsedAddress::default();

    match parts.as_slice() {
        [] | [""] => {}
        [street] => parsed.street = Some((*street).to_string()),
        [street, city] => {
            parsed.street = Some((*street).to_string());
            parsed.city = Some((*city).to_string());
        }
        [street, city, tail, ..] => {
            parsed.street = Some((*street).to_string());
            parsed.city = Some((*city).to_string());
            // Tail is usually "STATE ZIP"; zip is the trailing numeric token.
            let mut tokens: Vec<&str> = tail.split_whitespace().collect();
            if let Some(last) = tokens.last() {
                if last.chars().all(|c| c.is_ascii_digit() || c == '-') {
                    parsed.zip = Some((*last).to_string());
                    tokens.pop();
                }
            }
            if !tokens.is_empty() {
                parsed.state = Some(tokens.join(" "));
            }
        }
    }

    parsed
}

/// Outcome of one notification fan-out, one flag per channel attempted.
/// Ephemeral: returned to the caller, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationOutcome {
    pub admin_email: bool,
    pub customer_email: bool,
    pub customer_sms: bool,
}

const ORDER_NUMBER_SUFFIX_LEN: usize = 4;
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generates a human-readable order number, `PC-YYYYMMDD-XXXX`.
///
/// The suffix is random; uniqueness is a soft guarantee backed by a unique
/// index at the storage layer, with no application-level retry.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_NUMBER_ALPHABET.len());
            ORDER_NUMBER_ALPHABET[idx] as char
        })
        .collect();
    format!("PC-{}-{}", now.format("%Y%m%d"), suffix)
}

fn lenient_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().map(|f| f as i32).unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().map(|f| f as i32).unwrap_or(0),
        _ => 0,
    })
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_submission_from_json() {
        let json = r#"
        {
            "phone_model": "iPhone 15 Pro",
            "case_type": "magsafe",
            "design_image": "https://cdn.example.com/designs/a1.png",
            "brightness": 10,
            "contrast": "-5",
            "saturation": null,
            "fulfillment_method": "delivery",
            "delivery_address": "1 Elm St, Springfield, IL 62704",
            "contact_name": "Ann",
            "contact_email": "ann@example.com",
            "amount": 29.99
        }
        "#;
        let sub: OrderSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(sub.case_type, Some(CaseType::Magsafe));
        assert_eq!(sub.adjustments.brightness, 10);
        assert_eq!(sub.adjustments.contrast, -5);
        assert_eq!(sub.adjustments.saturation, 0);
        assert_eq!(sub.adjustments.blur, 0);
        assert_eq!(sub.fulfillment_method, Some(FulfillmentMethod::Delivery));
        assert_eq!(sub.amount, Some(29.99));
    }

    #[test]
    fn test_lenient_amount_rejects_garbage() {
        let sub: OrderSubmission =
            serde_json::from_str(r#"{"amount": "twenty"}"#).unwrap();
        assert_eq!(sub.amount, None);

        let sub: OrderSubmission =
            serde_json::from_str(r#"{"amount": "19.50"}"#).unwrap();
        assert_eq!(sub.amount, Some(19.50));
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Failed,
            OrderStatus::Completed,
        ] {
            assert_eq!(OrderStatus::from_str(s.as_str()).unwrap(), s);
        }
        assert!(OrderStatus::from_str("shipped").is_err());
        assert_eq!(PaymentStatus::from_str("completed").unwrap(), PaymentStatus::Completed);
    }

    #[test]
    fn test_generate_order_number_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("PC-20250314-"));
        assert_eq!(number.len(), "PC-20250314-".len() + 4);
        let suffix = &number["PC-20250314-".len()..];
        assert!(suffix.bytes().all(|b| ORDER_NUMBER_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_parse_address_full() {
        let parsed = parse_address("200 Main St, Springfield, IL 62704");
        assert_eq!(parsed.street.as_deref(), Some("200 Main St"));
        assert_eq!(parsed.city.as_deref(), Some("Springfield"));
        assert_eq!(parsed.state.as_deref(), Some("IL"));
        assert_eq!(parsed.zip.as_deref(), Some("62704"));
    }

    #[test]
    fn test_parse_address_partial() {
        let parsed = parse_address("Somewhere on Main St");
        assert_eq!(parsed.street.as_deref(), Some("Somewhere on Main St"));
        assert_eq!(parsed.city, None);
        assert_eq!(parsed.zip, None);
    }

    #[test]
    fn test_filter_pagination_defaults() {
        let filter = OrderFilter::default();
        assert_eq!(filter.page(), 1);
        assert_eq!(filter.per_page(), OrderFilter::DEFAULT_PER_PAGE);
        assert_eq!(filter.offset(), 0);

        let filter = OrderFilter {
            page: Some(3),
            per_page: Some(50),
            ..Default::default()
        };
        assert_eq!(filter.offset(), 100);
    }

    #[test]
    fn test_filter_offset_survives_extreme_page() {
        let filter = OrderFilter {
            page: Some(u32::MAX),
            per_page: Some(200),
            ..Default::default()
        };
        assert_eq!(filter.offset(), (u64::from(u32::MAX) - 1) * 200);
    }
}
