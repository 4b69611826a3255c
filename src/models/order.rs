use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The single order-creation payload sent to the order backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub payment_method_id: String,
    pub shipping_address_id: Uuid,
    pub shipping_method_id: String,
}

/// A created order, as returned by the order backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub order_id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Closed set of order-submission declines.
///
/// The order backend signals these in provider-specific shapes; the client
/// adapter converts them to this union at the boundary so nothing else in
/// the crate inspects provider fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutDecline {
    /// The selected payment method was invalidated out-of-band (e.g. a
    /// single-use token already consumed) and can no longer be charged.
    PaymentMethodBurned { payment_method_id: String },
    /// Order total is below the gateway's processing minimum.
    AmountTooSmall {
        minimum_amount: Decimal,
        current_amount: Decimal,
    },
    /// Any other decline. Carries the backend's message when it sent one.
    Generic {
        #[serde(default)]
        message: Option<String>,
    },
}

impl CheckoutDecline {
    /// Short tag for logs and events.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutDecline::PaymentMethodBurned { .. } => "payment_method_burned",
            CheckoutDecline::AmountTooSmall { .. } => "amount_too_small",
            CheckoutDecline::Generic { .. } => "generic",
        }
    }
}
