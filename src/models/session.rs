use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Denormalized cache of the most recently saved or selected payment
/// method. Lets views render the card without a gateway round trip; the
/// gateway list remains the system of record and is reconciled against on
/// every entry to the payment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SavedCard {
    /// Gateway-owned method identifier
    pub id: String,
    /// Last four digits of the card number
    pub last4: String,
    /// Card brand as reported by the gateway (e.g. "visa")
    pub brand: String,
}

impl SavedCard {
    /// Last4 + brand match. Heuristic only: distinct cards can share both
    /// within a brand, so this can mis-identify in either direction.
    pub fn matches(&self, last4: &str, brand: &str) -> bool {
        self.last4 == last4 && self.brand.eq_ignore_ascii_case(brand)
    }
}

/// Shipping method snapshotted at selection time. Not re-fetched later in
/// the flow; the confirmation step submits exactly what the buyer saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingSelection {
    pub method_id: String,
    pub name: String,
    pub cost: Decimal,
}

/// The buyer's in-progress checkout selections, persisted across page
/// navigations within the checkout flow.
///
/// Populated incrementally: the address step writes `address_id` and
/// `shipping_method`, the payment step writes `payment_method_id` and
/// `saved_card`, and the confirmation step only reads. Cleared exactly
/// once, immediately after an order is successfully created; never cleared
/// on failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckoutSession {
    /// Selected shipping address; opaque reference into the address backend
    pub address_id: Option<Uuid>,
    /// Shipping method snapshot
    pub shipping_method: Option<ShippingSelection>,
    /// Selected payment method; opaque reference into the gateway's list.
    /// Likely valid but reverified at submission time, since the gateway
    /// may invalidate a method out-of-band.
    pub payment_method_id: Option<String>,
    /// Cached payment method for display
    pub saved_card: Option<SavedCard>,
}

impl CheckoutSession {
    /// True when every field the confirmation step requires is present.
    pub fn is_complete(&self) -> bool {
        self.address_id.is_some()
            && self.shipping_method.is_some()
            && self.payment_method_id.is_some()
            && self.saved_card.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.address_id.is_none()
            && self.shipping_method.is_none()
            && self.payment_method_id.is_none()
            && self.saved_card.is_none()
    }
}
