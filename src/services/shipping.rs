use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::ShippingSelection;

/// A selectable shipping method.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShippingOption {
    pub method_id: &'static str,
    pub name: &'static str,
    pub cost: Decimal,
    pub estimated_days: u32,
}

/// The fixed set of shipping methods offered at checkout.
static SHIPPING_METHODS: Lazy<Vec<ShippingOption>> = Lazy::new(|| {
    vec![
        ShippingOption {
            method_id: "standard",
            name: "Standard",
            cost: Decimal::from(10),
            estimated_days: 5,
        },
        ShippingOption {
            method_id: "express",
            name: "Express",
            cost: Decimal::from(25),
            estimated_days: 2,
        },
        ShippingOption {
            method_id: "overnight",
            name: "Overnight",
            cost: Decimal::from(50),
            estimated_days: 1,
        },
    ]
});

pub fn shipping_methods() -> &'static [ShippingOption] {
    &SHIPPING_METHODS
}

/// Snapshot of a shipping method for the session, taken at selection time.
pub fn find_shipping_method(method_id: &str) -> Option<ShippingSelection> {
    SHIPPING_METHODS
        .iter()
        .find(|m| m.method_id == method_id)
        .map(|m| ShippingSelection {
            method_id: m.method_id.to_string(),
            name: m.name.to_string(),
            cost: m.cost,
        })
}
