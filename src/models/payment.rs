use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A tokenized, reusable payment method held by the external gateway.
/// Never the raw card data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethod {
    pub id: String,
    pub brand: String,
    pub last4: String,
}

/// Raw card fields forwarded to the gateway's setup-intent registration.
/// This service never stores them; they exist only for the duration of the
/// registration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub cardholder_name: String,
    pub number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: String,
}

impl CardDetails {
    pub fn last4(&self) -> String {
        let digits: Vec<char> = self.number.chars().filter(|c| c.is_ascii_digit()).collect();
        digits[digits.len().saturating_sub(4)..].iter().collect()
    }
}
