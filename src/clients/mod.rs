//! Clients for the external collaborators this service orchestrates.
//!
//! Each collaborator is a trait so services can be tested against fakes,
//! plus a reqwest-backed adapter. Adapters own the bounded timeout (set on
//! the shared `reqwest::Client`) and translate provider-specific error
//! shapes into crate types at this boundary; nothing outside `clients`
//! inspects provider payloads.

use serde::Deserialize;
use std::time::Duration;

use crate::config::CollaboratorConfig;

pub mod addresses;
pub mod cart;
pub mod gateway;
pub mod identity;
pub mod orders;

pub use addresses::{AddressClient, HttpAddressClient};
pub use cart::{CartClient, HttpCartClient};
pub use gateway::{HttpPaymentGateway, PaymentGateway};
pub use identity::{HttpIdentityClient, IdentityClient};
pub use orders::{HttpOrderClient, OrderClient, SubmitOutcome};

/// Shared HTTP client for all collaborators, with the bounded timeout the
/// collaborator contract requires.
pub fn build_http_client(cfg: &CollaboratorConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .build()
        .expect("reqwest client construction cannot fail with static options")
}

/// Common provider error body: `{"error": {"message": ...}}` with a flat
/// `{"message": ...}` fallback.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error: Option<ProviderErrorDetails>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetails {
    #[serde(default)]
    message: Option<String>,
}

/// Extract the provider's human-readable message from an error response
/// body, if it sent one.
pub(crate) fn provider_error_message(body: &str) -> Option<String> {
    let parsed: ProviderErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .and_then(|e| e.message)
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
}
