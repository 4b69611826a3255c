pub mod auth;
pub mod checkout;
pub mod common;
pub mod health;

use std::sync::Arc;
use std::time::Duration;

use crate::clients::{AddressClient, CartClient, IdentityClient, OrderClient, PaymentGateway};
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{AddressStepService, ConfirmationService, PaymentStepService};
use crate::session::SessionStore;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates the checkout business logic used by
/// HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub identity: Arc<dyn IdentityClient>,
    pub address_step: Arc<AddressStepService>,
    pub payment_step: Arc<PaymentStepService>,
    pub confirmation: Arc<ConfirmationService>,
}

impl AppServices {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &AppConfig,
        identity: Arc<dyn IdentityClient>,
        addresses: Arc<dyn AddressClient>,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderClient>,
        cart: Arc<dyn CartClient>,
        sessions: Arc<dyn SessionStore>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let address_step = Arc::new(AddressStepService::new(
            addresses,
            sessions.clone(),
            event_sender.clone(),
        ));
        let payment_step = Arc::new(PaymentStepService::new(
            gateway,
            sessions.clone(),
            event_sender.clone(),
            Duration::from_millis(config.checkout.gateway_latency_floor_ms),
        ));
        let confirmation = Arc::new(ConfirmationService::new(
            orders,
            cart,
            sessions,
            event_sender,
        ));

        Self {
            identity,
            address_step,
            payment_step,
            confirmation,
        }
    }
}
