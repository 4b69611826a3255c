use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    clients::AddressClient,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{Address, CheckoutSession, NewAddress},
    services::shipping::{self, ShippingOption},
    session::SessionStore,
};

/// Address step: pick or add a shipping address, pick a shipping method.
/// On confirm, both are written into the checkout session and the buyer
/// advances to the payment step.
#[derive(Clone)]
pub struct AddressStepService {
    addresses: Arc<dyn AddressClient>,
    sessions: Arc<dyn SessionStore>,
    event_sender: Arc<EventSender>,
}

/// View data for the address step.
#[derive(Debug, Serialize, ToSchema)]
pub struct AddressStepView {
    pub addresses: Vec<Address>,
    /// Preselected address per the default policy
    pub selected_address_id: Option<Uuid>,
    pub shipping_methods: Vec<ShippingOption>,
    /// Previously chosen method, for back-navigation from a later step
    pub selected_shipping_method_id: Option<String>,
}

impl AddressStepService {
    pub fn new(
        addresses: Arc<dyn AddressClient>,
        sessions: Arc<dyn SessionStore>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            addresses,
            sessions,
            event_sender,
        }
    }

    /// Assemble the address step view.
    #[instrument(skip(self))]
    pub async fn view(&self, buyer_id: Uuid) -> Result<AddressStepView, ServiceError> {
        let addresses = self.addresses.list_addresses(buyer_id).await?;
        let session = self.sessions.get(buyer_id).await?;

        Ok(AddressStepView {
            selected_address_id: Self::default_selection(&session, &addresses),
            selected_shipping_method_id: session.shipping_method.map(|m| m.method_id),
            addresses,
            shipping_methods: shipping::shipping_methods().to_vec(),
        })
    }

    /// Selection default policy: the session's existing address when it is
    /// still listed (supports back-navigation from a later step), else the
    /// buyer's designated default, else the first address returned.
    fn default_selection(session: &CheckoutSession, addresses: &[Address]) -> Option<Uuid> {
        session
            .address_id
            .filter(|id| addresses.iter().any(|a| a.address_id == *id))
            .or_else(|| {
                addresses
                    .iter()
                    .find(|a| a.is_default)
                    .map(|a| a.address_id)
            })
            .or_else(|| addresses.first().map(|a| a.address_id))
    }

    /// Create a new saved address via the address backend.
    #[instrument(skip(self, fields))]
    pub async fn create_address(
        &self,
        buyer_id: Uuid,
        fields: NewAddress,
    ) -> Result<Address, ServiceError> {
        let address = self.addresses.create_address(buyer_id, fields).await?;

        self.event_sender
            .send_or_log(Event::AddressCreated {
                buyer_id,
                address_id: address.address_id,
            })
            .await;

        info!(%buyer_id, address_id = %address.address_id, "created address");
        Ok(address)
    }

    /// Confirm the step: validate both selections, then write them into the
    /// session. The shipping method is snapshotted with its name and cost;
    /// it is not re-fetched later in the flow.
    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        buyer_id: Uuid,
        address_id: Uuid,
        shipping_method_id: &str,
    ) -> Result<(), ServiceError> {
        let addresses = self.addresses.list_addresses(buyer_id).await?;
        if !addresses.iter().any(|a| a.address_id == address_id) {
            return Err(ServiceError::NotFound(format!(
                "Address {} not found",
                address_id
            )));
        }

        let method = shipping::find_shipping_method(shipping_method_id).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Shipping method {} not found",
                shipping_method_id
            ))
        })?;

        self.sessions.set_address(buyer_id, address_id).await?;
        self.sessions
            .set_shipping_method(buyer_id, method)
            .await?;

        self.event_sender
            .send_or_log(Event::AddressSelected {
                buyer_id,
                address_id,
                shipping_method_id: shipping_method_id.to_string(),
            })
            .await;

        Ok(())
    }
}
