use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use strum::Display;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    clients::{CartClient, OrderClient, SubmitOutcome},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{CheckoutDecline, CheckoutRequest, CheckoutSession, Order, SavedCard, ShippingSelection},
    session::SessionStore,
};

/// Per-buyer confirmation flow state.
///
/// Clearing the session and navigating away are not atomic; the
/// precondition gate reacts to session fields and would fire a spurious
/// redirect in the window between "session cleared" and "buyer landed on
/// the success view". The gate is therefore a no-op while a submission is
/// in flight or has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Where the buyer goes after a decline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    /// Payment selection was invalidated; go back one step
    Payment,
    /// Stay on the confirmation step (retry or adjust the cart elsewhere)
    Confirmation,
}

/// Read-only order summary rendered on the confirmation step.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmationSummary {
    pub address_id: Uuid,
    pub shipping_method: ShippingSelection,
    pub payment_method_id: String,
    pub saved_card: SavedCard,
}

/// Result of entering the confirmation step.
#[derive(Debug)]
pub enum ConfirmationEntry {
    /// Preconditions hold; render the summary
    Ready(ConfirmationSummary),
    /// A required field is missing; route silently back to the address step
    RedirectToAddress,
    /// Submission in flight or already succeeded; the redirect effect is
    /// suppressed
    Suppressed(ConfirmationState),
}

/// Result of a placement attempt.
#[derive(Debug)]
pub enum PlacementResult {
    Placed(Order),
    Declined {
        decline: CheckoutDecline,
        next_step: NextStep,
    },
    /// Session became incomplete between entry and submission
    RedirectToAddress,
}

/// Confirmation step: final gate before the irreversible external action.
/// Creating the order is assumed to initiate a real charge, so submission
/// is only ever triggered by an explicit, double-gated buyer confirmation.
#[derive(Clone)]
pub struct ConfirmationService {
    orders: Arc<dyn OrderClient>,
    cart: Arc<dyn CartClient>,
    sessions: Arc<dyn SessionStore>,
    event_sender: Arc<EventSender>,
    flow_states: Arc<DashMap<Uuid, ConfirmationState>>,
}

impl ConfirmationService {
    pub fn new(
        orders: Arc<dyn OrderClient>,
        cart: Arc<dyn CartClient>,
        sessions: Arc<dyn SessionStore>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            orders,
            cart,
            sessions,
            event_sender,
            flow_states: Arc::new(DashMap::new()),
        }
    }

    pub fn flow_state(&self, buyer_id: Uuid) -> ConfirmationState {
        self.flow_states
            .get(&buyer_id)
            .map(|s| *s)
            .unwrap_or(ConfirmationState::Idle)
    }

    /// Precondition check on entry.
    ///
    /// Missing fields redirect to the address step (silently, not as an
    /// error), which makes the step unreachable in an invalid state from
    /// direct navigation. A `Succeeded` state with a repopulated session
    /// means a new checkout has begun; the flow resets to `Idle`.
    #[instrument(skip(self))]
    pub async fn entry_check(&self, buyer_id: Uuid) -> Result<ConfirmationEntry, ServiceError> {
        match self.flow_state(buyer_id) {
            ConfirmationState::Submitting => {
                return Ok(ConfirmationEntry::Suppressed(ConfirmationState::Submitting));
            }
            ConfirmationState::Succeeded => {
                let session = self.sessions.get(buyer_id).await?;
                if session.is_complete() {
                    self.flow_states.insert(buyer_id, ConfirmationState::Idle);
                } else {
                    return Ok(ConfirmationEntry::Suppressed(ConfirmationState::Succeeded));
                }
            }
            _ => {}
        }

        let session = self.sessions.get(buyer_id).await?;
        match (
            session.address_id,
            session.shipping_method,
            session.payment_method_id,
            session.saved_card,
        ) {
            (Some(address_id), Some(shipping_method), Some(payment_method_id), Some(saved_card)) => {
                Ok(ConfirmationEntry::Ready(ConfirmationSummary {
                    address_id,
                    shipping_method,
                    payment_method_id,
                    saved_card,
                }))
            }
            _ => Ok(ConfirmationEntry::RedirectToAddress),
        }
    }

    /// Submit the order.
    ///
    /// Exactly one checkout request per confirmation: the Idle/Failed →
    /// Submitting transition is taken atomically, and a second submit while
    /// one is in flight is rejected. On success the session and cart are
    /// cleared exactly once; on any decline the session is either untouched
    /// or (burned method) reduced to its address half.
    #[instrument(skip(self))]
    pub async fn place_order(&self, buyer_id: Uuid) -> Result<PlacementResult, ServiceError> {
        let session = self.sessions.get(buyer_id).await?;

        {
            let mut state = self
                .flow_states
                .entry(buyer_id)
                .or_insert(ConfirmationState::Idle);
            match *state {
                ConfirmationState::Submitting => {
                    return Err(ServiceError::InvalidOperation(
                        "Order submission already in flight".to_string(),
                    ));
                }
                // A succeeded flow accepts a new submission only once a
                // fresh checkout has repopulated the session
                ConfirmationState::Succeeded if !session.is_complete() => {
                    return Err(ServiceError::InvalidOperation(
                        "Order already placed".to_string(),
                    ));
                }
                _ => {
                    *state = ConfirmationState::Submitting;
                }
            }
        }

        let result = self.submit(buyer_id, session).await;
        if result.is_err() {
            // Unexpected failure: retryable, session untouched
            self.flow_states.insert(buyer_id, ConfirmationState::Failed);
        }
        result
    }

    async fn submit(
        &self,
        buyer_id: Uuid,
        session: CheckoutSession,
    ) -> Result<PlacementResult, ServiceError> {
        let (address_id, shipping_method, payment_method_id) = match (
            session.address_id,
            session.shipping_method,
            session.payment_method_id,
            session.saved_card,
        ) {
            (Some(a), Some(s), Some(p), Some(_)) => (a, s, p),
            _ => {
                self.flow_states.insert(buyer_id, ConfirmationState::Idle);
                return Ok(PlacementResult::RedirectToAddress);
            }
        };

        let request = CheckoutRequest {
            payment_method_id,
            shipping_address_id: address_id,
            shipping_method_id: shipping_method.method_id,
        };

        match self.orders.submit_checkout(buyer_id, request).await? {
            SubmitOutcome::Placed(order) => {
                // Mark success before touching the session so the entry
                // gate stays quiet during the clear+navigate window
                self.flow_states
                    .insert(buyer_id, ConfirmationState::Succeeded);

                self.sessions.clear(buyer_id).await?;
                if let Err(err) = self.cart.clear(buyer_id).await {
                    // The order exists; an unswept cart is not worth
                    // failing the checkout over
                    warn!(%buyer_id, "cart clear failed after order placement: {}", err);
                }

                self.event_sender
                    .send_or_log(Event::OrderPlaced {
                        buyer_id,
                        order_id: order.order_id,
                    })
                    .await;
                self.event_sender
                    .send_or_log(Event::SessionCleared { buyer_id })
                    .await;

                info!(%buyer_id, order_id = %order.order_id, "order placed");
                Ok(PlacementResult::Placed(order))
            }
            SubmitOutcome::Declined(decline) => {
                self.flow_states.insert(buyer_id, ConfirmationState::Failed);

                let next_step = match &decline {
                    CheckoutDecline::PaymentMethodBurned { .. } => {
                        // Only the payment half of the session is dropped;
                        // address and shipping survive for the retry
                        self.sessions.clear_saved_card(buyer_id).await?;
                        NextStep::Payment
                    }
                    CheckoutDecline::AmountTooSmall { .. } | CheckoutDecline::Generic { .. } => {
                        NextStep::Confirmation
                    }
                };

                self.event_sender
                    .send_or_log(Event::CheckoutDeclined {
                        buyer_id,
                        reason: decline.reason().to_string(),
                    })
                    .await;

                Ok(PlacementResult::Declined { decline, next_step })
            }
        }
    }

    /// Abandon the checkout: drop the session and the flow state.
    #[instrument(skip(self))]
    pub async fn abandon(&self, buyer_id: Uuid) -> Result<(), ServiceError> {
        self.sessions.clear(buyer_id).await?;
        self.flow_states.remove(&buyer_id);
        self.event_sender
            .send_or_log(Event::SessionCleared { buyer_id })
            .await;
        Ok(())
    }
}
