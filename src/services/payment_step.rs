use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    clients::PaymentGateway,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{CardDetails, PaymentMethod, SavedCard},
    session::SessionStore,
};

/// Payment step: keeps the session's payment selection consistent with the
/// gateway's actual list of saved methods, and handles add/delete.
///
/// The gateway list is the system of record; the session's `saved_card` is
/// a display cache that is reconciled against that list on every entry to
/// the step.
#[derive(Clone)]
pub struct PaymentStepService {
    gateway: Arc<dyn PaymentGateway>,
    sessions: Arc<dyn SessionStore>,
    event_sender: Arc<EventSender>,
    /// Perceived-responsiveness floor for add/delete operations
    latency_floor: Duration,
}

/// View data for the payment step. Only produced after reconciliation has
/// completed and been applied, so the selection can never race a
/// buyer-initiated add or delete.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStepView {
    pub methods: Vec<PaymentMethod>,
    pub selected_method_id: Option<String>,
    /// True when there is nothing to select and the add-method form must be
    /// surfaced immediately
    pub show_add_form: bool,
}

/// Outcome of registering a payment method. The acknowledgment is returned
/// to the caller rather than auto-advancing the flow; the buyer dismisses
/// it explicitly.
#[derive(Debug, Serialize, ToSchema)]
pub struct AddMethodOutcome {
    pub method: SavedCard,
    /// True when the submitted card matched the cached one by last4+brand
    /// and the existing method was re-selected instead
    pub deduplicated: bool,
    pub methods: Vec<PaymentMethod>,
}

fn to_saved_card(method: &PaymentMethod) -> SavedCard {
    SavedCard {
        id: method.id.clone(),
        last4: method.last4.clone(),
        brand: method.brand.clone(),
    }
}

impl PaymentStepService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        sessions: Arc<dyn SessionStore>,
        event_sender: Arc<EventSender>,
        latency_floor: Duration,
    ) -> Self {
        Self {
            gateway,
            sessions,
            event_sender,
            latency_floor,
        }
    }

    /// Pad an operation to the configured minimum visible duration. Purely
    /// for perceived responsiveness; correctness never depends on it.
    async fn with_latency_floor<T>(
        &self,
        op: impl std::future::Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        let started = Instant::now();
        let result = op.await;
        let elapsed = started.elapsed();
        if elapsed < self.latency_floor {
            tokio::time::sleep(self.latency_floor - elapsed).await;
        }
        result
    }

    /// Reconcile the session's payment selection against the gateway list.
    ///
    /// - cached card still listed: keep it selected
    /// - cached card no longer listed (invalidated or deleted gateway-side):
    ///   fall back to the first listed method, re-cache, select
    /// - no cached card and a non-empty list: select and cache the first
    /// - empty list: nothing is selectable; the cache is dropped and the
    ///   add-method form is surfaced
    #[instrument(skip(self))]
    pub async fn reconcile(&self, buyer_id: Uuid) -> Result<PaymentStepView, ServiceError> {
        let methods = self.gateway.list_saved_methods(buyer_id).await?;
        let session = self.sessions.get(buyer_id).await?;

        if methods.is_empty() {
            if session.saved_card.is_some() {
                self.sessions.clear_saved_card(buyer_id).await?;
            }
            return Ok(PaymentStepView {
                methods,
                selected_method_id: None,
                show_add_form: true,
            });
        }

        let selected = match session.saved_card {
            Some(card) if methods.iter().any(|m| m.id == card.id) => {
                self.sessions
                    .set_payment_method(buyer_id, card.id.clone())
                    .await?;
                card
            }
            _ => {
                let fallback = to_saved_card(&methods[0]);
                self.sessions
                    .set_saved_card(buyer_id, fallback.clone())
                    .await?;
                self.sessions
                    .set_payment_method(buyer_id, fallback.id.clone())
                    .await?;
                fallback
            }
        };

        Ok(PaymentStepView {
            methods,
            selected_method_id: Some(selected.id),
            show_add_form: false,
        })
    }

    /// Select one of the saved methods.
    #[instrument(skip(self))]
    pub async fn select_method(
        &self,
        buyer_id: Uuid,
        method_id: &str,
    ) -> Result<PaymentStepView, ServiceError> {
        let methods = self.gateway.list_saved_methods(buyer_id).await?;
        let method = methods
            .iter()
            .find(|m| m.id == method_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment method {} not found", method_id))
            })?;

        let card = to_saved_card(method);
        self.sessions.set_saved_card(buyer_id, card).await?;
        self.sessions
            .set_payment_method(buyer_id, method.id.clone())
            .await?;

        self.event_sender
            .send_or_log(Event::PaymentMethodSelected {
                buyer_id,
                payment_method_id: method.id.clone(),
            })
            .await;

        Ok(PaymentStepView {
            selected_method_id: Some(method_id.to_string()),
            methods,
            show_add_form: false,
        })
    }

    /// Register a new payment method with the gateway.
    ///
    /// Registration is setup-intent style so the method is attached to the
    /// buyer without being charged; the raw token never reaches the order
    /// submission call. If the registered method matches the cached card by
    /// last4+brand, the existing selection is kept instead of creating a
    /// second session entry.
    #[instrument(skip(self, card))]
    pub async fn add_method(
        &self,
        buyer_id: Uuid,
        card: CardDetails,
    ) -> Result<AddMethodOutcome, ServiceError> {
        self.with_latency_floor(self.add_method_inner(buyer_id, card))
            .await
    }

    async fn add_method_inner(
        &self,
        buyer_id: Uuid,
        card: CardDetails,
    ) -> Result<AddMethodOutcome, ServiceError> {
        let session = self.sessions.get(buyer_id).await?;
        let registered = self.gateway.register_method(buyer_id, card).await?;

        if let Some(existing) = session
            .saved_card
            .filter(|c| c.matches(&registered.last4, &registered.brand))
        {
            // Same card re-entered: re-select the existing method
            self.sessions
                .set_payment_method(buyer_id, existing.id.clone())
                .await?;

            let methods = self.gateway.list_saved_methods(buyer_id).await?;
            info!(%buyer_id, method_id = %existing.id, "re-selected existing payment method");
            return Ok(AddMethodOutcome {
                method: existing,
                deduplicated: true,
                methods,
            });
        }

        let saved = to_saved_card(&registered);
        self.sessions
            .set_saved_card(buyer_id, saved.clone())
            .await?;
        self.sessions
            .set_payment_method(buyer_id, saved.id.clone())
            .await?;

        let methods = self.gateway.list_saved_methods(buyer_id).await?;

        self.event_sender
            .send_or_log(Event::PaymentMethodRegistered {
                buyer_id,
                payment_method_id: saved.id.clone(),
            })
            .await;

        info!(%buyer_id, method_id = %saved.id, "registered payment method");
        Ok(AddMethodOutcome {
            method: saved,
            deduplicated: false,
            methods,
        })
    }

    /// Delete a saved method from the gateway.
    ///
    /// If the deleted method was the selected one, falls back to the first
    /// remaining method, or clears the selection and surfaces the
    /// add-method form when none remain.
    #[instrument(skip(self))]
    pub async fn delete_method(
        &self,
        buyer_id: Uuid,
        method_id: &str,
    ) -> Result<PaymentStepView, ServiceError> {
        self.with_latency_floor(self.delete_method_inner(buyer_id, method_id))
            .await
    }

    async fn delete_method_inner(
        &self,
        buyer_id: Uuid,
        method_id: &str,
    ) -> Result<PaymentStepView, ServiceError> {
        self.gateway.delete_method(buyer_id, method_id).await?;

        let methods = self.gateway.list_saved_methods(buyer_id).await?;
        let session = self.sessions.get(buyer_id).await?;

        let selected = if session.payment_method_id.as_deref() == Some(method_id) {
            match methods.first() {
                Some(first) => {
                    let fallback = to_saved_card(first);
                    self.sessions
                        .set_saved_card(buyer_id, fallback.clone())
                        .await?;
                    self.sessions
                        .set_payment_method(buyer_id, fallback.id.clone())
                        .await?;
                    Some(fallback.id)
                }
                None => {
                    self.sessions.clear_saved_card(buyer_id).await?;
                    None
                }
            }
        } else {
            session.payment_method_id
        };

        self.event_sender
            .send_or_log(Event::PaymentMethodDeleted {
                buyer_id,
                payment_method_id: method_id.to_string(),
            })
            .await;

        let show_add_form = methods.is_empty();
        Ok(PaymentStepView {
            methods,
            selected_method_id: selected,
            show_add_form,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::gateway::MockPaymentGateway;
    use crate::session::MemorySessionStore;
    use tokio::sync::mpsc;

    fn method(id: &str, last4: &str, brand: &str) -> PaymentMethod {
        PaymentMethod {
            id: id.into(),
            brand: brand.into(),
            last4: last4.into(),
        }
    }

    fn card_details(number: &str) -> CardDetails {
        CardDetails {
            cardholder_name: "A Buyer".into(),
            number: number.into(),
            exp_month: 12,
            exp_year: 2030,
            cvc: "123".into(),
        }
    }

    fn service(
        gateway: MockPaymentGateway,
    ) -> (PaymentStepService, Arc<MemorySessionStore>) {
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(60)));
        let (tx, _rx) = mpsc::channel(16);
        let svc = PaymentStepService::new(
            Arc::new(gateway),
            sessions.clone(),
            Arc::new(EventSender::new(tx)),
            Duration::ZERO,
        );
        (svc, sessions)
    }

    #[tokio::test]
    async fn reconcile_keeps_cached_card_when_still_listed() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_list_saved_methods()
            .returning(|_| Ok(vec![method("pm_1", "4242", "visa"), method("pm_2", "1881", "visa")]));

        let (svc, sessions) = service(gateway);
        sessions
            .set_saved_card(
                buyer,
                SavedCard {
                    id: "pm_2".into(),
                    last4: "1881".into(),
                    brand: "visa".into(),
                },
            )
            .await
            .unwrap();

        let view = svc.reconcile(buyer).await.unwrap();
        assert_eq!(view.selected_method_id.as_deref(), Some("pm_2"));
        assert!(!view.show_add_form);

        let session = sessions.get(buyer).await.unwrap();
        assert_eq!(session.payment_method_id.as_deref(), Some("pm_2"));
        assert_eq!(session.saved_card.unwrap().id, "pm_2");
    }

    #[tokio::test]
    async fn reconcile_falls_back_when_cached_card_vanished() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_list_saved_methods()
            .returning(|_| Ok(vec![method("pm_9", "0005", "amex")]));

        let (svc, sessions) = service(gateway);
        sessions
            .set_saved_card(
                buyer,
                SavedCard {
                    id: "pm_gone".into(),
                    last4: "4242".into(),
                    brand: "visa".into(),
                },
            )
            .await
            .unwrap();

        let view = svc.reconcile(buyer).await.unwrap();
        assert_eq!(view.selected_method_id.as_deref(), Some("pm_9"));

        let session = sessions.get(buyer).await.unwrap();
        let card = session.saved_card.unwrap();
        assert_eq!(card.id, "pm_9");
        assert_eq!(card.last4, "0005");
        assert_eq!(session.payment_method_id.as_deref(), Some("pm_9"));
    }

    #[tokio::test]
    async fn reconcile_selects_first_when_nothing_cached() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_list_saved_methods()
            .returning(|_| Ok(vec![method("pm_a", "1111", "visa"), method("pm_b", "2222", "visa")]));

        let (svc, sessions) = service(gateway);
        let view = svc.reconcile(buyer).await.unwrap();
        assert_eq!(view.selected_method_id.as_deref(), Some("pm_a"));
        assert_eq!(
            sessions.get(buyer).await.unwrap().saved_card.unwrap().id,
            "pm_a"
        );
    }

    #[tokio::test]
    async fn reconcile_with_empty_list_surfaces_add_form() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_list_saved_methods().returning(|_| Ok(vec![]));

        let (svc, sessions) = service(gateway);
        sessions
            .set_saved_card(
                buyer,
                SavedCard {
                    id: "pm_stale".into(),
                    last4: "4242".into(),
                    brand: "visa".into(),
                },
            )
            .await
            .unwrap();
        sessions
            .set_payment_method(buyer, "pm_stale".into())
            .await
            .unwrap();

        let view = svc.reconcile(buyer).await.unwrap();
        assert!(view.show_add_form);
        assert!(view.selected_method_id.is_none());
        assert!(view.methods.is_empty());

        // Stale cache does not survive an empty gateway list
        let session = sessions.get(buyer).await.unwrap();
        assert!(session.saved_card.is_none());
        assert!(session.payment_method_id.is_none());
    }

    #[tokio::test]
    async fn add_method_short_circuits_on_matching_last4_and_brand() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_register_method()
            .returning(|_, _| Ok(method("pm_new", "4242", "visa")));
        gateway
            .expect_list_saved_methods()
            .returning(|_| Ok(vec![method("pm_1", "4242", "visa")]));

        let (svc, sessions) = service(gateway);
        sessions
            .set_saved_card(
                buyer,
                SavedCard {
                    id: "pm_1".into(),
                    last4: "4242".into(),
                    brand: "visa".into(),
                },
            )
            .await
            .unwrap();

        let outcome = svc.add_method(buyer, card_details("4242424242424242")).await.unwrap();
        assert!(outcome.deduplicated);
        assert_eq!(outcome.method.id, "pm_1");

        // Session still points at the original method, not the re-entry
        let session = sessions.get(buyer).await.unwrap();
        assert_eq!(session.payment_method_id.as_deref(), Some("pm_1"));
        assert_eq!(session.saved_card.unwrap().id, "pm_1");
    }

    #[tokio::test]
    async fn add_method_registers_and_selects_new_card() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_register_method()
            .returning(|_, _| Ok(method("pm_new", "1881", "mastercard")));
        gateway.expect_list_saved_methods().returning(|_| {
            Ok(vec![
                method("pm_1", "4242", "visa"),
                method("pm_new", "1881", "mastercard"),
            ])
        });

        let (svc, sessions) = service(gateway);
        sessions
            .set_saved_card(
                buyer,
                SavedCard {
                    id: "pm_1".into(),
                    last4: "4242".into(),
                    brand: "visa".into(),
                },
            )
            .await
            .unwrap();

        let outcome = svc.add_method(buyer, card_details("5555555555551881")).await.unwrap();
        assert!(!outcome.deduplicated);
        assert_eq!(outcome.method.id, "pm_new");
        assert_eq!(outcome.methods.len(), 2);

        let session = sessions.get(buyer).await.unwrap();
        assert_eq!(session.payment_method_id.as_deref(), Some("pm_new"));
        assert_eq!(session.saved_card.unwrap().last4, "1881");
    }

    #[tokio::test]
    async fn add_method_failure_leaves_session_unchanged() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_register_method()
            .returning(|_, _| Err(ServiceError::GatewayError("setup failed".into())));

        let (svc, sessions) = service(gateway);
        sessions
            .set_saved_card(
                buyer,
                SavedCard {
                    id: "pm_1".into(),
                    last4: "4242".into(),
                    brand: "visa".into(),
                },
            )
            .await
            .unwrap();
        let before = sessions.get(buyer).await.unwrap();

        let err = svc.add_method(buyer, card_details("4000000000000002")).await;
        assert!(matches!(err, Err(ServiceError::GatewayError(_))));
        assert_eq!(sessions.get(buyer).await.unwrap(), before);
    }

    #[tokio::test]
    async fn delete_selected_method_falls_back_to_first_remaining() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_delete_method().returning(|_, _| Ok(()));
        gateway
            .expect_list_saved_methods()
            .returning(|_| Ok(vec![method("pm_2", "1881", "visa")]));

        let (svc, sessions) = service(gateway);
        sessions
            .set_saved_card(
                buyer,
                SavedCard {
                    id: "pm_1".into(),
                    last4: "4242".into(),
                    brand: "visa".into(),
                },
            )
            .await
            .unwrap();
        sessions
            .set_payment_method(buyer, "pm_1".into())
            .await
            .unwrap();

        let view = svc.delete_method(buyer, "pm_1").await.unwrap();
        assert_eq!(view.selected_method_id.as_deref(), Some("pm_2"));
        assert!(!view.show_add_form);

        let session = sessions.get(buyer).await.unwrap();
        assert_eq!(session.saved_card.unwrap().id, "pm_2");
    }

    #[tokio::test]
    async fn delete_last_method_clears_selection_and_shows_add_form() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_delete_method().returning(|_, _| Ok(()));
        gateway.expect_list_saved_methods().returning(|_| Ok(vec![]));

        let (svc, sessions) = service(gateway);
        sessions
            .set_saved_card(
                buyer,
                SavedCard {
                    id: "pm_1".into(),
                    last4: "4242".into(),
                    brand: "visa".into(),
                },
            )
            .await
            .unwrap();
        sessions
            .set_payment_method(buyer, "pm_1".into())
            .await
            .unwrap();

        let view = svc.delete_method(buyer, "pm_1").await.unwrap();
        assert!(view.show_add_form);
        assert!(view.selected_method_id.is_none());

        let session = sessions.get(buyer).await.unwrap();
        assert!(session.saved_card.is_none());
        assert!(session.payment_method_id.is_none());
    }

    #[tokio::test]
    async fn delete_unselected_method_keeps_current_selection() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_delete_method().returning(|_, _| Ok(()));
        gateway
            .expect_list_saved_methods()
            .returning(|_| Ok(vec![method("pm_1", "4242", "visa")]));

        let (svc, sessions) = service(gateway);
        sessions
            .set_saved_card(
                buyer,
                SavedCard {
                    id: "pm_1".into(),
                    last4: "4242".into(),
                    brand: "visa".into(),
                },
            )
            .await
            .unwrap();
        sessions
            .set_payment_method(buyer, "pm_1".into())
            .await
            .unwrap();

        let view = svc.delete_method(buyer, "pm_2").await.unwrap();
        assert_eq!(view.selected_method_id.as_deref(), Some("pm_1"));
    }

    #[tokio::test]
    async fn delete_failure_leaves_session_unchanged() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_delete_method()
            .returning(|_, _| Err(ServiceError::GatewayError("cannot delete".into())));

        let (svc, sessions) = service(gateway);
        sessions
            .set_payment_method(buyer, "pm_1".into())
            .await
            .unwrap();
        let before = sessions.get(buyer).await.unwrap();

        let err = svc.delete_method(buyer, "pm_1").await;
        assert!(matches!(err, Err(ServiceError::GatewayError(_))));
        assert_eq!(sessions.get(buyer).await.unwrap(), before);
    }

    #[tokio::test]
    async fn operations_respect_the_latency_floor() {
        let buyer = Uuid::new_v4();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_delete_method().returning(|_, _| Ok(()));
        gateway.expect_list_saved_methods().returning(|_| Ok(vec![]));

        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(60)));
        let (tx, _rx) = mpsc::channel(16);
        let svc = PaymentStepService::new(
            Arc::new(gateway),
            sessions,
            Arc::new(EventSender::new(tx)),
            Duration::from_millis(50),
        );

        let started = std::time::Instant::now();
        svc.delete_method(buyer, "pm_1").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
