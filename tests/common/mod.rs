//! Shared test harness: an app wired to programmable fake collaborators
//! and an isolated in-memory session store per test.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use wastetreasure_api::{
    app,
    clients::{
        AddressClient, CartClient, IdentityClient, OrderClient, PaymentGateway, SubmitOutcome,
    },
    config::{AppConfig, CheckoutConfig, CollaboratorConfig, SessionStoreConfig},
    errors::ServiceError,
    events::EventSender,
    handlers::AppServices,
    models::{Address, Buyer, CardDetails, CheckoutRequest, NewAddress, PaymentMethod},
    session::MemorySessionStore,
    AppState,
};

pub const TEST_TOKEN: &str = "buyer-token";

pub struct FakeIdentityClient {
    pub buyer: Buyer,
}

#[async_trait]
impl IdentityClient for FakeIdentityClient {
    async fn current_user(&self, token: &str) -> Result<Buyer, ServiceError> {
        if token == TEST_TOKEN {
            Ok(self.buyer.clone())
        } else {
            Err(ServiceError::Unauthorized("unknown token".into()))
        }
    }
}

#[derive(Default)]
pub struct FakeAddressClient {
    pub addresses: Mutex<Vec<Address>>,
}

#[async_trait]
impl AddressClient for FakeAddressClient {
    async fn list_addresses(&self, _buyer_id: Uuid) -> Result<Vec<Address>, ServiceError> {
        Ok(self.addresses.lock().unwrap().clone())
    }

    async fn create_address(
        &self,
        _buyer_id: Uuid,
        fields: NewAddress,
    ) -> Result<Address, ServiceError> {
        let address = Address {
            address_id: Uuid::new_v4(),
            street: fields.street,
            city: fields.city,
            state: fields.state,
            postal_code: fields.postal_code,
            country: fields.country,
            is_default: fields.is_default,
            notes: fields.notes,
        };
        self.addresses.lock().unwrap().push(address.clone());
        Ok(address)
    }
}

/// Gateway fake: an in-memory method list plus a counter so registered
/// methods get distinct ids.
#[derive(Default)]
pub struct FakeGateway {
    pub methods: Mutex<Vec<PaymentMethod>>,
    pub registered: AtomicUsize,
    pub fail_register: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn list_saved_methods(
        &self,
        _buyer_id: Uuid,
    ) -> Result<Vec<PaymentMethod>, ServiceError> {
        Ok(self.methods.lock().unwrap().clone())
    }

    async fn register_method(
        &self,
        _buyer_id: Uuid,
        card: CardDetails,
    ) -> Result<PaymentMethod, ServiceError> {
        if self.fail_register.load(Ordering::SeqCst) > 0 {
            return Err(ServiceError::GatewayError("setup declined".into()));
        }
        let n = self.registered.fetch_add(1, Ordering::SeqCst);
        let method = PaymentMethod {
            id: format!("pm_new_{}", n),
            brand: "visa".into(),
            last4: card.last4(),
        };
        self.methods.lock().unwrap().push(method.clone());
        Ok(method)
    }

    async fn delete_method(&self, _buyer_id: Uuid, method_id: &str) -> Result<(), ServiceError> {
        self.methods.lock().unwrap().retain(|m| m.id != method_id);
        Ok(())
    }
}

/// Order fake: scripted outcomes consumed in order, with every submitted
/// request recorded for assertions.
#[derive(Default)]
pub struct FakeOrderClient {
    pub outcomes: Mutex<VecDeque<SubmitOutcome>>,
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

impl FakeOrderClient {
    pub fn push_outcome(&self, outcome: SubmitOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }
}

#[async_trait]
impl OrderClient for FakeOrderClient {
    async fn submit_checkout(
        &self,
        _buyer_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<SubmitOutcome, ServiceError> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SubmitOutcome::Declined(
                wastetreasure_api::models::CheckoutDecline::Generic { message: None },
            )))
    }
}

#[derive(Default)]
pub struct FakeCartClient {
    pub clears: AtomicUsize,
}

#[async_trait]
impl CartClient for FakeCartClient {
    async fn clear(&self, _buyer_id: Uuid) -> Result<(), ServiceError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "error".into(),
        log_json: false,
        request_timeout_secs: 5,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        session: SessionStoreConfig::default(),
        collaborators: CollaboratorConfig::default(),
        checkout: CheckoutConfig {
            gateway_latency_floor_ms: 0,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub buyer: Buyer,
    pub sessions: Arc<MemorySessionStore>,
    pub addresses: Arc<FakeAddressClient>,
    pub gateway: Arc<FakeGateway>,
    pub orders: Arc<FakeOrderClient>,
    pub cart: Arc<FakeCartClient>,
}

impl TestApp {
    pub fn new() -> Self {
        let buyer = Buyer {
            id: Uuid::new_v4(),
            email: "buyer@example.com".into(),
        };

        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(300)));
        let addresses = Arc::new(FakeAddressClient::default());
        let gateway = Arc::new(FakeGateway::default());
        let orders = Arc::new(FakeOrderClient::default());
        let cart = Arc::new(FakeCartClient::default());

        let (event_tx, _event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);

        let config = test_config();
        let services = AppServices::new(
            &config,
            Arc::new(FakeIdentityClient {
                buyer: buyer.clone(),
            }),
            addresses.clone(),
            gateway.clone(),
            orders.clone(),
            cart.clone(),
            sessions.clone(),
            Arc::new(event_sender.clone()),
        );

        let state = Arc::new(AppState {
            config,
            event_sender,
            services,
            session_store: sessions.clone(),
        });

        Self {
            router: app(state.clone()),
            state,
            buyer,
            sessions,
            addresses,
            gateway,
            orders,
            cart,
        }
    }

    pub fn seed_address(&self, is_default: bool) -> Address {
        let address = Address {
            address_id: Uuid::new_v4(),
            street: "12 Reclaim Way".into(),
            city: "Portland".into(),
            state: "OR".into(),
            postal_code: "97201".into(),
            country: "US".into(),
            is_default,
            notes: None,
        };
        self.addresses
            .addresses
            .lock()
            .unwrap()
            .push(address.clone());
        address
    }

    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TEST_TOKEN));

        let request = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                builder.body(Body::from(json.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn request_anonymous(&self, method: Method, uri: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
