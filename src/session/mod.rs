//! Checkout session store.
//!
//! Holds the buyer's in-progress checkout selections across page
//! navigations. The store is a dumb container: no validation happens here
//! (steps own their business rules) and no network calls originate here
//! beyond the store's own persistence. Backends share one trait so tests
//! can instantiate isolated in-memory stores per case.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SessionStoreConfig;
use crate::models::{CheckoutSession, SavedCard, ShippingSelection};

pub mod memory;
pub mod redis;

pub use self::memory::MemorySessionStore;
pub use self::redis::RedisSessionStore;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("Store operation failed: {0}")]
    OperationFailed(String),
}

impl From<SessionStoreError> for crate::errors::ServiceError {
    fn from(err: SessionStoreError) -> Self {
        crate::errors::ServiceError::SessionStoreError(err.to_string())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session for the buyer; an empty session if none exists yet.
    async fn get(&self, buyer_id: Uuid) -> Result<CheckoutSession, SessionStoreError>;

    async fn set_address(
        &self,
        buyer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), SessionStoreError>;

    async fn set_shipping_method(
        &self,
        buyer_id: Uuid,
        method: ShippingSelection,
    ) -> Result<(), SessionStoreError>;

    async fn set_payment_method(
        &self,
        buyer_id: Uuid,
        payment_method_id: String,
    ) -> Result<(), SessionStoreError>;

    async fn set_saved_card(
        &self,
        buyer_id: Uuid,
        card: SavedCard,
    ) -> Result<(), SessionStoreError>;

    /// Drops the cached card AND the payment selection. A selected method id
    /// without its cached card is treated as absent by the confirmation
    /// gate, so the two always clear together.
    async fn clear_saved_card(&self, buyer_id: Uuid) -> Result<(), SessionStoreError>;

    /// Resets the whole session. Called exactly once per successful order,
    /// and on explicit abandonment; never on submission failure.
    async fn clear(&self, buyer_id: Uuid) -> Result<(), SessionStoreError>;
}

/// Build the configured session store backend.
pub async fn build_session_store(
    cfg: &SessionStoreConfig,
) -> Result<Arc<dyn SessionStore>, SessionStoreError> {
    match cfg.backend.as_str() {
        "redis" => {
            let store = RedisSessionStore::connect(cfg).await?;
            Ok(Arc::new(store))
        }
        _ => Ok(Arc::new(MemorySessionStore::new(std::time::Duration::from_secs(
            cfg.ttl_secs,
        )))),
    }
}
