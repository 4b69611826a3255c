use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{SessionStore, SessionStoreError};
use crate::models::{CheckoutSession, SavedCard, ShippingSelection};

#[derive(Debug, Clone)]
struct SessionEntry {
    session: CheckoutSession,
    expires_at: Instant,
}

impl SessionEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// In-memory session store. The default backend for development and tests;
/// sessions do not survive a process restart.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    store: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    fn read(&self, buyer_id: Uuid) -> CheckoutSession {
        let store = self.store.read().unwrap();
        match store.get(&buyer_id) {
            Some(entry) if !entry.is_expired() => entry.session.clone(),
            _ => CheckoutSession::default(),
        }
    }

    /// Read-modify-write under the lock; every write refreshes the TTL.
    fn update<F>(&self, buyer_id: Uuid, mutate: F)
    where
        F: FnOnce(&mut CheckoutSession),
    {
        let mut store = self.store.write().unwrap();
        let mut session = match store.get(&buyer_id) {
            Some(entry) if !entry.is_expired() => entry.session.clone(),
            _ => CheckoutSession::default(),
        };
        mutate(&mut session);
        store.insert(
            buyer_id,
            SessionEntry {
                session,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, buyer_id: Uuid) -> Result<CheckoutSession, SessionStoreError> {
        Ok(self.read(buyer_id))
    }

    async fn set_address(
        &self,
        buyer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| s.address_id = Some(address_id));
        Ok(())
    }

    async fn set_shipping_method(
        &self,
        buyer_id: Uuid,
        method: ShippingSelection,
    ) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| s.shipping_method = Some(method));
        Ok(())
    }

    async fn set_payment_method(
        &self,
        buyer_id: Uuid,
        payment_method_id: String,
    ) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| s.payment_method_id = Some(payment_method_id));
        Ok(())
    }

    async fn set_saved_card(
        &self,
        buyer_id: Uuid,
        card: SavedCard,
    ) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| s.saved_card = Some(card));
        Ok(())
    }

    async fn clear_saved_card(&self, buyer_id: Uuid) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| {
            s.saved_card = None;
            s.payment_method_id = None;
        });
        Ok(())
    }

    async fn clear(&self, buyer_id: Uuid) -> Result<(), SessionStoreError> {
        let mut store = self.store.write().unwrap();
        store.remove(&buyer_id);
        Ok(())
    }
}
