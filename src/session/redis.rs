use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use uuid::Uuid;

use super::{SessionStore, SessionStoreError};
use crate::config::SessionStoreConfig;
use crate::models::{CheckoutSession, SavedCard, ShippingSelection};

/// Redis-backed session store. Sessions survive process restarts and are
/// shared across instances; abandoned sessions expire via key TTL.
#[derive(Clone)]
pub struct RedisSessionStore {
    manager: ConnectionManager,
    namespace: String,
    ttl_secs: usize,
}

impl RedisSessionStore {
    pub async fn connect(cfg: &SessionStoreConfig) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(cfg.redis_url.as_str())?;
        let manager = client.get_tokio_connection_manager().await?;
        Ok(Self {
            manager,
            namespace: cfg.namespace.clone(),
            ttl_secs: cfg.ttl_secs as usize,
        })
    }

    fn key(&self, buyer_id: Uuid) -> String {
        format!("{}:session:{}", self.namespace, buyer_id)
    }

    async fn load(&self, buyer_id: Uuid) -> Result<CheckoutSession, SessionStoreError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(self.key(buyer_id)).await?;
        match raw {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(CheckoutSession::default()),
        }
    }

    async fn save(
        &self,
        buyer_id: Uuid,
        session: &CheckoutSession,
    ) -> Result<(), SessionStoreError> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(session)?;
        let _: () = conn.set_ex(self.key(buyer_id), payload, self.ttl_secs).await?;
        Ok(())
    }

    /// Load-mutate-save. Single-writer-per-buyer under normal navigation
    /// order, so no CAS loop is needed here.
    async fn update<F>(&self, buyer_id: Uuid, mutate: F) -> Result<(), SessionStoreError>
    where
        F: FnOnce(&mut CheckoutSession),
    {
        let mut session = self.load(buyer_id).await?;
        mutate(&mut session);
        self.save(buyer_id, &session).await
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, buyer_id: Uuid) -> Result<CheckoutSession, SessionStoreError> {
        self.load(buyer_id).await
    }

    async fn set_address(
        &self,
        buyer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| s.address_id = Some(address_id))
            .await
    }

    async fn set_shipping_method(
        &self,
        buyer_id: Uuid,
        method: ShippingSelection,
    ) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| s.shipping_method = Some(method))
            .await
    }

    async fn set_payment_method(
        &self,
        buyer_id: Uuid,
        payment_method_id: String,
    ) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| s.payment_method_id = Some(payment_method_id))
            .await
    }

    async fn set_saved_card(
        &self,
        buyer_id: Uuid,
        card: SavedCard,
    ) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| s.saved_card = Some(card)).await
    }

    async fn clear_saved_card(&self, buyer_id: Uuid) -> Result<(), SessionStoreError> {
        self.update(buyer_id, |s| {
            s.saved_card = None;
            s.payment_method_id = None;
        })
        .await
    }

    async fn clear(&self, buyer_id: Uuid) -> Result<(), SessionStoreError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.del(self.key(buyer_id)).await?;
        Ok(())
    }
}
