use async_trait::async_trait;
use reqwest::StatusCode;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Cart collaborator. The single operation this flow needs: emptying the
/// buyer's cart once an order has been created from it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartClient: Send + Sync {
    async fn clear(&self, buyer_id: Uuid) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct HttpCartClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCartClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CartClient for HttpCartClient {
    async fn clear(&self, buyer_id: Uuid) -> Result<(), ServiceError> {
        let response = self
            .http
            .delete(format!("{}/v1/buyers/{}/cart", self.base_url, buyer_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
            status => Err(ServiceError::ExternalServiceError(format!(
                "cart backend returned {}",
                status
            ))),
        }
    }
}
