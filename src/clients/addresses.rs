use async_trait::async_trait;
use reqwest::StatusCode;
use uuid::Uuid;

use super::provider_error_message;
use crate::errors::ServiceError;
use crate::models::{Address, NewAddress};

/// Saved-address collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressClient: Send + Sync {
    async fn list_addresses(&self, buyer_id: Uuid) -> Result<Vec<Address>, ServiceError>;

    async fn create_address(
        &self,
        buyer_id: Uuid,
        fields: NewAddress,
    ) -> Result<Address, ServiceError>;
}

#[derive(Clone)]
pub struct HttpAddressClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAddressClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn addresses_url(&self, buyer_id: Uuid) -> String {
        format!("{}/v1/buyers/{}/addresses", self.base_url, buyer_id)
    }
}

#[async_trait]
impl AddressClient for HttpAddressClient {
    async fn list_addresses(&self, buyer_id: Uuid) -> Result<Vec<Address>, ServiceError> {
        let response = self.http.get(self.addresses_url(buyer_id)).send().await?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = provider_error_message(&body)
                .unwrap_or_else(|| format!("address backend returned {}", status));
            return Err(ServiceError::ExternalServiceError(message));
        }

        Ok(response.json::<Vec<Address>>().await?)
    }

    async fn create_address(
        &self,
        buyer_id: Uuid,
        fields: NewAddress,
    ) -> Result<Address, ServiceError> {
        let response = self
            .http
            .post(self.addresses_url(buyer_id))
            .json(&fields)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response.json::<Address>().await?),
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                let message = provider_error_message(&body)
                    .unwrap_or_else(|| "address rejected by backend".to_string());
                Err(ServiceError::ValidationError(message))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let message = provider_error_message(&body)
                    .unwrap_or_else(|| format!("address backend returned {}", status));
                Err(ServiceError::ExternalServiceError(message))
            }
        }
    }
}
