use async_trait::async_trait;
use reqwest::StatusCode;

use crate::errors::ServiceError;
use crate::models::Buyer;

/// Identity/session collaborator. Resolves a bearer token into the buyer
/// it belongs to; the authentication protocol itself lives entirely in the
/// external provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn current_user(&self, token: &str) -> Result<Buyer, ServiceError>;
}

#[derive(Clone)]
pub struct HttpIdentityClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn current_user(&self, token: &str) -> Result<Buyer, ServiceError> {
        let response = self
            .http
            .get(format!("{}/v1/me", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<Buyer>().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ServiceError::Unauthorized(
                "session token rejected by identity provider".to_string(),
            )),
            status => Err(ServiceError::ExternalServiceError(format!(
                "identity provider returned {}",
                status
            ))),
        }
    }
}
