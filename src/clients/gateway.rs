use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use super::provider_error_message;
use crate::errors::ServiceError;
use crate::models::{CardDetails, PaymentMethod};

/// Payment gateway collaborator: the system of record for a buyer's
/// tokenized payment methods.
///
/// Registration is setup-intent style: the gateway attaches the method to
/// the buyer's account without charging it. Passing a raw card token
/// straight into order submission is what burns single-use tokens, which
/// is why registration is a separate call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn list_saved_methods(&self, buyer_id: Uuid)
        -> Result<Vec<PaymentMethod>, ServiceError>;

    async fn register_method(
        &self,
        buyer_id: Uuid,
        card: CardDetails,
    ) -> Result<PaymentMethod, ServiceError>;

    async fn delete_method(&self, buyer_id: Uuid, method_id: &str) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SetupRegistration<'a> {
    buyer_id: Uuid,
    usage: &'static str,
    card: &'a CardDetails,
}

impl HttpPaymentGateway {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn methods_url(&self, buyer_id: Uuid) -> String {
        format!("{}/v1/buyers/{}/payment-methods", self.base_url, buyer_id)
    }

    async fn gateway_error(response: reqwest::Response) -> ServiceError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = provider_error_message(&body)
            .unwrap_or_else(|| format!("payment gateway returned {}", status));
        ServiceError::GatewayError(message)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn list_saved_methods(
        &self,
        buyer_id: Uuid,
    ) -> Result<Vec<PaymentMethod>, ServiceError> {
        let response = self.http.get(self.methods_url(buyer_id)).send().await?;

        if response.status() != StatusCode::OK {
            return Err(Self::gateway_error(response).await);
        }
        Ok(response.json::<Vec<PaymentMethod>>().await?)
    }

    async fn register_method(
        &self,
        buyer_id: Uuid,
        card: CardDetails,
    ) -> Result<PaymentMethod, ServiceError> {
        let response = self
            .http
            .post(format!("{}/setup", self.methods_url(buyer_id)))
            .json(&SetupRegistration {
                buyer_id,
                usage: "off_session",
                card: &card,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response.json::<PaymentMethod>().await?),
            _ => Err(Self::gateway_error(response).await),
        }
    }

    async fn delete_method(&self, buyer_id: Uuid, method_id: &str) -> Result<(), ServiceError> {
        let response = self
            .http
            .delete(format!("{}/{}", self.methods_url(buyer_id), method_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            _ => Err(Self::gateway_error(response).await),
        }
    }
}
