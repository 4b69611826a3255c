use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::provider_error_message;
use crate::errors::ServiceError;
use crate::models::{CheckoutDecline, CheckoutRequest, Order};

/// Result of an order submission: either a created order or one of the
/// closed decline variants.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Placed(Order),
    Declined(CheckoutDecline),
}

/// Order submission collaborator. Accepts a checkout payload and returns a
/// created order or a typed decline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn submit_checkout(
        &self,
        buyer_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<SubmitOutcome, ServiceError>;
}

#[derive(Clone)]
pub struct HttpOrderClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CheckoutPayload {
    buyer_id: Uuid,
    #[serde(flatten)]
    request: CheckoutRequest,
}

impl HttpOrderClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl OrderClient for HttpOrderClient {
    /// Submit the checkout payload.
    ///
    /// Decline classification happens here and only here: declined
    /// submissions (4xx with a `kind`-tagged body) become the closed
    /// `CheckoutDecline` union, and transport failures or unclassifiable
    /// responses collapse into the generic decline, which the confirmation
    /// step treats as retryable. Timeouts follow the same path as explicit
    /// generic declines.
    async fn submit_checkout(
        &self,
        buyer_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<SubmitOutcome, ServiceError> {
        let result = self
            .http
            .post(format!("{}/v1/checkout", self.base_url))
            .json(&CheckoutPayload { buyer_id, request })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!("order submission transport failure: {}", err);
                return Ok(SubmitOutcome::Declined(CheckoutDecline::Generic {
                    message: None,
                }));
            }
        };

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => {
                Ok(SubmitOutcome::Placed(response.json::<Order>().await?))
            }
            StatusCode::PAYMENT_REQUIRED | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
                let body = response.text().await.unwrap_or_default();
                match serde_json::from_str::<CheckoutDecline>(&body) {
                    Ok(decline) => Ok(SubmitOutcome::Declined(decline)),
                    Err(_) => Ok(SubmitOutcome::Declined(CheckoutDecline::Generic {
                        message: provider_error_message(&body),
                    })),
                }
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!("order backend returned {}: {}", status, body);
                Ok(SubmitOutcome::Declined(CheckoutDecline::Generic {
                    message: provider_error_message(&body),
                }))
            }
        }
    }
}
