use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use http::header::AUTHORIZATION;
use std::sync::Arc;

use crate::errors::{ApiError, ServiceError};
use crate::models::Buyer;
use crate::AppState;

/// Extractor resolving the request's bearer token into the buyer via the
/// identity collaborator. Checkout pages are access-guarded: no valid
/// token, no checkout.
pub struct CurrentBuyer(pub Buyer);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentBuyer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        match state.services.identity.current_user(token).await {
            Ok(buyer) => Ok(CurrentBuyer(buyer)),
            Err(ServiceError::Unauthorized(_)) => Err(ApiError::Unauthorized),
            Err(other) => Err(ApiError::ServiceError(other)),
        }
    }
}
