use crate::handlers::auth::CurrentBuyer;
use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    errors::ApiError,
    models::{CheckoutDecline, NewAddress, Order},
    services::{
        AddressStepView, ConfirmationEntry, ConfirmationState, ConfirmationSummary, NextStep,
        PlacementResult,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Creates the router for the checkout flow endpoints
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/address", get(address_view).put(confirm_address))
        .route("/address/addresses", post(create_address))
        .route("/payment", get(payment_view).put(select_payment_method))
        .route("/payment/methods", post(add_payment_method))
        .route("/payment/methods/:method_id", delete(delete_payment_method))
        .route("/confirmation", get(confirmation_view).post(place_order))
        .route("/session", delete(abandon_checkout))
}

// ==================== Address step ====================

/// Address step view: saved addresses with the default selection applied,
/// plus the shipping method table.
async fn address_view(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
) -> Result<Json<AddressStepView>, ApiError> {
    let view = state
        .services
        .address_step
        .view(buyer.id)
        .await
        .map_err(map_service_error)?;
    Ok(Json(view))
}

/// Create a new saved address
async fn create_address(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let address = state
        .services
        .address_step
        .create_address(buyer.id, payload.into())
        .await
        .map_err(map_service_error)?;

    Ok(created_response(address))
}

/// Confirm the address step: write address and shipping method into the
/// session and advance
async fn confirm_address(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
    Json(payload): Json<ConfirmAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    state
        .services
        .address_step
        .confirm(buyer.id, payload.address_id, &payload.shipping_method_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

// ==================== Payment step ====================

/// Payment step view. Reconciliation against the gateway list runs (and is
/// applied to the session) before this returns anything selectable.
async fn payment_view(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .payment_step
        .reconcile(buyer.id)
        .await
        .map_err(map_service_error)?;
    Ok(Json(view))
}

/// Select one of the saved payment methods
async fn select_payment_method(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
    Json(payload): Json<SelectPaymentMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let view = state
        .services
        .payment_step
        .select_method(buyer.id, &payload.payment_method_id)
        .await
        .map_err(map_service_error)?;
    Ok(Json(view))
}

/// Register a new payment method (setup-intent style, no charge). The
/// response acknowledgment is dismissed explicitly by the buyer; the flow
/// does not auto-advance.
async fn add_payment_method(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
    Json(payload): Json<AddPaymentMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .payment_step
        .add_method(buyer.id, payload.into())
        .await
        .map_err(map_service_error)?;

    Ok(created_response(outcome))
}

/// Delete a saved payment method. Destructive: the client gates this
/// behind its own confirmation dialog.
async fn delete_payment_method(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
    Path(method_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .payment_step
        .delete_method(buyer.id, &method_id)
        .await
        .map_err(map_service_error)?;
    Ok(Json(view))
}

// ==================== Confirmation step ====================

/// Confirmation step entry: precondition gate plus order summary
async fn confirmation_view(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .services
        .confirmation
        .entry_check(buyer.id)
        .await
        .map_err(map_service_error)?;

    let response = match entry {
        ConfirmationEntry::Ready(summary) => ConfirmationEntryResponse::Ready {
            email: buyer.email,
            summary,
        },
        ConfirmationEntry::RedirectToAddress => ConfirmationEntryResponse::Redirect {
            to: "address".to_string(),
        },
        ConfirmationEntry::Suppressed(flow) => ConfirmationEntryResponse::Suppressed { flow },
    };
    Ok(Json(response))
}

/// Confirm and pay. Irreversible; the client double-gates this behind a
/// confirmation dialog before the request is ever sent.
async fn place_order(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
) -> Result<Response, ApiError> {
    let result = state
        .services
        .confirmation
        .place_order(buyer.id)
        .await
        .map_err(map_service_error)?;

    Ok(match result {
        PlacementResult::Placed(order) => created_response(OrderPlacedResponse {
            order,
            confirmation_email: buyer.email,
        }),
        PlacementResult::Declined { decline, next_step } => {
            let status = match &decline {
                CheckoutDecline::AmountTooSmall { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::PAYMENT_REQUIRED,
            };
            let message = decline_message(&decline);
            (
                status,
                Json(DeclineResponse {
                    decline,
                    next_step,
                    message,
                }),
            )
                .into_response()
        }
        PlacementResult::RedirectToAddress => success_response(
            ConfirmationEntryResponse::Redirect {
                to: "address".to_string(),
            },
        ),
    })
}

/// Abandon the checkout and drop the session
async fn abandon_checkout(
    State(state): State<Arc<AppState>>,
    CurrentBuyer(buyer): CurrentBuyer,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .confirmation
        .abandon(buyer.id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Buyer-facing explanation for a decline. The backend's message is used
/// verbatim when it sent one.
fn decline_message(decline: &CheckoutDecline) -> String {
    match decline {
        CheckoutDecline::PaymentMethodBurned { .. } => {
            "Your saved payment method can no longer be used. Please choose or add another one."
                .to_string()
        }
        CheckoutDecline::AmountTooSmall {
            minimum_amount,
            current_amount,
        } => format!(
            "The order total {} is below the minimum processable amount {}. Please adjust your cart.",
            current_amount, minimum_amount
        ),
        CheckoutDecline::Generic { message } => message
            .clone()
            .unwrap_or_else(|| "Your payment could not be processed. Please try again.".to_string()),
    }
}

// Request/Response DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmAddressRequest {
    pub address_id: Uuid,
    #[validate(length(min = 1))]
    pub shipping_method_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(equal = 2))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
    pub notes: Option<String>,
}

impl From<CreateAddressRequest> for NewAddress {
    fn from(req: CreateAddressRequest) -> Self {
        NewAddress {
            street: req.street,
            city: req.city,
            state: req.state,
            postal_code: req.postal_code,
            country: req.country,
            is_default: req.is_default,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SelectPaymentMethodRequest {
    #[validate(length(min = 1))]
    pub payment_method_id: String,
}

fn validate_digits(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("digits");
        err.message = Some("Card number must contain only digits".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddPaymentMethodRequest {
    #[validate(length(min = 1))]
    pub cardholder_name: String,
    #[validate(length(min = 12, max = 19), custom = "validate_digits")]
    pub number: String,
    #[validate(range(min = 1, max = 12))]
    pub exp_month: u8,
    #[validate(range(min = 2024, max = 2099))]
    pub exp_year: u16,
    #[validate(length(min = 3, max = 4), custom = "validate_digits")]
    pub cvc: String,
}

impl From<AddPaymentMethodRequest> for crate::models::CardDetails {
    fn from(req: AddPaymentMethodRequest) -> Self {
        crate::models::CardDetails {
            cardholder_name: req.cardholder_name,
            number: req.number,
            exp_month: req.exp_month,
            exp_year: req.exp_year,
            cvc: req.cvc,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfirmationEntryResponse {
    Ready {
        email: String,
        summary: ConfirmationSummary,
    },
    Redirect {
        to: String,
    },
    Suppressed {
        flow: ConfirmationState,
    },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderPlacedResponse {
    pub order: Order,
    pub confirmation_email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeclineResponse {
    pub decline: CheckoutDecline,
    pub next_step: NextStep,
    pub message: String,
}
