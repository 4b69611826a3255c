//! Waste to Treasure checkout orchestration API
//!
//! This crate owns the buyer's in-progress checkout session and
//! orchestrates the external collaborators (identity, addresses, payment
//! gateway, orders, cart) across the address, payment, and confirmation
//! steps. Everything non-trivial — tokenization, charging, order
//! persistence — happens in those collaborators.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod clients;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;
pub mod session;
pub mod tracing;

use axum::{http::HeaderValue, middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
    pub session_store: Arc<dyn session::SessionStore>,
}

/// Build the CORS layer from configuration. Development defaults to
/// permissive; anywhere else the allowed origins come from config (the
/// config validator enforces that they are present).
fn build_cors_layer(config: &config::AppConfig) -> CorsLayer {
    let permissive = config.cors_allow_any_origin
        || (config.is_development() && config.cors_allowed_origins.is_none());

    if permissive {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Assemble the application router.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config);
    let timeout = TimeoutLayer::new(Duration::from_secs(state.config.request_timeout_secs));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1/checkout", handlers::checkout::checkout_routes())
        .layer(
            TraceLayer::new_for_http().make_span_with(tracing::RequestSpanMaker::default()),
        )
        .layer(middleware::from_fn(tracing::request_id_middleware))
        .layer(timeout)
        .layer(cors)
        .with_state(state)
}
