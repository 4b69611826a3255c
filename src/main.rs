use std::{net::SocketAddr, sync::Arc};

use tokio::{signal, sync::mpsc};
use tracing::info;

use wastetreasure_api as api;

use api::clients::{
    HttpAddressClient, HttpCartClient, HttpIdentityClient, HttpOrderClient, HttpPaymentGateway,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Checkout session store (in-memory or redis, per config)
    let session_store = api::session::build_session_store(&cfg.session).await?;

    // Collaborator clients share one HTTP client with the bounded timeout
    let http = api::clients::build_http_client(&cfg.collaborators);
    let identity = Arc::new(HttpIdentityClient::new(
        http.clone(),
        cfg.collaborators.identity_url.clone(),
    ));
    let addresses = Arc::new(HttpAddressClient::new(
        http.clone(),
        cfg.collaborators.address_url.clone(),
    ));
    let gateway = Arc::new(HttpPaymentGateway::new(
        http.clone(),
        cfg.collaborators.gateway_url.clone(),
    ));
    let orders = Arc::new(HttpOrderClient::new(
        http.clone(),
        cfg.collaborators.order_url.clone(),
    ));
    let cart = Arc::new(HttpCartClient::new(
        http,
        cfg.collaborators.cart_url.clone(),
    ));

    // Aggregate app services used by HTTP handlers
    let services = api::handlers::AppServices::new(
        &cfg,
        identity,
        addresses,
        gateway,
        orders,
        cart,
        session_store.clone(),
        Arc::new(event_sender.clone()),
    );

    // Compose shared app state
    let app_state = Arc::new(api::AppState {
        config: cfg.clone(),
        event_sender,
        services,
        session_store,
    });

    let app = api::app(app_state);

    let addr: SocketAddr = cfg.bind_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining connections");
}
