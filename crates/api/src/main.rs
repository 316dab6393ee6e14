use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hookcast_api::config::ServerConfig;
use hookcast_api::router::build_app_router;
use hookcast_api::state::AppState;
use hookcast_events::{Dispatcher, WebhookDelivery};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hookcast_api=debug,hookcast_events=info,hookcast_db=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Subscription store ---
    let store = hookcast_db::connect_store(&config.database_url)
        .await
        .expect("Failed to open webhook store");

    store
        .health_check()
        .await
        .expect("Webhook store health check failed");
    tracing::info!("Webhook store health check passed");

    // --- Dispatcher ---
    let cancel = CancellationToken::new();
    let delivery = WebhookDelivery::new(&config.delivery_config())
        .expect("Failed to build webhook HTTP client");
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        delivery,
        cancel.clone(),
    ));
    tracing::info!(
        max_attempts = config.webhook.max_attempts,
        timeout_secs = config.webhook.timeout_secs,
        insecure_skip_verify = config.webhook.insecure_skip_verify,
        "Webhook dispatcher ready",
    );

    // --- App state ---
    let state = AppState {
        store,
        dispatcher: Arc::clone(&dispatcher),
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cancelling in-flight deliveries");
    dispatcher.shutdown();

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
