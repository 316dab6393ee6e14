use std::sync::Arc;

use hookcast_db::SubscriptionStore;
use hookcast_events::Dispatcher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Webhook subscription store.
    pub store: Arc<dyn SubscriptionStore>,
    /// Outbound dispatcher, shared with the protocol event forwarder.
    pub dispatcher: Arc<Dispatcher>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
