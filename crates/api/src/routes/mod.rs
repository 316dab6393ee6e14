pub mod health;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /webhooks                 list, create
/// /webhooks/events          event vocabulary
/// /webhooks/{id}            get, replace, delete
/// /webhooks/{id}/test       send a test delivery (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/webhooks", webhooks::router())
}
