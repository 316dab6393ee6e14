#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use hookcast_api::config::{ServerConfig, WebhookSettings};
use hookcast_api::router::build_app_router;
use hookcast_api::state::AppState;
use hookcast_db::SubscriptionStore;
use hookcast_events::{DeliveryConfig, Dispatcher, RetryPolicy, WebhookDelivery};

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and an in-memory SQLite store.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        webhook: WebhookSettings::default(),
    }
}

/// A dispatcher with short timeouts and retry delays.
pub fn test_dispatcher(store: Arc<dyn SubscriptionStore>) -> Dispatcher {
    let delivery = WebhookDelivery::new(&DeliveryConfig {
        request_timeout: Duration::from_secs(2),
        insecure_skip_verify: false,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
        },
    })
    .unwrap();
    Dispatcher::new(store, delivery, CancellationToken::new())
}

/// Build the full application router over a fresh in-memory store.
///
/// Goes through `build_app_router` so integration tests exercise the same
/// middleware stack (CORS, request ID, timeout, tracing, panic recovery)
/// that production uses.
pub async fn build_test_app() -> Router {
    let config = test_config();
    let store = hookcast_db::connect_store(&config.database_url)
        .await
        .unwrap();
    let dispatcher = Arc::new(test_dispatcher(Arc::clone(&store)));

    let state = AppState {
        store,
        dispatcher,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Like [`build_test_app`] but with delivery switched off.
pub async fn build_test_app_without_delivery() -> Router {
    let config = test_config();
    let store = hookcast_db::connect_store(&config.database_url)
        .await
        .unwrap();

    let state = AppState {
        store,
        dispatcher: Arc::new(Dispatcher::disabled()),
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty(), false).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Body::empty(), false).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body.to_string()), true).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Body::from(body.to_string()), true).await
}

/// POST a raw string body with a JSON content type.
pub async fn post_raw(app: Router, uri: &str, body: &str) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body.to_string()), true).await
}

async fn send(app: Router, method: Method, uri: &str, body: Body, json: bool) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if json {
        builder = builder.header("content-type", "application/json");
    }
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
