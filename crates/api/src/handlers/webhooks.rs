//! Admin handlers for webhook subscription management.
//!
//! CRUD over the subscription store, the event vocabulary, and a one-shot
//! test delivery.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hookcast_core::webhooks::{VALID_EVENTS, VOCABULARY_VERSION};
use hookcast_db::models::subscription::CreateSubscription;
use hookcast_events::DispatchError;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Event type carried by test deliveries.
const TEST_EVENT: &str = "webhook.test";

#[derive(Debug, Serialize)]
pub struct EventVocabulary {
    pub version: u32,
    pub events: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct TestDeliveryResult {
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Webhook CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/webhooks
///
/// List all webhooks, newest first.
pub async fn list_webhooks(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let webhooks = state.store.list_all().await?;
    Ok(Json(DataResponse { data: webhooks }))
}

/// GET /api/v1/webhooks/events
pub async fn list_event_types() -> impl IntoResponse {
    Json(DataResponse {
        data: EventVocabulary {
            version: VOCABULARY_VERSION,
            events: VALID_EVENTS,
        },
    })
}

/// GET /api/v1/webhooks/{id}
pub async fn get_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let webhook = state.store.get(&webhook_id).await?;
    Ok(Json(DataResponse { data: webhook }))
}

/// POST /api/v1/webhooks
///
/// Create a new webhook subscription.
pub async fn create_webhook(
    State(state): State<AppState>,
    input: Result<Json<CreateSubscription>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = input?;

    let webhook_id = state.store.create(input).await?;
    let webhook = state.store.get(&webhook_id).await?;

    tracing::info!(
        webhook_id = %webhook.id,
        url = %webhook.url,
        events = webhook.events.len(),
        "Webhook created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: webhook })))
}

/// PUT /api/v1/webhooks/{id}
///
/// Replace every mutable field of a webhook.
pub async fn update_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
    input: Result<Json<CreateSubscription>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = input?;

    state.store.update(&webhook_id, input).await?;
    let updated = state.store.get(&webhook_id).await?;

    tracing::info!(webhook_id = %updated.id, enabled = updated.enabled, "Webhook updated");

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/webhooks/{id}
///
/// The store treats unknown ids as already deleted; this endpoint reports
/// them as 404.
pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.store.get(&webhook_id).await?;
    state.store.delete(&webhook_id).await?;

    tracing::info!(webhook_id = %webhook_id, "Webhook deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Test delivery
// ---------------------------------------------------------------------------

/// POST /api/v1/webhooks/{id}/test
///
/// Send one synthetic, signed payload to a webhook to verify connectivity.
/// Delivery failures are reported in the body, not as an error status.
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let webhook = state.store.get(&webhook_id).await?;

    let payload = serde_json::json!({
        "event": TEST_EVENT,
        "webhook_id": webhook.id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "message": "This is a test delivery to verify webhook connectivity.",
    });

    let result = match state.dispatcher.deliver_to(&webhook, &payload).await {
        Ok(report) => TestDeliveryResult {
            delivered: true,
            status: Some(report.status),
            error: None,
        },
        Err(DispatchError::NotConfigured) => {
            return Err(AppError::BadRequest(
                "Webhook delivery is not configured".into(),
            ))
        }
        Err(e) => TestDeliveryResult {
            delivered: false,
            status: None,
            error: Some(e.to_string()),
        },
    };

    tracing::info!(
        webhook_id = %webhook.id,
        delivered = result.delivered,
        "Test webhook delivery sent",
    );

    Ok(Json(DataResponse { data: result }))
}
