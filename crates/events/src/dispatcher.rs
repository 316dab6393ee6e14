//! Fan-out of one canonical event to every matching subscription.

use std::sync::Arc;

use futures::future::join_all;
use hookcast_db::models::subscription::Subscription;
use hookcast_db::{StoreError, SubscriptionStore};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::delivery::webhook::{
    canonical_bytes, DeliveryError, DeliveryReport, SignedBody, WebhookDelivery,
};

/// Verdict for one dispatched event. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Webhook forwarding is not configured.
    Disabled,
    /// No enabled subscription listens for the event type.
    NoSubscribers,
    /// At least one subscription received the event.
    Delivered { succeeded: usize, failed: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to look up webhooks for {event_type}: {source}")]
    Lookup {
        event_type: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to serialize webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("All {attempted} webhook deliveries failed; last error: {last_error}")]
    AllFailed {
        attempted: usize,
        last_error: DeliveryError,
    },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Webhook dispatch is not configured")]
    NotConfigured,
}

struct Enabled {
    store: Arc<dyn SubscriptionStore>,
    delivery: WebhookDelivery,
}

/// Looks up subscribers for an event and delivers to all of them
/// concurrently.
///
/// One slow or failing subscriber never delays the others beyond the
/// shared `submit` await. Cancelling the token aborts in-flight retries.
pub struct Dispatcher {
    inner: Option<Enabled>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        delivery: WebhookDelivery,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Some(Enabled { store, delivery }),
            cancel,
        }
    }

    /// A dispatcher that accepts every event and delivers nothing.
    pub fn disabled() -> Self {
        Self {
            inner: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Abort every in-flight delivery. Later submissions fail fast.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Deliver `payload` to every enabled subscription for `event_type`.
    pub async fn submit(
        &self,
        event_type: &str,
        payload: &Value,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(inner) = &self.inner else {
            return Ok(DispatchOutcome::Disabled);
        };

        let subscriptions = inner
            .store
            .list_enabled_by_event(event_type)
            .await
            .map_err(|source| {
                tracing::error!(event_type, error = %source, "Failed to look up webhooks");
                DispatchError::Lookup {
                    event_type: event_type.to_string(),
                    source,
                }
            })?;

        if subscriptions.is_empty() {
            tracing::debug!(event_type, "No webhooks subscribed to event");
            return Ok(DispatchOutcome::NoSubscribers);
        }

        let bytes = canonical_bytes(payload)?;
        tracing::info!(
            event_type,
            subscribers = subscriptions.len(),
            "Forwarding event to webhooks",
        );

        let results = join_all(subscriptions.iter().map(|subscription| {
            let body = SignedBody::new(bytes.clone(), subscription.signing_secret());
            async move {
                inner
                    .delivery
                    .deliver(subscription, &body, &self.cancel)
                    .await
            }
        }))
        .await;

        let attempted = results.len();
        let mut succeeded = 0;
        let mut last_error = None;
        for (subscription, result) in subscriptions.iter().zip(results) {
            match result {
                Ok(report) => {
                    succeeded += 1;
                    tracing::debug!(
                        subscription_id = %subscription.id,
                        event_type,
                        attempts = report.attempts,
                        "Webhook accepted event",
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        event_type,
                        url = %subscription.url,
                        error = %e,
                        "Failed to deliver webhook",
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last_error) if succeeded == 0 => Err(DispatchError::AllFailed {
                attempted,
                last_error,
            }),
            _ => Ok(DispatchOutcome::Delivered {
                succeeded,
                failed: attempted - succeeded,
            }),
        }
    }

    /// Send `payload` to one subscription once, regardless of its event set
    /// or enabled flag.
    pub async fn deliver_to(
        &self,
        subscription: &Subscription,
        payload: &Value,
    ) -> Result<DeliveryReport, DispatchError> {
        let Some(inner) = &self.inner else {
            return Err(DispatchError::NotConfigured);
        };
        let body = SignedBody::new(canonical_bytes(payload)?, subscription.signing_secret());
        Ok(inner
            .delivery
            .deliver_once(subscription, &body, &self.cancel)
            .await?)
    }
}
