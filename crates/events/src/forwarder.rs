//! Bridge from the protocol client's event stream to the dispatcher.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
use crate::payload::{PayloadBuilder, PayloadError};
use crate::protocol::ProtocolEvent;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Builds the canonical payload for each protocol event and submits it.
///
/// The result is for logging only; it never feeds back into how the
/// protocol client acknowledges the event.
pub struct EventForwarder {
    builder: PayloadBuilder,
    dispatcher: Arc<Dispatcher>,
}

impl EventForwarder {
    pub fn new(builder: PayloadBuilder, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            builder,
            dispatcher,
        }
    }

    pub async fn forward(&self, event: &ProtocolEvent) -> Result<DispatchOutcome, ForwardError> {
        // Skip payload work (media downloads, lookups) when nothing can be sent.
        if !self.dispatcher.is_enabled() {
            return Ok(DispatchOutcome::Disabled);
        }

        let canonical = self.builder.build(event).await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to build webhook payload");
        })?;
        let event_type = canonical.event_type;

        match self.dispatcher.submit(event_type, &canonical.payload).await {
            Ok(outcome) => {
                if let DispatchOutcome::Delivered { succeeded, failed } = outcome {
                    tracing::info!(event_type, succeeded, failed, "Event forwarded to webhooks");
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(event_type, error = %e, "Event not forwarded to any webhook");
                Err(e.into())
            }
        }
    }

    /// Forward on a background task so the caller never waits on delivery.
    pub fn spawn_forward(self: &Arc<Self>, event: ProtocolEvent) -> JoinHandle<()> {
        let forwarder = Arc::clone(self);
        tokio::spawn(async move {
            // Already logged inside `forward`.
            let _ = forwarder.forward(&event).await;
        })
    }
}
