//! Webhook forwarding for protocol events.
//!
//! This crate provides the pipeline between the real-time protocol client
//! and external subscribers:
//!
//! - [`ProtocolEvent`]: the closed set of events that can be forwarded.
//! - [`PayloadBuilder`]: turns an event into a [`CanonicalEvent`].
//! - [`Dispatcher`]: finds matching subscriptions and fans out delivery.
//! - [`delivery`]: signed HTTP delivery with retry ([`WebhookDelivery`]).
//! - [`EventForwarder`]: builds and submits in one call.

pub mod delivery;
pub mod dispatcher;
pub mod forwarder;
pub mod payload;
pub mod protocol;

pub use delivery::webhook::{
    DeliveryConfig, DeliveryError, DeliveryReport, RetryPolicy, SignedBody, WebhookDelivery,
};
pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use forwarder::{EventForwarder, ForwardError};
pub use payload::{
    CanonicalEvent, IdentityResolver, MediaDownloader, NoIdentityResolver, PayloadBuilder,
    PayloadError, ResolveError,
};
pub use protocol::ProtocolEvent;
