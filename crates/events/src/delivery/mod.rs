//! Outbound delivery channels.
//!
//! Only HTTP webhooks exist today: see [`webhook::WebhookDelivery`].

pub mod webhook;
