//! Domain primitives shared by every hookcast crate.
//!
//! This crate has zero internal dependencies so the store, the delivery
//! engine and the admin API can all rely on the same vocabulary, validation
//! rules and signing helpers.

pub mod error;
pub mod types;
pub mod webhooks;
