//! Webhook event vocabulary, subscription validation rules, HMAC signing and
//! retry backoff math.
//!
//! Everything here is pure so it can be shared by the subscription store, the
//! delivery engine and the admin API without pulling in I/O.

use std::borrow::Cow;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use validator::ValidationError;

// ---------------------------------------------------------------------------
// Event vocabulary
// ---------------------------------------------------------------------------

/// Bumped whenever [`VALID_EVENTS`] changes.
pub const VOCABULARY_VERSION: u32 = 2;

/// Event type names emitted by the payload builder.
pub mod event_types {
    pub const MESSAGE_RECEIVED: &str = "message.received";
    pub const MESSAGE_REACTION: &str = "message.reaction";
    pub const MESSAGE_REVOKE: &str = "message.revoke";
    pub const NEWSLETTER_JOIN: &str = "newsletter.join";
    pub const NEWSLETTER_LEAVE: &str = "newsletter.leave";
    pub const NEWSLETTER_MUTE_CHANGE: &str = "newsletter.mute.change";
    pub const NEWSLETTER_LIVE_UPDATE: &str = "newsletter.live.update";
    pub const PRESENCE: &str = "presence";
    pub const CHAT_PRESENCE: &str = "chat.presence";
    pub const OFFLINE_SYNC_PREVIEW: &str = "offline.sync.preview";
    pub const OFFLINE_SYNC_COMPLETED: &str = "offline.sync.completed";
}

/// The fixed set of event names a subscription may ask for.
pub const VALID_EVENTS: &[&str] = &[
    // Connection
    "qr",
    "pair.success",
    "pair.error",
    "qr.scanned.without.multidevice",
    "connected",
    "keepalive.timeout",
    "keepalive.restored",
    "logged.out",
    "stream.replaced",
    "manual.login.reconnect",
    "temporary.ban",
    "connect.failure",
    "client.outdated",
    "cat.refresh.error",
    "stream.error",
    "disconnected",
    // Message
    "message",
    event_types::MESSAGE_RECEIVED,
    event_types::MESSAGE_REACTION,
    "message.ack",
    "fb.message",
    "undecryptable.message",
    "history.sync",
    "media.retry",
    "receipt.delivered",
    "receipt.read",
    "receipt.read.self",
    "receipt.played",
    "message.delete",
    event_types::MESSAGE_REVOKE,
    // Group
    "group",
    "group.join",
    "group.leave",
    "group.promote",
    "group.demote",
    "group.info",
    "group.picture",
    // User
    "user.about",
    "user.picture",
    "identity.change",
    "privacy.settings",
    event_types::PRESENCE,
    event_types::CHAT_PRESENCE,
    "blocklist",
    // Other
    event_types::NEWSLETTER_JOIN,
    event_types::NEWSLETTER_LEAVE,
    event_types::NEWSLETTER_MUTE_CHANGE,
    event_types::NEWSLETTER_LIVE_UPDATE,
    event_types::OFFLINE_SYNC_PREVIEW,
    event_types::OFFLINE_SYNC_COMPLETED,
];

/// Exact membership test against [`VALID_EVENTS`].
pub fn is_valid_event(name: &str) -> bool {
    VALID_EVENTS.contains(&name)
}

// ---------------------------------------------------------------------------
// Validation rules
// ---------------------------------------------------------------------------

/// Maximum secret length in characters.
pub const MAX_SECRET_LENGTH: usize = 255;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

fn invalid(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

/// Check that a webhook target URL is absolute http(s) with a host and no
/// user info. Surrounding whitespace is ignored.
pub fn validate_webhook_url(raw: &str) -> Result<(), ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(invalid("url_required", "URL cannot be empty"));
    }

    // `url` normalises `https:///path` into host `path`; reject an empty
    // authority before handing the string over.
    let Some((_, rest)) = raw.split_once("://") else {
        return Err(invalid("url_scheme", "URL scheme is required"));
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(invalid("url_host", "URL host is required"));
    }

    let parsed = url::Url::parse(raw)
        .map_err(|e| invalid("url_format", format!("invalid URL format: {e}")))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(invalid(
            "url_scheme",
            format!("must use http or https scheme, got: {scheme}"),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("url_host", "URL host is required"));
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(invalid(
            "url_userinfo",
            "user info in URL is not allowed for security reasons",
        ));
    }

    Ok(())
}

/// Check that every requested event name belongs to [`VALID_EVENTS`].
///
/// Emptiness is checked separately (`length(min = 1)` on the DTO).
pub fn validate_event_names(events: &[String]) -> Result<(), ValidationError> {
    match events.iter().find(|e| !is_valid_event(e)) {
        None => Ok(()),
        Some(unknown) => Err(invalid(
            "event_unknown",
            format!("unknown event '{unknown}', must be one of: {}", VALID_EVENTS.join(", ")),
        )),
    }
}

/// Collapse duplicate event names, keeping first-seen order.
pub fn dedup_events(events: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(events.len());
    for event in events {
        if !seen.contains(&event) {
            seen.push(event);
        }
    }
    seen
}

// ---------------------------------------------------------------------------
// Webhook HMAC signing
// ---------------------------------------------------------------------------

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 of `body` keyed by `secret`.
pub fn compute_webhook_hmac(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Value for [`SIGNATURE_HEADER`]: `sha256=<hex>`.
pub fn signature_header_value(secret: &str, body: &[u8]) -> String {
    format!("sha256={}", compute_webhook_hmac(secret, body))
}

// ---------------------------------------------------------------------------
// Webhook backoff computation
// ---------------------------------------------------------------------------

/// Attempts per subscriber per event, first try included.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// Delay before the first retry; doubles for each later retry.
pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Wait before 1-indexed `attempt`: zero for the first, then
/// `base * 2^(attempt - 2)`.
pub fn retry_delay_before(attempt: u32, base: Duration) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    base.saturating_mul(1u32 << (attempt - 2).min(31))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
