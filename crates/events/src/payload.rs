//! Canonical webhook payloads built from protocol events.
//!
//! [`PayloadBuilder::build`] is the single entry point: it matches on the
//! [`ProtocolEvent`] variant and returns the event type together with the
//! JSON body subscribers receive. Message events produce flat payloads;
//! lifecycle events are wrapped as `{event, timestamp, payload}`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use hookcast_core::types::Timestamp;
use hookcast_core::webhooks::event_types;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::protocol::{
    ChatPresenceUpdate, ControlMessage, Jid, MediaAttachment, MediaKind, MessageBody,
    MessageContent, MessageEvent, MessageInfo, MessageKey, NewsletterJoin, NewsletterLeave,
    NewsletterLiveUpdate, NewsletterMuteChange, OfflineSyncCompleted, OfflineSyncPreview,
    PresenceUpdate, ProtocolEvent, Reaction,
};

/// Inline mention: `@` followed by word characters, not glued to a word.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\B@\w+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
#[error("Identity lookup failed: {0}")]
pub struct ResolveError(pub String);

/// Maps anonymized (`@lid`) identifiers to stable phone-number identities.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` when the identity store has no mapping for `lid`.
    async fn phone_for_lid(&self, lid: &Jid) -> Result<Option<Jid>, ResolveError>;
}

/// Resolver for deployments without an identity store.
pub struct NoIdentityResolver;

#[async_trait]
impl IdentityResolver for NoIdentityResolver {
    async fn phone_for_lid(&self, _lid: &Jid) -> Result<Option<Jid>, ResolveError> {
        Ok(None)
    }
}

/// Fetches and decrypts message media, returning the local file path.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn download(&self, media: &MediaAttachment) -> std::io::Result<PathBuf>;
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Media attached to the message could not be downloaded.
    #[error("Failed to download {kind}: {source}")]
    Media {
        kind: MediaKind,
        #[source]
        source: std::io::Error,
    },
}

/// An event ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    pub event_type: &'static str,
    pub payload: Value,
}

impl CanonicalEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }

    /// Wrap a lifecycle payload as `{event, timestamp, payload}`.
    fn lifecycle(event_type: &'static str, payload: Value) -> Self {
        Self::new(
            event_type,
            json!({
                "event": event_type,
                "timestamp": rfc3339(Utc::now()),
                "payload": payload,
            }),
        )
    }
}

#[derive(Serialize)]
struct MessageSummary<'a> {
    id: &'a str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    replied_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quoted_message: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// PayloadBuilder
// ---------------------------------------------------------------------------

/// Turns [`ProtocolEvent`]s into [`CanonicalEvent`]s.
pub struct PayloadBuilder {
    resolver: Arc<dyn IdentityResolver>,
    media: Arc<dyn MediaDownloader>,
}

impl PayloadBuilder {
    pub fn new(resolver: Arc<dyn IdentityResolver>, media: Arc<dyn MediaDownloader>) -> Self {
        Self { resolver, media }
    }

    pub async fn build(&self, event: &ProtocolEvent) -> Result<CanonicalEvent, PayloadError> {
        let canonical = match event {
            ProtocolEvent::Message(evt) => return self.message(evt).await,
            ProtocolEvent::NewsletterJoin(evt) => {
                CanonicalEvent::lifecycle(event_types::NEWSLETTER_JOIN, newsletter_join(evt))
            }
            ProtocolEvent::NewsletterLeave(evt) => {
                CanonicalEvent::lifecycle(event_types::NEWSLETTER_LEAVE, newsletter_leave(evt))
            }
            ProtocolEvent::NewsletterMuteChange(evt) => CanonicalEvent::lifecycle(
                event_types::NEWSLETTER_MUTE_CHANGE,
                newsletter_mute_change(evt),
            ),
            ProtocolEvent::NewsletterLiveUpdate(evt) => CanonicalEvent::lifecycle(
                event_types::NEWSLETTER_LIVE_UPDATE,
                newsletter_live_update(evt),
            ),
            ProtocolEvent::Presence(evt) => {
                CanonicalEvent::lifecycle(event_types::PRESENCE, presence(evt))
            }
            ProtocolEvent::ChatPresence(evt) => {
                CanonicalEvent::lifecycle(event_types::CHAT_PRESENCE, chat_presence(evt))
            }
            ProtocolEvent::OfflineSyncPreview(evt) => CanonicalEvent::lifecycle(
                event_types::OFFLINE_SYNC_PREVIEW,
                offline_sync_preview(evt),
            ),
            ProtocolEvent::OfflineSyncCompleted(evt) => CanonicalEvent::lifecycle(
                event_types::OFFLINE_SYNC_COMPLETED,
                offline_sync_completed(evt),
            ),
        };
        Ok(canonical)
    }

    async fn message(&self, evt: &MessageEvent) -> Result<CanonicalEvent, PayloadError> {
        match &evt.body {
            MessageBody::Content(content) => {
                let body = self.content_payload(evt, content).await?;
                Ok(CanonicalEvent::new(
                    event_types::MESSAGE_RECEIVED,
                    Value::Object(body),
                ))
            }
            MessageBody::Reaction(reaction) => Ok(CanonicalEvent::new(
                event_types::MESSAGE_REACTION,
                reaction_payload(&evt.info, reaction),
            )),
            MessageBody::Control(ControlMessage::Revoke { key }) => Ok(CanonicalEvent::new(
                event_types::MESSAGE_REVOKE,
                revoke_payload(&evt.info, key),
            )),
            MessageBody::Control(ControlMessage::Edit { edited_text, .. }) => {
                let mut body = self
                    .content_payload(evt, &MessageContent::default())
                    .await?;
                body.insert("action".into(), json!("message_edited"));
                if let Some(text) = edited_text {
                    body.insert("edited_text".into(), json!(text));
                }
                Ok(CanonicalEvent::new(
                    event_types::MESSAGE_RECEIVED,
                    Value::Object(body),
                ))
            }
            MessageBody::Control(ControlMessage::Other { .. }) => {
                let body = self
                    .content_payload(evt, &MessageContent::default())
                    .await?;
                Ok(CanonicalEvent::new(
                    event_types::MESSAGE_RECEIVED,
                    Value::Object(body),
                ))
            }
        }
    }

    async fn content_payload(
        &self,
        evt: &MessageEvent,
        content: &MessageContent,
    ) -> Result<Map<String, Value>, PayloadError> {
        let info = &evt.info;
        let mut body = common_fields(info);

        if info.sender.is_lid() {
            body.insert("from_lid".into(), json!(info.sender.to_string()));
            if let Some(phone) = self.resolve_lid(&info.sender).await {
                let from = if info.is_group {
                    format!("{phone} in {}", info.chat)
                } else {
                    phone.to_string()
                };
                body.insert("from".into(), json!(from));
            }
        }

        if !info.id.is_empty() {
            let summary = MessageSummary {
                id: &info.id,
                text: self.resolve_mentions(&content.text).await,
                replied_id: content.replied_id.as_deref(),
                quoted_message: content.quoted_message.as_deref(),
            };
            body.insert("message".into(), json!(summary));
        }

        if evt.is_view_once {
            body.insert("view_once".into(), json!(true));
        }
        if evt.is_forwarded {
            body.insert("forwarded".into(), json!(true));
        }

        let extras = [
            ("contact", &content.contact),
            ("location", &content.location),
            ("live_location", &content.live_location),
            ("list", &content.list),
            ("order", &content.order),
        ];
        for (key, value) in extras {
            if let Some(value) = value {
                body.insert(key.into(), value.clone());
            }
        }

        for media in &content.media {
            let path = self.media.download(media).await.map_err(|source| {
                tracing::error!(
                    kind = %media.kind,
                    from = %info.source_string(),
                    error = %source,
                    "Media download failed",
                );
                PayloadError::Media {
                    kind: media.kind,
                    source,
                }
            })?;
            body.insert(
                media.kind.as_str().into(),
                json!(path.display().to_string()),
            );
        }

        Ok(body)
    }

    /// Best-effort lid → phone lookup; failures keep the anonymized form.
    async fn resolve_lid(&self, lid: &Jid) -> Option<Jid> {
        match self.resolver.phone_for_lid(lid).await {
            Ok(Some(phone)) => Some(phone),
            Ok(None) => {
                tracing::debug!(lid = %lid, "No phone number mapped for lid");
                None
            }
            Err(e) => {
                tracing::warn!(lid = %lid, error = %e, "Failed to resolve lid");
                None
            }
        }
    }

    /// Replace `@<lid user>` mentions with `@<phone user>`.
    ///
    /// Each distinct token is looked up once; unresolved tokens stay as-is.
    async fn resolve_mentions(&self, text: &str) -> String {
        let mut resolved: HashMap<String, String> = HashMap::new();
        for token in MENTION_RE.find_iter(text).map(|m| m.as_str()) {
            if resolved.contains_key(token) {
                continue;
            }
            let replacement = match self.resolve_lid(&Jid::lid(&token[1..])).await {
                Some(phone) => format!("@{}", phone.user),
                None => token.to_string(),
            };
            resolved.insert(token.to_string(), replacement);
        }

        if resolved.is_empty() {
            return text.to_string();
        }
        MENTION_RE
            .replace_all(text, |caps: &Captures| {
                resolved
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

// ---------------------------------------------------------------------------
// Message payload pieces
// ---------------------------------------------------------------------------

fn rfc3339(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Fields present on every message-derived payload.
fn common_fields(info: &MessageInfo) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("sender_id".into(), json!(info.sender.user));
    body.insert("chat_id".into(), json!(info.chat.user));
    body.insert("from".into(), json!(info.source_string()));
    if !info.push_name.is_empty() {
        body.insert("pushname".into(), json!(info.push_name));
    }
    body.insert("timestamp".into(), json!(rfc3339(info.timestamp)));
    body
}

fn reaction_payload(info: &MessageInfo, reaction: &Reaction) -> Value {
    let mut body = common_fields(info);
    body.insert("reaction_text".into(), json!(reaction.text));
    body.insert("reaction_message_id".into(), json!(reaction.key.id));
    body.insert(
        "reaction_sender".into(),
        json!(reaction.key.remote_jid.as_deref().unwrap_or_default()),
    );
    body.insert("reaction_from_me".into(), json!(reaction.key.from_me));
    Value::Object(body)
}

fn revoke_payload(info: &MessageInfo, key: &MessageKey) -> Value {
    let mut body = common_fields(info);
    body.insert("revoked_message_id".into(), json!(key.id));
    body.insert("revoked_from_me".into(), json!(key.from_me));
    if let Some(chat) = key.remote_jid.as_deref().filter(|c| !c.is_empty()) {
        body.insert("revoked_chat".into(), json!(chat));
    }
    body.insert("action".into(), json!("message_revoked"));
    Value::Object(body)
}

// ---------------------------------------------------------------------------
// Lifecycle payloads
// ---------------------------------------------------------------------------

fn newsletter_join(evt: &NewsletterJoin) -> Value {
    let mut payload = Map::new();
    payload.insert("newsletter_id".into(), json!(evt.id.to_string()));
    if let Some(name) = evt.name.as_deref().filter(|n| !n.is_empty()) {
        payload.insert("name".into(), json!(name));
    }
    if let Some(description) = evt.description.as_deref().filter(|d| !d.is_empty()) {
        payload.insert("description".into(), json!(description));
    }
    payload.insert("subscriber_count".into(), json!(evt.subscriber_count));
    payload.insert("verification_state".into(), json!(evt.verification_state));
    Value::Object(payload)
}

fn newsletter_leave(evt: &NewsletterLeave) -> Value {
    json!({
        "newsletter_id": evt.id.to_string(),
        "role": evt.role,
    })
}

fn newsletter_mute_change(evt: &NewsletterMuteChange) -> Value {
    json!({
        "newsletter_id": evt.id.to_string(),
        "mute_state": evt.mute,
    })
}

fn newsletter_live_update(evt: &NewsletterLiveUpdate) -> Value {
    let mut payload = Map::new();
    payload.insert("newsletter_id".into(), json!(evt.id.to_string()));
    payload.insert("message_count".into(), json!(evt.messages.len()));
    if !evt.messages.is_empty() {
        let summaries: Vec<Value> = evt
            .messages
            .iter()
            .map(|msg| {
                json!({
                    "message_id": msg.message_id,
                    "server_id": msg.server_id,
                    "type": msg.message_type,
                    "timestamp": rfc3339(msg.timestamp),
                    "views_count": msg.views_count,
                    "reaction_count": msg.reaction_counts.len(),
                })
            })
            .collect();
        payload.insert("messages".into(), Value::Array(summaries));
    }
    Value::Object(payload)
}

fn presence(evt: &PresenceUpdate) -> Value {
    let mut payload = Map::new();
    payload.insert("from".into(), json!(evt.from.to_string()));
    payload.insert("unavailable".into(), json!(evt.unavailable));
    if let Some(last_seen) = evt.last_seen {
        payload.insert("last_seen".into(), json!(rfc3339(last_seen)));
    }
    Value::Object(payload)
}

fn chat_presence(evt: &ChatPresenceUpdate) -> Value {
    json!({
        "chat_id": evt.chat.to_string(),
        "sender_id": evt.sender.to_string(),
        "state": evt.state.as_str(),
        "media_type": evt.media.as_str(),
    })
}

fn offline_sync_preview(evt: &OfflineSyncPreview) -> Value {
    json!({
        "total_events": evt.total,
        "app_data_changes": evt.app_data_changes,
        "messages": evt.messages,
        "notifications": evt.notifications,
        "receipts": evt.receipts,
    })
}

fn offline_sync_completed(evt: &OfflineSyncCompleted) -> Value {
    json!({ "events_synchronized": evt.count })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
