//! Typed events emitted by the real-time protocol client.
//!
//! The client itself lives outside this workspace; these types are the
//! narrow slice of its event model that webhook forwarding needs. Every
//! event the forwarder understands is a variant of [`ProtocolEvent`].

use std::collections::HashMap;
use std::fmt;

use hookcast_core::types::Timestamp;
use serde::Serialize;
use serde_json::Value;

/// Server part of anonymized (`@lid`) identifiers.
pub const LID_SERVER: &str = "lid";

/// Server part of phone-number user identifiers.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Server part of group chat identifiers.
pub const GROUP_SERVER: &str = "g.us";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A `user@server` protocol identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    /// An anonymized identifier for `user`.
    pub fn lid(user: impl Into<String>) -> Self {
        Self::new(user, LID_SERVER)
    }

    /// Parse `user@server`. Returns `None` when either part is missing.
    pub fn parse(raw: &str) -> Option<Self> {
        let (user, server) = raw.split_once('@')?;
        if user.is_empty() || server.is_empty() {
            return None;
        }
        Some(Self::new(user, server))
    }

    pub fn is_lid(&self) -> bool {
        self.server == LID_SERVER
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Envelope metadata shared by every message event.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub id: String,
    pub chat: Jid,
    pub sender: Jid,
    pub is_group: bool,
    pub is_from_me: bool,
    /// Display name the sender chose; empty when unknown.
    pub push_name: String,
    pub timestamp: Timestamp,
}

impl MessageInfo {
    /// `"<sender>"` for direct chats, `"<sender> in <chat>"` for groups.
    pub fn source_string(&self) -> String {
        if self.is_group {
            format!("{} in {}", self.sender, self.chat)
        } else {
            self.sender.to_string()
        }
    }
}

/// Reference to another message.
#[derive(Debug, Clone, Default)]
pub struct MessageKey {
    pub id: String,
    pub remote_jid: Option<String>,
    pub from_me: bool,
}

/// The kinds of downloadable media a message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
    Video,
    Document,
    Sticker,
}

impl MediaKind {
    /// Payload key the downloaded file path is stored under.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Sticker => "sticker",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encrypted media blob still held by the protocol server.
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub mime_type: String,
    pub direct_path: String,
    pub file_name: Option<String>,
}

/// Ordinary message content.
///
/// Structured extras (`contact`, `location`, ...) are kept in the protocol's
/// own JSON shape and forwarded untouched.
#[derive(Debug, Clone, Default)]
pub struct MessageContent {
    pub text: String,
    pub replied_id: Option<String>,
    pub quoted_message: Option<String>,
    pub media: Vec<MediaAttachment>,
    pub contact: Option<Value>,
    pub location: Option<Value>,
    pub live_location: Option<Value>,
    pub list: Option<Value>,
    pub order: Option<Value>,
}

/// An emoji reaction to another message.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub text: String,
    pub key: MessageKey,
}

/// Protocol-level control messages.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// The referenced message was deleted for everyone.
    Revoke { key: MessageKey },
    /// The referenced message was edited.
    Edit {
        key: MessageKey,
        edited_text: Option<String>,
    },
    /// Any other control message; forwarded as plain content.
    Other { kind: String },
}

#[derive(Debug, Clone)]
pub enum MessageBody {
    Content(MessageContent),
    Reaction(Reaction),
    Control(ControlMessage),
}

#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub info: MessageInfo,
    pub body: MessageBody,
    pub is_view_once: bool,
    pub is_forwarded: bool,
}

// ---------------------------------------------------------------------------
// Lifecycle events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewsletterJoin {
    pub id: Jid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub subscriber_count: u64,
    pub verification_state: String,
}

#[derive(Debug, Clone)]
pub struct NewsletterLeave {
    pub id: Jid,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct NewsletterMuteChange {
    pub id: Jid,
    pub mute: String,
}

#[derive(Debug, Clone)]
pub struct NewsletterMessage {
    pub message_id: String,
    pub server_id: u64,
    pub message_type: String,
    pub timestamp: Timestamp,
    pub views_count: u64,
    /// Reaction emoji to count.
    pub reaction_counts: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct NewsletterLiveUpdate {
    pub id: Jid,
    pub messages: Vec<NewsletterMessage>,
}

#[derive(Debug, Clone)]
pub struct PresenceUpdate {
    pub from: Jid,
    pub unavailable: bool,
    pub last_seen: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPresenceState {
    Composing,
    Paused,
}

impl ChatPresenceState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatPresenceState::Composing => "composing",
            ChatPresenceState::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPresenceMedia {
    Text,
    Audio,
}

impl ChatPresenceMedia {
    /// The protocol encodes plain typing as an empty media type.
    pub fn as_str(self) -> &'static str {
        match self {
            ChatPresenceMedia::Text => "",
            ChatPresenceMedia::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatPresenceUpdate {
    pub chat: Jid,
    pub sender: Jid,
    pub state: ChatPresenceState,
    pub media: ChatPresenceMedia,
}

#[derive(Debug, Clone, Default)]
pub struct OfflineSyncPreview {
    pub total: u64,
    pub app_data_changes: u64,
    pub messages: u64,
    pub notifications: u64,
    pub receipts: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OfflineSyncCompleted {
    pub count: u64,
}

// ---------------------------------------------------------------------------
// ProtocolEvent
// ---------------------------------------------------------------------------

/// Every protocol event that can be forwarded to webhooks.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    Message(MessageEvent),
    NewsletterJoin(NewsletterJoin),
    NewsletterLeave(NewsletterLeave),
    NewsletterMuteChange(NewsletterMuteChange),
    NewsletterLiveUpdate(NewsletterLiveUpdate),
    Presence(PresenceUpdate),
    ChatPresence(ChatPresenceUpdate),
    OfflineSyncPreview(OfflineSyncPreview),
    OfflineSyncCompleted(OfflineSyncCompleted),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jid_parse_and_display() {
        let jid = Jid::parse("12345@lid").unwrap();
        assert!(jid.is_lid());
        assert_eq!(jid.to_string(), "12345@lid");
        assert_eq!(Jid::parse("no-server"), None);
        assert_eq!(Jid::parse("@lid"), None);
    }

    #[test]
    fn source_string_includes_group() {
        let mut info = MessageInfo {
            id: "M1".into(),
            chat: Jid::new("120363", GROUP_SERVER),
            sender: Jid::new("628123", USER_SERVER),
            is_group: true,
            is_from_me: false,
            push_name: String::new(),
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(
            info.source_string(),
            "628123@s.whatsapp.net in 120363@g.us"
        );

        info.is_group = false;
        assert_eq!(info.source_string(), "628123@s.whatsapp.net");
    }

    #[test]
    fn media_kind_keys() {
        assert_eq!(MediaKind::Sticker.as_str(), "sticker");
        assert_eq!(MediaKind::Document.to_string(), "document");
    }
}
