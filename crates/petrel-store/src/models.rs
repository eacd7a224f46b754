//! Domain model structs persisted in the local database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be
//! handed directly to the UI layer over IPC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use petrel_shared::message::ContentType;
use petrel_shared::types::ChatType;

// ---------------------------------------------------------------------------
// Chat (session)
// ---------------------------------------------------------------------------

/// One chat-list row: a single- or group-conversation session.
///
/// The in-memory copy owned by the reconciler is authoritative; the
/// persisted row is an eventually consistent mirror.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    /// Unique session identifier.
    pub chat_id: String,
    /// Local account the session belongs to.
    pub owner_id: String,
    /// Peer user id (single chat) or group id (group chat).
    pub to_id: String,
    pub chat_type: ChatType,
    /// Display name of the peer or group.
    pub name: String,
    pub avatar: Option<String>,
    /// Last-message preview as computed by the reconciler.
    pub preview: String,
    /// Time of the newest merged message, epoch milliseconds.
    pub message_time: i64,
    /// Server ordering key of the newest merged message; never regresses.
    pub sequence: i64,
    /// Unread counter; reset to zero when the chat is opened.
    pub unread: i64,
    pub is_top: bool,
    pub is_mute: bool,
    /// When this session was first materialized locally.
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// A freshly materialized, empty session for a peer.
    pub fn materialize(
        chat_id: impl Into<String>,
        owner_id: impl Into<String>,
        to_id: impl Into<String>,
        chat_type: ChatType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            owner_id: owner_id.into(),
            to_id: to_id.into(),
            chat_type,
            name: name.into(),
            avatar: None,
            preview: String::new(),
            message_time: 0,
            sequence: 0,
            unread: 0,
            is_top: false,
            is_mute: false,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Message record
// ---------------------------------------------------------------------------

/// A single durable message row. The body is the codec's canonical JSON
/// string; the authoritative identity (server id after ack, client temp
/// id before) is the primary key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: String,
    pub from_id: String,
    pub content_type: ContentType,
    pub body: String,
    /// Server send time, epoch milliseconds.
    pub message_time: i64,
    pub sequence: i64,
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// A saved per-conversation draft. Absence of a row means "no draft";
/// empty drafts are deleted, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draft {
    pub chat_id: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied to a chat row; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct ChatPatch {
    pub preview: Option<String>,
    pub unread: Option<i64>,
    pub is_top: Option<bool>,
    pub is_mute: Option<bool>,
}
