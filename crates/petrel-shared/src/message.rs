//! The normalized message model.
//!
//! Every inbound payload is converted into one [`Message`] whose
//! [`MessageBody`] is a closed union keyed by [`ContentType`]. Adding a
//! content type means adding a variant here and a codec arm; the
//! compiler then points at every match that needs updating.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::ChatType;

/// Integer discriminator carried next to every wire message body.
///
/// The mapping is total: codes the client does not know land in
/// [`ContentType::Unknown`] carrying the raw code, so they can be stored
/// and re-sent without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Text,
    Image,
    Video,
    Audio,
    File,
    Location,
    Complex,
    SystemTip,
    GroupInvite,
    GroupOperation,
    Recall,
    Edit,
    Unknown(i32),
}

impl ContentType {
    pub fn code(self) -> i32 {
        match self {
            ContentType::Text => 1,
            ContentType::Image => 2,
            ContentType::Video => 3,
            ContentType::Audio => 4,
            ContentType::File => 5,
            ContentType::Location => 6,
            ContentType::Complex => 7,
            ContentType::SystemTip => 10,
            ContentType::GroupInvite => 11,
            ContentType::GroupOperation => 12,
            ContentType::Recall => 13,
            ContentType::Edit => 14,
            ContentType::Unknown(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ContentType::Text,
            2 => ContentType::Image,
            3 => ContentType::Video,
            4 => ContentType::Audio,
            5 => ContentType::File,
            6 => ContentType::Location,
            7 => ContentType::Complex,
            10 => ContentType::SystemTip,
            11 => ContentType::GroupInvite,
            12 => ContentType::GroupOperation,
            13 => ContentType::Recall,
            14 => ContentType::Edit,
            other => ContentType::Unknown(other),
        }
    }

    /// Whether bodies of this type belong in the full-text shadow table.
    pub fn is_textual(self) -> bool {
        matches!(self, ContentType::Text | ContentType::Complex)
    }
}

/// Plain text body, optionally mentioning users. A mention of everyone
/// is the sentinel [`AT_ALL`] in `at_user_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBody {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub at_user_ids: Vec<String>,
}

/// Sentinel user id meaning "@all" in mention lists.
pub const AT_ALL: &str = "all";

/// Image and video payloads share a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaBody {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBody {
    pub url: String,
    /// Clip length in seconds.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBody {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationBody {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
}

/// Grey inline notice rendered in the middle of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipBody {
    pub tip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInviteBody {
    pub group_id: String,
    pub group_name: String,
    pub inviter_id: String,
}

/// A group membership/role/mute delta, applied by the group-operation
/// state machine. `op` is decoded through [`GroupOpKind::from_code`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOperationBody {
    pub op_code: i32,
    pub operator_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_ids: Vec<String>,
    /// Free-form operand: new name, announcement text, join mode, role
    /// code as a string — whichever the operation needs.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub mute_end_time: Option<i64>,
}

/// Group operation kinds, total over the wire code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOpKind {
    Join,
    Leave,
    Kick,
    Promote,
    Demote,
    SetRole,
    TransferOwner,
    MuteMember,
    UnmuteMember,
    MuteAll,
    UnmuteAll,
    SetInfo,
    SetAnnouncement,
    SetJoinMode,
    Dismiss,
    Unrecognized(i32),
}

impl GroupOpKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => GroupOpKind::Join,
            2 => GroupOpKind::Leave,
            3 => GroupOpKind::Kick,
            4 => GroupOpKind::Promote,
            5 => GroupOpKind::Demote,
            6 => GroupOpKind::SetRole,
            7 => GroupOpKind::TransferOwner,
            8 => GroupOpKind::MuteMember,
            9 => GroupOpKind::UnmuteMember,
            10 => GroupOpKind::MuteAll,
            11 => GroupOpKind::UnmuteAll,
            12 => GroupOpKind::SetInfo,
            13 => GroupOpKind::SetAnnouncement,
            14 => GroupOpKind::SetJoinMode,
            15 => GroupOpKind::Dismiss,
            other => GroupOpKind::Unrecognized(other),
        }
    }
}

/// Tombstone left in place of a recalled message. The row keeps its
/// position in history; only the body is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallBody {
    pub recalled: bool,
    pub operator_id: String,
    pub recall_time: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Directive replacing an earlier message's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditBody {
    pub target_message_id: String,
    pub new_content: String,
}

/// One run of a rich-text message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Mention { user_id: String, name: String },
    Image { url: String },
}

/// Rich-text body: an ordered list of text/mention/inline-image runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexBody {
    pub segments: Vec<Segment>,
}

impl ComplexBody {
    /// Flatten to plain text for previews and the full-text index.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text { text } => out.push_str(text),
                Segment::Mention { name, .. } => {
                    out.push('@');
                    out.push_str(name);
                }
                Segment::Image { .. } => out.push_str("[image]"),
            }
        }
        out
    }

    /// User ids mentioned by this body, in order of appearance.
    pub fn mentioned_ids(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Mention { user_id, .. } => Some(user_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Closed union of every message payload the pipeline understands.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Text(TextBody),
    Image(MediaBody),
    Video(MediaBody),
    Audio(AudioBody),
    File(FileBody),
    Location(LocationBody),
    Complex(ComplexBody),
    SystemTip(TipBody),
    GroupInvite(GroupInviteBody),
    GroupOperation(GroupOperationBody),
    Recall(RecallBody),
    Edit(EditBody),
    /// Payload whose content type the client does not know. Kept verbatim
    /// so persistence and re-send are lossless.
    Unknown(Value),
}

impl MessageBody {
    /// The content type this body serializes under. `Unknown` keeps the
    /// original wire code.
    pub fn content_type(&self, unknown_code: i32) -> ContentType {
        match self {
            MessageBody::Text(_) => ContentType::Text,
            MessageBody::Image(_) => ContentType::Image,
            MessageBody::Video(_) => ContentType::Video,
            MessageBody::Audio(_) => ContentType::Audio,
            MessageBody::File(_) => ContentType::File,
            MessageBody::Location(_) => ContentType::Location,
            MessageBody::Complex(_) => ContentType::Complex,
            MessageBody::SystemTip(_) => ContentType::SystemTip,
            MessageBody::GroupInvite(_) => ContentType::GroupInvite,
            MessageBody::GroupOperation(_) => ContentType::GroupOperation,
            MessageBody::Recall(_) => ContentType::Recall,
            MessageBody::Edit(_) => ContentType::Edit,
            MessageBody::Unknown(_) => ContentType::Unknown(unknown_code),
        }
    }
}

/// Wire shape of a message payload inside a socket envelope, before
/// normalization. Field names follow the server's camelCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub from_id: String,
    pub to_id: String,
    #[serde(default)]
    pub chat_type: i32,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub message_temp_id: Option<String>,
    pub message_time: i64,
    #[serde(default)]
    pub sequence: i64,
    pub message_content_type: i32,
    #[serde(default)]
    pub message_body: Value,
}

/// A fully normalized message.
///
/// Identity invariant: `message_temp_id` is authoritative until the
/// server acks and assigns `message_id`; afterwards `message_id` wins.
/// [`Message::identity`] encodes that rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub from_id: String,
    pub to_id: String,
    pub chat_type: ChatType,
    pub message_id: Option<String>,
    pub message_temp_id: Option<String>,
    /// Server send time, epoch milliseconds.
    pub message_time: i64,
    /// Per-conversation monotone ordering key assigned by the server.
    pub sequence: i64,
    pub content_type: ContentType,
    pub body: MessageBody,
}

impl Message {
    /// The currently authoritative identity key.
    pub fn identity(&self) -> &str {
        match (&self.message_id, &self.message_temp_id) {
            (Some(id), _) => id,
            (None, Some(temp)) => temp,
            (None, None) => "",
        }
    }

    /// Build an outgoing message with a fresh client temp id; the server
    /// ack later supplies `message_id`.
    pub fn outgoing(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        chat_type: ChatType,
        message_time: i64,
        body: MessageBody,
    ) -> Self {
        let content_type = body.content_type(0);
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            chat_type,
            message_id: None,
            message_temp_id: Some(Uuid::new_v4().to_string()),
            message_time,
            sequence: 0,
            content_type,
            body,
        }
    }
}
