//! Polymorphic decode/encode of message bodies.
//!
//! This is the single content-type dispatch point of the pipeline. The
//! server sends bodies either as JSON objects or as JSON-encoded
//! strings; [`decode`] accepts both. [`encode`] produces the canonical
//! string persisted in the local store and is idempotent over strings
//! that are already encoded.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::message::{ContentType, Message, MessageBody, WireMessage};
use crate::types::ChatType;

/// Errors produced while interpreting a raw message body.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body was a string but not valid JSON.
    #[error("message body is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// The content type code has no mapping on this client.
    #[error("unsupported content type code {0}")]
    UnsupportedContentType(i32),

    /// The body parsed as JSON but does not fit the expected shape.
    #[error("body does not match content type {content_type:?}: {source}")]
    InvalidShape {
        content_type: ContentType,
        source: serde_json::Error,
    },
}

fn unwrap_string_layer(raw: &Value) -> Result<Value, DecodeError> {
    match raw {
        Value::String(s) => Ok(serde_json::from_str(s)?),
        other => Ok(other.clone()),
    }
}

fn shaped<T: DeserializeOwned>(value: Value, content_type: ContentType) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidShape {
        content_type,
        source,
    })
}

/// Decode a raw body into its concrete [`MessageBody`] variant.
///
/// Callers must treat a failure as "render an unknown placeholder", not
/// as a reason to drop the message.
pub fn decode(raw: &Value, content_type: ContentType) -> Result<MessageBody, DecodeError> {
    let value = unwrap_string_layer(raw)?;

    let body = match content_type {
        ContentType::Text => MessageBody::Text(shaped(value, content_type)?),
        ContentType::Image => MessageBody::Image(shaped(value, content_type)?),
        ContentType::Video => MessageBody::Video(shaped(value, content_type)?),
        ContentType::Audio => MessageBody::Audio(shaped(value, content_type)?),
        ContentType::File => MessageBody::File(shaped(value, content_type)?),
        ContentType::Location => MessageBody::Location(shaped(value, content_type)?),
        ContentType::Complex => MessageBody::Complex(shaped(value, content_type)?),
        ContentType::SystemTip => MessageBody::SystemTip(shaped(value, content_type)?),
        ContentType::GroupInvite => MessageBody::GroupInvite(shaped(value, content_type)?),
        ContentType::GroupOperation => MessageBody::GroupOperation(shaped(value, content_type)?),
        ContentType::Recall => MessageBody::Recall(shaped(value, content_type)?),
        ContentType::Edit => MessageBody::Edit(shaped(value, content_type)?),
        ContentType::Unknown(code) => return Err(DecodeError::UnsupportedContentType(code)),
    };
    Ok(body)
}

/// Like [`decode`], but total: failures collapse into
/// [`MessageBody::Unknown`] carrying the raw payload verbatim.
pub fn decode_or_unknown(raw: &Value, content_type: ContentType) -> MessageBody {
    decode(raw, content_type).unwrap_or_else(|_| MessageBody::Unknown(raw.clone()))
}

fn to_canonical_json<T: serde::Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| String::from("null"))
}

/// Encode a body to the canonical string form persisted in the store.
///
/// Idempotent: an [`MessageBody::Unknown`] that wraps an already-encoded
/// JSON string round-trips unchanged.
pub fn encode(body: &MessageBody) -> String {
    match body {
        MessageBody::Text(b) => to_canonical_json(b),
        MessageBody::Image(b) | MessageBody::Video(b) => to_canonical_json(b),
        MessageBody::Audio(b) => to_canonical_json(b),
        MessageBody::File(b) => to_canonical_json(b),
        MessageBody::Location(b) => to_canonical_json(b),
        MessageBody::Complex(b) => to_canonical_json(b),
        MessageBody::SystemTip(b) => to_canonical_json(b),
        MessageBody::GroupInvite(b) => to_canonical_json(b),
        MessageBody::GroupOperation(b) => to_canonical_json(b),
        MessageBody::Recall(b) => to_canonical_json(b),
        MessageBody::Edit(b) => to_canonical_json(b),
        MessageBody::Unknown(value) => match value {
            Value::String(s) if serde_json::from_str::<Value>(s).is_ok() => s.clone(),
            other => to_canonical_json(other),
        },
    }
}

/// Normalize a wire message into the canonical [`Message`] shape.
///
/// Body decoding is strict; the error (when any) is returned alongside a
/// message that carries the raw body as [`MessageBody::Unknown`], so the
/// caller can log the failure and still render a placeholder.
pub fn normalize(wire: &WireMessage) -> (Message, Option<DecodeError>) {
    let content_type = ContentType::from_code(wire.message_content_type);
    let (body, error) = match decode(&wire.message_body, content_type) {
        Ok(body) => (body, None),
        Err(err) => (MessageBody::Unknown(wire.message_body.clone()), Some(err)),
    };

    let message = Message {
        from_id: wire.from_id.clone(),
        to_id: wire.to_id.clone(),
        chat_type: ChatType::from_code(wire.chat_type),
        message_id: wire.message_id.clone(),
        message_temp_id: wire.message_temp_id.clone(),
        message_time: wire.message_time,
        sequence: wire.sequence,
        content_type,
        body,
    };
    (message, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{
        AudioBody, ComplexBody, EditBody, FileBody, GroupInviteBody, GroupOperationBody,
        LocationBody, MediaBody, RecallBody, Segment, TextBody, TipBody,
    };
    use serde_json::json;

    fn all_bodies() -> Vec<(ContentType, MessageBody)> {
        vec![
            (
                ContentType::Text,
                MessageBody::Text(TextBody {
                    content: "hello".into(),
                    at_user_ids: vec!["u2".into()],
                }),
            ),
            (
                ContentType::Image,
                MessageBody::Image(MediaBody {
                    url: "https://cdn/x.png".into(),
                    width: Some(640),
                    height: Some(480),
                    size: Some(1024),
                    name: None,
                }),
            ),
            (
                ContentType::Video,
                MessageBody::Video(MediaBody {
                    url: "https://cdn/x.mp4".into(),
                    width: None,
                    height: None,
                    size: Some(9999),
                    name: Some("x.mp4".into()),
                }),
            ),
            (
                ContentType::Audio,
                MessageBody::Audio(AudioBody {
                    url: "https://cdn/x.ogg".into(),
                    duration: Some(12),
                    size: None,
                }),
            ),
            (
                ContentType::File,
                MessageBody::File(FileBody {
                    url: "https://cdn/x.pdf".into(),
                    name: "x.pdf".into(),
                    size: Some(2048),
                }),
            ),
            (
                ContentType::Location,
                MessageBody::Location(LocationBody {
                    latitude: 48.85,
                    longitude: 2.35,
                    address: Some("Paris".into()),
                }),
            ),
            (
                ContentType::Complex,
                MessageBody::Complex(ComplexBody {
                    segments: vec![
                        Segment::Text { text: "hey ".into() },
                        Segment::Mention {
                            user_id: "u3".into(),
                            name: "Kim".into(),
                        },
                    ],
                }),
            ),
            (
                ContentType::SystemTip,
                MessageBody::SystemTip(TipBody {
                    tip: "You joined the group".into(),
                }),
            ),
            (
                ContentType::GroupInvite,
                MessageBody::GroupInvite(GroupInviteBody {
                    group_id: "g1".into(),
                    group_name: "team".into(),
                    inviter_id: "u1".into(),
                }),
            ),
            (
                ContentType::GroupOperation,
                MessageBody::GroupOperation(GroupOperationBody {
                    op_code: 3,
                    operator_id: "u1".into(),
                    target_ids: vec!["u2".into()],
                    value: None,
                    mute_end_time: None,
                }),
            ),
            (
                ContentType::Recall,
                MessageBody::Recall(RecallBody {
                    recalled: true,
                    operator_id: "u1".into(),
                    recall_time: 1_700_000_000_000,
                    reason: None,
                }),
            ),
            (
                ContentType::Edit,
                MessageBody::Edit(EditBody {
                    target_message_id: "m1".into(),
                    new_content: "fixed".into(),
                }),
            ),
        ]
    }

    #[test]
    fn round_trips_every_content_type() {
        for (content_type, body) in all_bodies() {
            let encoded = encode(&body);
            let decoded = decode(&Value::String(encoded), content_type).expect("decode");
            assert_eq!(decoded, body, "{content_type:?}");
        }
    }

    #[test]
    fn encode_is_idempotent_over_encoded_strings() {
        let body = MessageBody::Text(TextBody {
            content: "hi".into(),
            at_user_ids: Vec::new(),
        });
        let once = encode(&body);
        let again = encode(&MessageBody::Unknown(Value::String(once.clone())));
        assert_eq!(once, again);
    }

    #[test]
    fn rejects_invalid_json_string() {
        let err = decode(&Value::String("{not json".into()), ContentType::Text).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedJson(_)));
    }

    #[test]
    fn rejects_unknown_content_type() {
        let err = decode(&json!({"content": "x"}), ContentType::Unknown(77)).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedContentType(77)));
    }

    #[test]
    fn shape_mismatch_is_reported_per_type() {
        let err = decode(&json!({"nope": 1}), ContentType::File).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidShape {
                content_type: ContentType::File,
                ..
            }
        ));
    }

    #[test]
    fn decode_or_unknown_keeps_raw_payload() {
        let raw = json!({"mystery": true});
        let body = decode_or_unknown(&raw, ContentType::Unknown(99));
        assert_eq!(body, MessageBody::Unknown(raw));
    }

    #[test]
    fn normalize_falls_back_to_unknown_on_bad_body() {
        let wire: WireMessage = serde_json::from_value(json!({
            "fromId": "u1",
            "toId": "u2",
            "chatType": 2,
            "messageTime": 5,
            "sequence": 1,
            "messageContentType": 999,
            "messageBody": {"whatever": 1}
        }))
        .unwrap();

        let (message, error) = normalize(&wire);
        assert!(error.is_some());
        assert_eq!(message.chat_type, ChatType::Group);
        assert!(matches!(message.body, MessageBody::Unknown(_)));
        assert_eq!(message.content_type.code(), 999);
    }
}
