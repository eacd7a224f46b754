//! Pure preview rendering for chat-list rows.
//!
//! The reconciler shows a plain one-liner for the conversation that is
//! currently open and an HTML variant with mention badges for
//! background conversations. Both renderers are side-effect free so the
//! draft-preview path can reuse them.

use crate::message::{MessageBody, AT_ALL};

/// How strongly a message addresses the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionLevel {
    None,
    You,
    All,
}

/// Determine whether the body mentions the viewer or everyone.
pub fn mention_level(body: &MessageBody, viewer_id: &str) -> MentionLevel {
    let ids: Vec<&str> = match body {
        MessageBody::Text(text) => text.at_user_ids.iter().map(String::as_str).collect(),
        MessageBody::Complex(complex) => complex.mentioned_ids(),
        _ => return MentionLevel::None,
    };

    if ids.iter().any(|id| *id == AT_ALL) {
        MentionLevel::All
    } else if ids.iter().any(|id| *id == viewer_id) {
        MentionLevel::You
    } else {
        MentionLevel::None
    }
}

/// Plain-text one-liner for a message body.
pub fn plain_preview(body: &MessageBody) -> String {
    match body {
        MessageBody::Text(text) => text.content.clone(),
        MessageBody::Image(_) => "[Image]".into(),
        MessageBody::Video(_) => "[Video]".into(),
        MessageBody::Audio(_) => "[Voice]".into(),
        MessageBody::File(file) => format!("[File] {}", file.name),
        MessageBody::Location(location) => match &location.address {
            Some(address) => format!("[Location] {address}"),
            None => "[Location]".into(),
        },
        MessageBody::Complex(complex) => complex.plain_text(),
        MessageBody::SystemTip(tip) => tip.tip.clone(),
        MessageBody::GroupInvite(invite) => {
            format!("[Group invitation] {}", invite.group_name)
        }
        MessageBody::GroupOperation(_) => "[Group notice]".into(),
        MessageBody::Recall(_) => "[Message recalled]".into(),
        MessageBody::Edit(edit) => edit.new_content.clone(),
        MessageBody::Unknown(_) => "[Unsupported message]".into(),
    }
}

/// HTML variant used for background conversations: escaped content with
/// an optional leading mention badge.
pub fn html_preview(body: &MessageBody, viewer_id: &str) -> String {
    let text = escape_html(&plain_preview(body));
    match mention_level(body, viewer_id) {
        MentionLevel::All => {
            format!(r#"<span class="badge badge-mention">@all</span> {text}"#)
        }
        MentionLevel::You => {
            format!(r#"<span class="badge badge-mention">@you</span> {text}"#)
        }
        MentionLevel::None => text,
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ComplexBody, MediaBody, RecallBody, Segment, TextBody};

    fn text(content: &str, at: &[&str]) -> MessageBody {
        MessageBody::Text(TextBody {
            content: content.into(),
            at_user_ids: at.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn placeholder_for_media() {
        let body = MessageBody::Image(MediaBody {
            url: "u".into(),
            width: None,
            height: None,
            size: None,
            name: None,
        });
        assert_eq!(plain_preview(&body), "[Image]");
    }

    #[test]
    fn at_all_outranks_at_you() {
        let body = text("everyone", &["me", AT_ALL]);
        assert_eq!(mention_level(&body, "me"), MentionLevel::All);
    }

    #[test]
    fn html_preview_prefixes_badge_and_escapes() {
        let body = text("<b>hi</b>", &["me"]);
        let html = html_preview(&body, "me");
        assert!(html.starts_with(r#"<span class="badge badge-mention">@you</span>"#));
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
    }

    #[test]
    fn complex_mentions_reach_the_badge() {
        let body = MessageBody::Complex(ComplexBody {
            segments: vec![
                Segment::Mention {
                    user_id: "me".into(),
                    name: "Me".into(),
                },
                Segment::Text {
                    text: " look at this".into(),
                },
            ],
        });
        assert_eq!(mention_level(&body, "me"), MentionLevel::You);
        assert_eq!(plain_preview(&body), "@Me look at this");
    }

    #[test]
    fn recall_has_fixed_placeholder() {
        let body = MessageBody::Recall(RecallBody {
            recalled: true,
            operator_id: "u1".into(),
            recall_time: 0,
            reason: None,
        });
        assert_eq!(plain_preview(&body), "[Message recalled]");
    }
}
