use serde::{Deserialize, Serialize};

/// Kind of conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatType {
    Single,
    Group,
}

impl ChatType {
    /// Wire discriminator used by the server.
    pub fn code(self) -> i32 {
        match self {
            ChatType::Single => 1,
            ChatType::Group => 2,
        }
    }

    /// Total mapping from the wire discriminator; anything unexpected is
    /// treated as a single chat.
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => ChatType::Group,
            _ => ChatType::Single,
        }
    }
}

/// Role a member holds inside a group conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    pub fn code(self) -> i32 {
        match self {
            Role::Owner => 1,
            Role::Admin => 2,
            Role::Member => 3,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Role::Owner,
            2 => Role::Admin,
            _ => Role::Member,
        }
    }
}

/// Whether a member is currently muted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MuteState {
    None,
    Muted,
}

/// One member of a group conversation, keyed by `user_id` in the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub role: Role,
    pub mute: MuteState,
    /// Epoch milliseconds after which a per-member mute expires.
    #[serde(default)]
    pub mute_end_time: Option<i64>,
    /// Per-group display alias, when the member set one.
    #[serde(default)]
    pub alias: Option<String>,
}

impl GroupMember {
    /// Name to show in tips and previews: alias wins over profile name.
    pub fn display_name(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_type_round_trips_through_code() {
        assert_eq!(ChatType::from_code(ChatType::Group.code()), ChatType::Group);
        assert_eq!(
            ChatType::from_code(ChatType::Single.code()),
            ChatType::Single
        );
    }

    #[test]
    fn alias_wins_display_name() {
        let member = GroupMember {
            user_id: "u1".into(),
            name: "Ada".into(),
            avatar: None,
            role: Role::Member,
            mute: MuteState::None,
            mute_end_time: None,
            alias: Some("Countess".into()),
        };
        assert_eq!(member.display_name(), "Countess");
    }
}
