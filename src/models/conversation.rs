use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Message, Participant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Direct,
    Group,
    Channel,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "direct" => Some(Self::Direct),
            "group" => Some(Self::Group),
            "channel" => Some(Self::Channel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: bool,
    pub created_by: Uuid,
    /// Highest message sequence assigned so far. The sequence source for
    /// appends and the snapshot value for mark-read.
    pub last_sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A conversation aggregate with its participant rows loaded.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationWithParticipants {
    pub conversation: Conversation,
    pub participants: Vec<Participant>,
}

/// List annotation: the requester's unread count and the newest message.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub unread_count: i64,
    pub last_message: Option<Message>,
}

/// Mutable fields of a conversation. `None` leaves the field untouched;
/// there is no way to clear a set name or description back to NULL
/// through a patch.
#[derive(Debug, Clone, Default)]
pub struct ConversationChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

impl ConversationChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.is_private.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            ConversationKind::Direct,
            ConversationKind::Group,
            ConversationKind::Channel,
        ] {
            assert_eq!(ConversationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ConversationKind::parse("broadcast"), None);
    }
}
