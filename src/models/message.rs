use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    File,
    Image,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Image => "image",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "file" => Some(Self::File),
            "image" => Some(Self::Image),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub author_id: Uuid,
    /// Strictly increasing per conversation, server-assigned.
    pub sequence: i64,
    pub content: String,
    pub kind: MessageKind,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    /// Soft-delete tombstone. The row keeps its sequence slot so
    /// read-pointer arithmetic stays valid; content is redacted at the
    /// read boundary, not here.
    pub deleted: bool,
}

impl Message {
    /// Read-boundary view: deleted messages keep their slot but lose
    /// their content and metadata.
    pub fn redacted(mut self) -> Self {
        if self.deleted {
            self.content = String::new();
            self.metadata = serde_json::Value::Null;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(deleted: bool) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            sequence: 7,
            content: "confidential".into(),
            kind: MessageKind::Text,
            metadata: serde_json::json!({"source": "web"}),
            created_at: Utc::now(),
            edited_at: None,
            deleted,
        }
    }

    #[test]
    fn redaction_clears_content_but_keeps_slot() {
        let redacted = sample(true).redacted();
        assert!(redacted.content.is_empty());
        assert_eq!(redacted.sequence, 7);
        assert!(redacted.deleted);
    }

    #[test]
    fn redaction_is_a_noop_for_live_messages() {
        let live = sample(false).redacted();
        assert_eq!(live.content, "confidential");
    }
}
