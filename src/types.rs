use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Delivery status of a message. Only ever moves forward from `Sending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Sent,
    Error,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, MessageStatus::Sending)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Absent for historical messages loaded from elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, status: Option<MessageStatus>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            status,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Some(MessageStatus::Sending))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Some(MessageStatus::Sent))
    }

    /// Moves a `Sending` message to a terminal status. Terminal messages are
    /// left untouched and `false` is returned.
    pub fn settle(&mut self, status: MessageStatus) -> bool {
        match self.status {
            Some(MessageStatus::Sending) if status.is_terminal() => {
                self.status = Some(status);
                true
            }
            _ => false,
        }
    }
}

/// Canonical answer extracted from a backend reply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub context: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_only_moves_forward() {
        let mut msg = Message::user("hello");
        assert!(msg.settle(MessageStatus::Error));
        assert_eq!(msg.status, Some(MessageStatus::Error));

        assert!(!msg.settle(MessageStatus::Sent));
        assert_eq!(msg.status, Some(MessageStatus::Error));
    }

    #[test]
    fn settle_ignores_sending_target() {
        let mut msg = Message::user("hello");
        assert!(!msg.settle(MessageStatus::Sending));
        assert_eq!(msg.status, Some(MessageStatus::Sending));
    }

    #[test]
    fn historical_message_has_no_status() {
        let json = r#"{"id":"a","role":"system","content":"welcome","timestamp":"2024-05-01T10:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).expect("message should parse");
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.status, None);

        let encoded = serde_json::to_string(&msg).expect("message should serialize");
        assert!(!encoded.contains("status"));
    }

    #[test]
    fn ids_are_unique() {
        let a = Message::user("x");
        let b = Message::user("x");
        assert_ne!(a.id, b.id);
    }
}
