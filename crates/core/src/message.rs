use serde::{Deserialize, Serialize};

/// Who authored a transcript entry. The system entry carries the persona
/// instructions and is excluded from every rendered or submitted view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One immutable transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Drops system entries, preserving order. This is the view that is rendered
/// and the history that goes over the wire.
pub fn without_system(transcript: &[Message]) -> Vec<Message> {
    transcript
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect()
}
