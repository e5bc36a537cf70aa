use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The participant that authored a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human asking for the consultation.
    User,
    /// The chat model.
    Assistant,
}

impl Role {
    /// Capitalised label used in transcripts and history strings.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single exchange recorded in a transcript or chat history.
///
/// Turns are immutable once created; fields are exposed read-only through accessors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    role: Role,
    text: String,
    timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Creates a turn stamped with the current time.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a turn with [`Role::User`].
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Creates a turn with [`Role::Assistant`].
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// `"Role: text\n\n"`, the form accumulated into the conversation history.
    pub fn history_entry(&self) -> String {
        format!("{}: {}\n\n", self.role.label(), self.text)
    }
}
