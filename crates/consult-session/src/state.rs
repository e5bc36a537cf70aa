use consult_core::ConversationTurn;
use uuid::Uuid;

/// Mutable state of one consulting session.
///
/// Turns are only ever appended, so transcript order is wall-clock order. The summary
/// is replaced wholesale whenever it is regenerated and may lag the transcript.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: Uuid,
    turns: Vec<ConversationTurn>,
    history: String,
    summary: String,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
            history: String::new(),
            summary: String::new(),
        }
    }

    /// Append a turn to the transcript and the history string.
    pub fn push(&mut self, turn: ConversationTurn) {
        self.history.push_str(&turn.history_entry());
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The conversation so far as `"Role: text\n\n"` blocks.
    pub fn history(&self) -> &str {
        &self.history
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Supersede the summary with a freshly generated one.
    pub fn set_summary(&mut self, summary: String) {
        self.summary = summary;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
