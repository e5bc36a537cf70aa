use consult_core::ConversationTurn;
use uuid::Uuid;

/// One chat handle: the exchanges sent to the chat model so far.
///
/// A round reuses a single handle across all nine steps, so later prompts see every
/// earlier answer. Continuation prompts land on the same handle as the prompt they
/// continue.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    turns: Vec<ConversationTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Messages to send for a new user message: the history plus `text`.
    pub fn outbound(&self, text: &str) -> Vec<ConversationTurn> {
        let mut messages = self.turns.clone();
        messages.push(ConversationTurn::user(text));
        messages
    }

    /// Record a completed exchange.
    pub fn record(&mut self, user_text: &str, reply: &str) {
        self.turns.push(ConversationTurn::user(user_text));
        self.turns.push(ConversationTurn::assistant(reply));
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
