pub mod gemini;
pub mod openai;

use crate::stream::StreamEvent;
use async_trait::async_trait;
use consult_core::{ConsultResult, ConversationTurn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Trait for LLM provider backends.
///
/// Backends are stateless: the caller passes the whole conversation on every call,
/// ending with the user turn that should be answered.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming completion. Returns the full response text.
    async fn chat(&self, messages: &[ConversationTurn]) -> ConsultResult<String>;

    /// Streaming completion.
    ///
    /// Returns a receiver for stream events and a join handle that resolves
    /// to the aggregated response text.
    async fn chat_stream(
        &self,
        messages: &[ConversationTurn],
    ) -> ConsultResult<(mpsc::Receiver<StreamEvent>, JoinHandle<ConsultResult<String>>)>;
}
