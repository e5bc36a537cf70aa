use crate::backends::gemini::GeminiBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::stream::StreamEvent;
use consult_core::{ConsultResult, ConversationTurn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// LLM client that dispatches to the correct provider backend.
pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Self {
        let backend: Box<dyn LlmBackend> = match config.provider {
            LlmProvider::Gemini => Box::new(GeminiBackend::new(config)),
            LlmProvider::OpenAi => Box::new(OpenAiBackend::new(config)),
        };
        Self { backend }
    }

    /// Create from a pre-built backend (for custom providers and tests).
    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    pub async fn chat(&self, messages: &[ConversationTurn]) -> ConsultResult<String> {
        self.backend.chat(messages).await
    }

    /// Single-message completion, used by the summarizer and the oracle.
    pub async fn ask(&self, prompt: impl Into<String>) -> ConsultResult<String> {
        self.backend.chat(&[ConversationTurn::user(prompt)]).await
    }

    pub async fn chat_stream(
        &self,
        messages: &[ConversationTurn],
    ) -> ConsultResult<(mpsc::Receiver<StreamEvent>, JoinHandle<ConsultResult<String>>)> {
        self.backend.chat_stream(messages).await
    }
}
