use crate::llm::LlmClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

const SUMMARY_PROMPT: &str = include_str!("../prompts/summary.md");

/// Returned when the summarization model answers with nothing.
pub const EMPTY_SUMMARY: &str = "Error: Empty response from summarization model";
/// Prefix of the text returned when the summarization call fails.
pub const SUMMARY_ERROR_PREFIX: &str = "Error in summarize_conversation";

/// Produces the running conversation summary used to steer retrieval.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize the conversation history. Failures come back as descriptive text.
    async fn summarize(&self, history: &str) -> String;
}

pub struct LlmSummarizer {
    client: Arc<LlmClient>,
}

impl LlmSummarizer {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }

    pub fn prompt_for(history: &str) -> String {
        SUMMARY_PROMPT.replace("{conversation}", history)
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, history: &str) -> String {
        match self.client.ask(Self::prompt_for(history)).await {
            Ok(text) if text.trim().is_empty() => EMPTY_SUMMARY.to_string(),
            Ok(text) => {
                info!(len = text.len(), "Generated conversation summary");
                text
            }
            Err(e) => {
                let message = format!("{SUMMARY_ERROR_PREFIX}: {e}");
                error!("{message}");
                message
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{LlmProvider, ModelConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn summarizer_with(response: ResponseTemplate) -> (MockServer, LlmSummarizer) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .respond_with(response)
            .mount(&server)
            .await;

        let mut config = ModelConfig::new(LlmProvider::Gemini, "gemini-1.5-flash");
        config.api_base_url = Some(server.uri());
        let client = Arc::new(LlmClient::new(config));
        (server, LlmSummarizer::new(client))
    }

    #[test]
    fn test_prompt_contains_history() {
        let prompt = LlmSummarizer::prompt_for("User: margins are falling\n\n");
        assert!(prompt.contains("Conversation transcript:\nUser: margins are falling"));
        assert!(prompt.trim_end().ends_with("Summary:"));
    }

    #[tokio::test]
    async fn test_summary_text_is_returned_verbatim() {
        let (_server, summarizer) = summarizer_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "Retail chain, 8% margin. Keywords: pricing" }] } }]
            })),
        )
        .await;

        assert_eq!(
            summarizer.summarize("User: hi\n\n").await,
            "Retail chain, 8% margin. Keywords: pricing"
        );
    }

    #[tokio::test]
    async fn test_empty_reply_sentinel() {
        let (_server, summarizer) = summarizer_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
        )
        .await;

        assert_eq!(summarizer.summarize("x").await, EMPTY_SUMMARY);
    }

    #[tokio::test]
    async fn test_error_sentinel() {
        let (_server, summarizer) =
            summarizer_with(ResponseTemplate::new(500).set_body_string("boom")).await;

        let text = summarizer.summarize("x").await;
        assert!(text.starts_with("Error in summarize_conversation: "));
        assert!(text.contains("500"));
    }
}
