use super::LlmBackend;
use crate::config::ModelConfig;
use crate::stream::{drain_sse_data, StreamEvent};
use async_trait::async_trait;
use consult_core::{ConsultError, ConsultResult, ConversationTurn, Role};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// OpenAI chat completions and compatible servers.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(&self, messages: &[ConversationTurn]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|turn| {
                let role = match turn.role() {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                serde_json::json!({ "role": role, "content": turn.text() })
            })
            .collect()
    }

    async fn post(&self, messages: &[ConversationTurn], stream: bool) -> ConsultResult<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": self.build_messages(messages),
            "stream": stream,
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ConsultError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ConsultError::Model(format!(
                "OpenAI API error {status}: {error_body}"
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(&self, messages: &[ConversationTurn]) -> ConsultResult<String> {
        let resp = self.post(messages, false).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ConsultError::Http(e.to_string()))?;

        Ok(body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn chat_stream(
        &self,
        messages: &[ConversationTurn],
    ) -> ConsultResult<(mpsc::Receiver<StreamEvent>, JoinHandle<ConsultResult<String>>)> {
        let resp = self.post(messages, true).await?;

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut stream = byte_stream;
            let mut buffer: Vec<u8> = Vec::new();
            let mut full_text = String::new();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: format!("Stream read error: {e}"),
                            })
                            .await;
                        return Err(ConsultError::Http(format!("Stream read error: {e}")));
                    }
                };

                buffer.extend_from_slice(&chunk);

                for data in drain_sse_data(&mut buffer) {
                    if data == "[DONE]" {
                        continue;
                    }
                    let event: serde_json::Value = match serde_json::from_str(&data) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    if let Some(content) = event["choices"][0]["delta"]["content"].as_str() {
                        if !content.is_empty() {
                            full_text.push_str(content);
                            let _ = tx
                                .send(StreamEvent::TextDelta {
                                    text: content.to_string(),
                                })
                                .await;
                        }
                    }
                }
            }

            let _ = tx.send(StreamEvent::Done).await;
            Ok(full_text)
        });

        Ok((rx, handle))
    }
}
