use super::LlmBackend;
use crate::config::ModelConfig;
use crate::stream::{drain_sse_data, StreamEvent};
use async_trait::async_trait;
use consult_core::{ConsultError, ConsultResult, ConversationTurn, Role};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Google Gemini via the Generative Language REST API.
pub struct GeminiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{method}",
            self.config.base_url(),
            self.config.model_id
        )
    }

    fn build_body(&self, messages: &[ConversationTurn]) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = messages
            .iter()
            .map(|turn| {
                let role = match turn.role() {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": turn.text() }],
                })
            })
            .collect();

        serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens,
            },
        })
    }

    async fn post(&self, url: &str, messages: &[ConversationTurn]) -> ConsultResult<reqwest::Response> {
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.build_body(messages))
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
                "Gemini API error {status}: {error_body}"
            )));
        }
        Ok(resp)
    }
}

/// Concatenate the text parts of the first candidate.
///
/// A blocked prompt yields no candidates and is reported as an error; a candidate
/// without text parts yields an empty string.
pub fn extract_text(body: &serde_json::Value) -> ConsultResult<String> {
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Err(ConsultError::Model(format!("prompt blocked: {reason}")));
    }
    if let Some(err) = body["error"]["message"].as_str() {
        return Err(ConsultError::Model(err.to_string()));
    }

    let text = body["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default();
    Ok(text)
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn chat(&self, messages: &[ConversationTurn]) -> ConsultResult<String> {
        let resp = self.post(&self.endpoint("generateContent"), messages).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ConsultError::Http(e.to_string()))?;
        extract_text(&body)
    }

    async fn chat_stream(
        &self,
        messages: &[ConversationTurn],
    ) -> ConsultResult<(mpsc::Receiver<StreamEvent>, JoinHandle<ConsultResult<String>>)> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let resp = self.post(&url, messages).await?;

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
                    let event: serde_json::Value = match serde_json::from_str(&data) {
                        Ok(v) => v,
                        Err(e) => {
                            debug!(error = %e, "Skipping unparseable SSE payload");
                            continue;
                        }
                    };

                    let text = match extract_text(&event) {
                        Ok(t) => t,
                        Err(e) => {
                            warn!(error = %e, "Gemini stream reported an error");
                            let _ = tx
                                .send(StreamEvent::Error {
                                    message: e.to_string(),
                                })
                                .await;
                            return Err(e);
                        }
                    };

                    if !text.is_empty() {
                        full_text.push_str(&text);
                        let _ = tx.send(StreamEvent::TextDelta { text }).await;
                    }
                }
            }

            let _ = tx.send(StreamEvent::Done).await;
            Ok(full_text)
        });

        Ok((rx, handle))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> GeminiBackend {
        let mut config = ModelConfig::new(LlmProvider::Gemini, "gemini-1.5-pro");
        config.api_key = "g-key".into();
        config.api_base_url = Some(server.uri());
        GeminiBackend::new(config)
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Cash " }, { "text": "flow" }] } }]
        });
        assert_eq!(extract_text(&body).unwrap(), "Cash flow");
    }

    #[test]
    fn test_extract_text_blocked_prompt() {
        let body = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(extract_text(&body).is_err());
    }

    #[test]
    fn test_extract_text_missing_candidates_is_empty() {
        assert_eq!(extract_text(&serde_json::json!({})).unwrap(), "");
    }

    #[test]
    fn test_body_maps_roles() {
        let backend = GeminiBackend::new(ModelConfig::new(LlmProvider::Gemini, "m"));
        let body = backend.build_body(&[
            ConversationTurn::user("q"),
            ConversationTurn::assistant("a"),
        ]);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "a");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[tokio::test]
    async fn test_chat_posts_generate_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Is this DONE?" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "DONE" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = backend(&server)
            .chat(&[ConversationTurn::user("Is this DONE?")])
            .await
            .unwrap();
        assert_eq!(text, "DONE");
    }

    #[tokio::test]
    async fn test_chat_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .chat(&[ConversationTurn::user("q")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_stream_yields_chunks_in_order() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Step one. \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Step two.\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-pro:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let (mut rx, handle) = backend(&server)
            .chat_stream(&[ConversationTurn::user("plan")])
            .await
            .unwrap();

        let mut deltas = Vec::new();
        let mut done = false;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta { text } => deltas.push(text),
                StreamEvent::Done => done = true,
                StreamEvent::Error { message } => panic!("unexpected error: {message}"),
            }
        }

        assert_eq!(deltas, vec!["Step one. ", "Step two."]);
        assert!(done);
        assert_eq!(handle.await.unwrap().unwrap(), "Step one. Step two.");
    }

    /// Serves one chunked SSE response, flushing each part separately.
    async fn serve_chunked(parts: Vec<Vec<u8>>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
                )
                .await
                .unwrap();
            for part in parts {
                socket
                    .write_all(format!("{:x}\r\n", part.len()).as_bytes())
                    .await
                    .unwrap();
                socket.write_all(&part).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            socket.flush().await.unwrap();
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_stream_keeps_character_split_across_chunks() {
        let body = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"café\"}]}}]}\n\n"
            .as_bytes()
            .to_vec();
        let cut = body.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let base = serve_chunked(vec![body[..cut].to_vec(), body[cut..].to_vec()]).await;

        let mut config = ModelConfig::new(LlmProvider::Gemini, "gemini-1.5-pro");
        config.api_key = "g-key".into();
        config.api_base_url = Some(base);

        let (mut rx, handle) = GeminiBackend::new(config)
            .chat_stream(&[ConversationTurn::user("menu")])
            .await
            .unwrap();

        let mut deltas = Vec::new();
        while let Some(event) = rx.recv().await {
            if let StreamEvent::TextDelta { text } = event {
                deltas.push(text);
            }
        }

        assert_eq!(deltas, vec!["café"]);
        assert_eq!(handle.await.unwrap().unwrap(), "café");
    }
}
