use async_trait::async_trait;

/// Where a running session sends user-visible output.
///
/// The terminal binary prints; the gateway turns each call into a WebSocket frame
/// for the connection that started the session.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// A status line.
    async fn terminal(&self, line: &str);

    /// One streamed chunk of model output.
    async fn stream(&self, chunk: &str);

    /// The current streamed response has ended.
    async fn stream_end(&self) {}

    /// The session finished; `summary` is a short closing message.
    async fn complete(&self, summary: &str) {
        self.terminal(summary).await;
    }
}

/// Discards everything.
pub struct NullSink;

#[async_trait]
impl OutputSink for NullSink {
    async fn terminal(&self, _line: &str) {}

    async fn stream(&self, _chunk: &str) {}
}
