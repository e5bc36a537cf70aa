use crate::chat::ChatSession;
use crate::llm::LlmClient;
use crate::oracle::{CompletionOracle, Verdict};
use crate::sink::OutputSink;
use crate::stream::StreamEvent;
use consult_core::{ConsultError, ConsultResult};
use consult_session::ActivityLog;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Text substituted for a chat exchange that failed.
pub const CHAT_FAILED: &str = "Error generating response from chat model";

/// Wrap a prompt and its retrieved context into the message sent to the chat model.
pub fn format_turn_prompt(prompt: &str, context_text: &str) -> String {
    format!(
        "\n{prompt}\nPlease utilize the following lessons and concepts from our business textbook database to assist in your answer:\n<database>\n{context_text}\n</database>\n"
    )
}

/// Limits on how long a single turn may keep asking for more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnBudget {
    /// Continuation prompts allowed after the first exchange.
    pub max_continuations: u32,
    /// Wall-clock limit for the whole turn, including oracle calls.
    pub max_duration: Option<Duration>,
}

impl Default for TurnBudget {
    fn default() -> Self {
        Self {
            max_continuations: 8,
            max_duration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetLimit {
    Continuations,
    WallClock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteReason {
    BudgetExhausted(BudgetLimit),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// The oracle judged the response finished.
    Complete,
    /// The oracle still wanted more when the budget ran out.
    Incomplete(IncompleteReason),
    /// The oracle failed; the response is taken as it stands.
    OracleError(String),
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Every streamed chunk of every exchange in the turn, in order.
    pub text: String,
    pub status: TurnStatus,
    pub chat_calls: u32,
    pub oracle_calls: u32,
}

/// Aborts the streaming task if the turn is dropped mid-stream.
struct StreamTask(JoinHandle<ConsultResult<String>>);

impl StreamTask {
    async fn finish(&mut self) -> ConsultResult<String> {
        (&mut self.0)
            .await
            .map_err(|e| ConsultError::Model(format!("stream task failed: {e}")))?
    }
}

impl Drop for StreamTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs one turn: send, ask the oracle, continue while it says the answer is unfinished.
pub struct ConversationDriver {
    chat: Arc<LlmClient>,
    oracle: Arc<dyn CompletionOracle>,
    sink: Arc<dyn OutputSink>,
    log: Arc<ActivityLog>,
    budget: TurnBudget,
}

impl ConversationDriver {
    pub fn new(
        chat: Arc<LlmClient>,
        oracle: Arc<dyn CompletionOracle>,
        sink: Arc<dyn OutputSink>,
        log: Arc<ActivityLog>,
        budget: TurnBudget,
    ) -> Self {
        Self {
            chat,
            oracle,
            sink,
            log,
            budget,
        }
    }

    pub fn budget(&self) -> TurnBudget {
        self.budget
    }

    /// Run a turn on `chat`.
    ///
    /// Chat failures become [`CHAT_FAILED`] text and oracle failures end the loop;
    /// only activity-log I/O errors are returned.
    pub async fn run_turn(
        &self,
        chat: &mut ChatSession,
        prompt: &str,
        continuation_prompt: &str,
        context_text: &str,
    ) -> ConsultResult<TurnOutcome> {
        let started = Instant::now();
        let message = format_turn_prompt(prompt, context_text);
        self.log
            .prompt(&format!("Formatted prompt sent to chat model: {message}"))
            .await?;

        let mut outcome = TurnOutcome {
            text: String::new(),
            status: TurnStatus::Complete,
            chat_calls: 0,
            oracle_calls: 0,
        };

        let Some(first) = self
            .within_budget(started, self.exchange(chat, &message))
            .await
        else {
            return self.exhausted(outcome, BudgetLimit::WallClock).await;
        };
        outcome.text.push_str(&first?);
        outcome.chat_calls += 1;

        loop {
            let Some(verdict) = self
                .within_budget(started, self.oracle.assess(&outcome.text))
                .await
            else {
                return self.exhausted(outcome, BudgetLimit::WallClock).await;
            };
            outcome.oracle_calls += 1;
            self.log
                .info(&format!("Completeness check: {verdict}"))
                .await?;
            debug!(chat_id = %chat.id(), iteration = outcome.oracle_calls, %verdict, "Oracle verdict");

            match verdict {
                Verdict::Complete => {
                    outcome.status = TurnStatus::Complete;
                    return Ok(outcome);
                }
                Verdict::OracleError(reason) => {
                    self.log
                        .warning(&format!(
                            "Completeness check failed, keeping response as is: {reason}"
                        ))
                        .await?;
                    outcome.status = TurnStatus::OracleError(reason);
                    return Ok(outcome);
                }
                Verdict::Incomplete => {}
            }

            let continuations = outcome.chat_calls - 1;
            if continuations >= self.budget.max_continuations {
                return self.exhausted(outcome, BudgetLimit::Continuations).await;
            }

            let Some(more) = self
                .within_budget(started, self.exchange(chat, continuation_prompt))
                .await
            else {
                return self.exhausted(outcome, BudgetLimit::WallClock).await;
            };
            outcome.text.push_str(&more?);
            outcome.chat_calls += 1;
        }
    }

    async fn within_budget<F: Future>(&self, started: Instant, fut: F) -> Option<F::Output> {
        match self.budget.max_duration {
            None => Some(fut.await),
            Some(max) => {
                let remaining = max.checked_sub(started.elapsed())?;
                tokio::time::timeout(remaining, fut).await.ok()
            }
        }
    }

    async fn exhausted(
        &self,
        mut outcome: TurnOutcome,
        limit: BudgetLimit,
    ) -> ConsultResult<TurnOutcome> {
        warn!(?limit, chat_calls = outcome.chat_calls, "Turn budget exhausted");
        self.log
            .warning(&format!(
                "Turn budget exhausted ({limit:?}) after {} chat calls; keeping partial response",
                outcome.chat_calls
            ))
            .await?;
        outcome.status = TurnStatus::Incomplete(IncompleteReason::BudgetExhausted(limit));
        Ok(outcome)
    }

    /// One streamed exchange on `chat`. Failures come back as [`CHAT_FAILED`].
    async fn exchange(&self, chat: &mut ChatSession, text: &str) -> ConsultResult<String> {
        self.log.info("Sending prompt to chat model").await?;
        match self.stream_reply(chat, text).await {
            Ok(reply) => {
                chat.record(text, &reply);
                info!(chat_id = %chat.id(), len = reply.len(), "Received response from chat model");
                self.log.info("Received response from chat model").await?;
                Ok(reply)
            }
            Err(e) => {
                // Chunks already streamed are superseded by the failure text.
                self.sink.terminal(CHAT_FAILED).await;
                self.log
                    .error(&format!("Error in chat exchange: {e}"))
                    .await?;
                Ok(CHAT_FAILED.to_string())
            }
        }
    }

    async fn stream_reply(&self, chat: &ChatSession, text: &str) -> ConsultResult<String> {
        let (mut rx, handle) = self.chat.chat_stream(&chat.outbound(text)).await?;
        let mut task = StreamTask(handle);

        let mut reply = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    self.sink.stream(&text).await;
                    reply.push_str(&text);
                }
                StreamEvent::Done => {}
                StreamEvent::Error { message } => warn!(%message, "Chat stream error"),
            }
        }
        self.sink.stream_end().await;

        task.finish().await?;
        Ok(reply)
    }
}
