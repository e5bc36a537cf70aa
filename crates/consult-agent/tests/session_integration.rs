//! End-to-end tests for the conversation driver and the session loop, driven by
//! scripted chat, oracle, summarizer and retrieval fakes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use consult_agent::backends::LlmBackend;
use consult_agent::{
    ChatSession, CompletionOracle, ConversationDriver, InputSource, LlmClient, NoFollowUps,
    NullSink, OutputSink, SessionConfig, SessionMode, SessionRunner, SessionServices,
    StreamEvent, Summarizer, TurnBudget, TurnStatus, Verdict,
};
use consult_core::{ConsultError, ConsultResult, ConversationTurn};
use consult_memory::{
    EmbeddingProvider, IndexStats, QueryRequest, Retriever, VectorMatch, VectorStore,
};
use consult_session::{
    ActivityLog, NoopRenderer, ReportRenderer, BUSINESS_REPORT_FILE, CLEANED_TRANSCRIPT_FILE,
    IMPLEMENTATION_PLAN_FILE,
};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Streams `"<prefix> <n>"` for the n-th call, split into two chunks.
struct CountingChat {
    calls: AtomicUsize,
    last_messages: Mutex<Vec<ConversationTurn>>,
}

impl CountingChat {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        })
    }
}

struct SharedChat(Arc<CountingChat>);

#[async_trait]
impl LlmBackend for SharedChat {
    async fn chat(&self, _messages: &[ConversationTurn]) -> ConsultResult<String> {
        Err(ConsultError::Model("non-streaming chat not expected".into()))
    }

    async fn chat_stream(
        &self,
        messages: &[ConversationTurn],
    ) -> ConsultResult<(mpsc::Receiver<StreamEvent>, JoinHandle<ConsultResult<String>>)> {
        let n = self.0.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.0.last_messages.lock().unwrap() = messages.to_vec();

        let chunks = vec![format!("Reply {n}"), format!(" part {n}.")];
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(async move {
            let mut full = String::new();
            for chunk in chunks {
                full.push_str(&chunk);
                let _ = tx.send(StreamEvent::TextDelta { text: chunk }).await;
            }
            let _ = tx.send(StreamEvent::Done).await;
            Ok(full)
        });
        Ok((rx, handle))
    }
}

struct ScriptedOracle {
    script: Mutex<VecDeque<Verdict>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    fn new(script: Vec<Verdict>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionOracle for ScriptedOracle {
    async fn assess(&self, _accumulated_text: &str) -> Verdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Verdict::Complete)
    }
}

struct CountingSummarizer {
    calls: AtomicUsize,
}

#[async_trait]
impl Summarizer for CountingSummarizer {
    async fn summarize(&self, history: &str) -> String {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        format!("summary {n} of {} chars", history.len())
    }
}

/// Records every text it is asked to embed.
struct RecordingEmbedding {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl EmbeddingProvider for RecordingEmbedding {
    async fn embed(&self, text: &str) -> ConsultResult<Vec<f32>> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(vec![0.5, 0.5])
    }

    fn dimension(&self) -> Option<usize> {
        Some(2)
    }
}

struct OnePassageStore;

#[async_trait]
impl VectorStore for OnePassageStore {
    async fn stats(&self) -> ConsultResult<IndexStats> {
        Ok(IndexStats {
            total_vector_count: 1,
        })
    }

    async fn query(&self, _request: QueryRequest<'_>) -> ConsultResult<Vec<VectorMatch>> {
        Ok(vec![VectorMatch {
            id: "p1".into(),
            score: 0.8,
            metadata: HashMap::from([(
                "text".to_string(),
                serde_json::json!("Working capital drives survival"),
            )]),
        }])
    }
}

struct RecordingRenderer {
    rendered: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl ReportRenderer for RecordingRenderer {
    async fn render_pdf(&self, source: &Path) -> ConsultResult<Option<PathBuf>> {
        self.rendered.lock().unwrap().push(source.to_path_buf());
        Ok(None)
    }
}

#[derive(Default)]
struct RecordingSink {
    lines: Mutex<Vec<String>>,
    chunks: Mutex<Vec<String>>,
}

#[async_trait]
impl OutputSink for RecordingSink {
    async fn terminal(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    async fn stream(&self, chunk: &str) {
        self.chunks.lock().unwrap().push(chunk.to_string());
    }
}

struct ScriptedInput(VecDeque<String>);

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next_input(&mut self) -> ConsultResult<Option<String>> {
        Ok(self.0.pop_front())
    }
}

struct Fixture {
    tmp: TempDir,
    chat: Arc<CountingChat>,
    oracle: Arc<ScriptedOracle>,
    summarizer: Arc<CountingSummarizer>,
    embedder: Arc<RecordingEmbedding>,
    renderer: Arc<RecordingRenderer>,
}

impl Fixture {
    fn new(verdicts: Vec<Verdict>) -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            chat: CountingChat::new(),
            oracle: ScriptedOracle::new(verdicts),
            summarizer: Arc::new(CountingSummarizer {
                calls: AtomicUsize::new(0),
            }),
            embedder: Arc::new(RecordingEmbedding {
                seen: Mutex::new(Vec::new()),
            }),
            renderer: Arc::new(RecordingRenderer {
                rendered: Mutex::new(Vec::new()),
            }),
        }
    }

    fn runner(&self, mode: SessionMode) -> SessionRunner {
        self.runner_with(mode, self.renderer.clone())
    }

    fn runner_with(&self, mode: SessionMode, renderer: Arc<dyn ReportRenderer>) -> SessionRunner {
        let services = SessionServices {
            chat: Arc::new(LlmClient::from_backend(Box::new(SharedChat(
                self.chat.clone(),
            )))),
            summarizer: self.summarizer.clone(),
            oracle: self.oracle.clone(),
            retriever: Arc::new(Retriever::new(
                self.embedder.clone(),
                Arc::new(OnePassageStore),
                "pinecone",
                12,
            )),
            renderer,
        };
        let mut config = SessionConfig::new(self.tmp.path());
        config.mode = mode;
        SessionRunner::new(services, config)
    }

    fn out(&self, name: &str) -> PathBuf {
        self.tmp.path().join(name)
    }
}

// ---------------------------------------------------------------------------
// Conversation driver
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scripted_verdicts_drive_three_chat_and_three_oracle_calls() {
    let fx = Fixture::new(vec![
        Verdict::from_oracle_text("NOT DONE"),
        Verdict::from_oracle_text("not done, table is cut off"),
        Verdict::from_oracle_text("done"),
    ]);
    let log = Arc::new(
        ActivityLog::create(fx.tmp.path(), chrono::Local::now())
            .await
            .unwrap(),
    );
    let sink = Arc::new(RecordingSink::default());
    let driver = ConversationDriver::new(
        Arc::new(LlmClient::from_backend(Box::new(SharedChat(fx.chat.clone())))),
        fx.oracle.clone(),
        sink.clone(),
        log.clone(),
        TurnBudget::default(),
    );
    let mut chat = ChatSession::new();

    let outcome = driver
        .run_turn(&mut chat, "Analyse cash flow", "continue with your response", "ctx")
        .await
        .unwrap();

    assert_eq!(fx.chat.calls.load(Ordering::SeqCst), 3);
    assert_eq!(fx.oracle.calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.status, TurnStatus::Complete);
    assert_eq!(
        outcome.text,
        "Reply 1 part 1.Reply 2 part 2.Reply 3 part 3."
    );
    assert_eq!(sink.chunks.lock().unwrap().concat(), outcome.text);

    let log_text = tokio::fs::read_to_string(log.path()).await.unwrap();
    assert!(log_text.contains("- PROMPT: Formatted prompt sent to chat model:"));
    assert_eq!(log_text.matches("Completeness check: NOT DONE").count(), 2);
    assert_eq!(log_text.matches("Completeness check: DONE").count(), 1);
}

#[tokio::test]
async fn oracle_error_ends_turn_after_one_iteration() {
    let fx = Fixture::new(vec![Verdict::OracleError("429 from judge".into())]);
    let log = Arc::new(
        ActivityLog::create(fx.tmp.path(), chrono::Local::now())
            .await
            .unwrap(),
    );
    let driver = ConversationDriver::new(
        Arc::new(LlmClient::from_backend(Box::new(SharedChat(fx.chat.clone())))),
        fx.oracle.clone(),
        Arc::new(NullSink),
        log,
        TurnBudget::default(),
    );

    let outcome = driver
        .run_turn(&mut ChatSession::new(), "P", "continue with your response", "")
        .await
        .unwrap();

    assert!(matches!(outcome.status, TurnStatus::OracleError(_)));
    assert_eq!(fx.chat.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.oracle.calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exit_as_first_input_runs_nothing() {
    let fx = Fixture::new(vec![]);
    let runner = fx.runner(SessionMode::Interactive);

    let outcome = runner
        .run_session("EXIT", &mut NoFollowUps, Arc::new(NullSink))
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 0);
    assert_eq!(outcome.turns, 0);
    assert!(outcome.final_report.is_none());
    assert_eq!(fx.chat.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fx.oracle.calls.load(Ordering::SeqCst), 0);
    for name in [
        BUSINESS_REPORT_FILE,
        IMPLEMENTATION_PLAN_FILE,
        CLEANED_TRANSCRIPT_FILE,
    ] {
        assert!(!fx.out(name).exists(), "{name} should not exist");
    }
}

#[tokio::test]
async fn single_shot_round_runs_nine_steps_and_writes_reports() {
    let fx = Fixture::new(vec![]);
    let runner = fx.runner(SessionMode::SingleShot);
    let sink = Arc::new(RecordingSink::default());

    let outcome = runner
        .run_session(
            "Our bakery chain is losing money",
            &mut ScriptedInput(VecDeque::from(["never asked".to_string()])),
            sink.clone(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.turns, 9);
    assert_eq!(fx.chat.calls.load(Ordering::SeqCst), 9);
    assert_eq!(fx.oracle.calls.load(Ordering::SeqCst), 9);
    assert_eq!(fx.summarizer.calls.load(Ordering::SeqCst), 8);

    // The rewrite step is the 8th chat call, the implementation the 9th.
    assert_eq!(outcome.final_report.as_deref(), Some("Reply 8 part 8."));
    assert_eq!(
        tokio::fs::read_to_string(fx.out(BUSINESS_REPORT_FILE))
            .await
            .unwrap(),
        "Reply 8 part 8."
    );
    assert_eq!(
        tokio::fs::read_to_string(fx.out(IMPLEMENTATION_PLAN_FILE))
            .await
            .unwrap(),
        "Reply 9 part 9."
    );

    let cleaned = tokio::fs::read_to_string(fx.out(CLEANED_TRANSCRIPT_FILE))
        .await
        .unwrap();
    assert!(cleaned.starts_with("User: Our bakery chain is losing money\n"));
    assert!(cleaned.lines().all(|l| !l.starts_with('[')));
    assert_eq!(cleaned.matches("Assistant: ").count(), 9);

    let rendered = fx.renderer.rendered.lock().unwrap();
    assert_eq!(
        rendered.as_slice(),
        [
            fx.out(BUSINESS_REPORT_FILE),
            fx.out(IMPLEMENTATION_PLAN_FILE),
            fx.out(CLEANED_TRANSCRIPT_FILE),
        ]
    );

    // One chat handle per round: the last step sees all earlier exchanges.
    assert_eq!(fx.chat.last_messages.lock().unwrap().len(), 17);

    let lines = sink.lines.lock().unwrap();
    assert_eq!(lines[0], "Welcome to the Business Consulting AI Chatbot!");
    assert_eq!(
        lines.last().map(String::as_str),
        Some("Thank you for using the Business Consulting AI Chatbot!")
    );
}

#[tokio::test]
async fn retrieval_is_keyed_on_the_prompt_about_to_be_sent() {
    let fx = Fixture::new(vec![]);
    let runner = fx.runner(SessionMode::SingleShot);

    runner
        .run_session("Supplier costs doubled", &mut NoFollowUps, Arc::new(NullSink))
        .await
        .unwrap();

    let plan = &runner.config().plan;
    let seen = fx.embedder.seen.lock().unwrap();
    assert_eq!(seen.len(), 9);
    assert_eq!(seen[0], "Supplier costs doubled\n\nContext:");
    assert!(seen[1].starts_with(plan.analysis[1].template.trim_start()));
    assert!(seen[1].ends_with("Context: summary 1 of 58 chars"));
    assert!(seen[8].starts_with(plan.implementation.template.trim()));
    assert!(seen[8].contains("Context: summary 8 of"));
}

#[tokio::test]
async fn interactive_session_runs_until_exit() {
    let fx = Fixture::new(vec![]);
    let runner = fx.runner(SessionMode::Interactive);

    let outcome = runner
        .run_session(
            "First problem",
            &mut ScriptedInput(VecDeque::from([
                "Second problem".to_string(),
                "exit".to_string(),
                "ignored".to_string(),
            ])),
            Arc::new(NullSink),
        )
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.turns, 18);
    assert_eq!(fx.chat.calls.load(Ordering::SeqCst), 18);

    // A fresh chat handle per round.
    assert_eq!(fx.chat.last_messages.lock().unwrap().len(), 17);
}

#[tokio::test]
async fn end_of_input_ends_session() {
    let fx = Fixture::new(vec![]);
    let runner = fx.runner(SessionMode::Interactive);

    let outcome = runner
        .run_session("Only question", &mut NoFollowUps, Arc::new(NullSink))
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 1);
    assert_eq!(
        outcome
            .artifacts
            .iter()
            .filter(|p| p.extension().is_some_and(|e| e == "md"))
            .count(),
        3
    );
}

#[tokio::test]
async fn noop_renderer_keeps_markdown_only() {
    let fx = Fixture::new(vec![]);
    let runner = fx.runner_with(SessionMode::SingleShot, Arc::new(NoopRenderer));

    let outcome = runner
        .run_session("q", &mut NoFollowUps, Arc::new(NullSink))
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 3);
    assert!(!fx.out("Final_Business_Report.pdf").exists());
}
