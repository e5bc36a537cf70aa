use crate::chat::ChatSession;
use crate::driver::{ConversationDriver, TurnBudget, TurnStatus};
use crate::llm::LlmClient;
use crate::oracle::CompletionOracle;
use crate::prompts::{RoundPlan, StepKind};
use crate::sink::OutputSink;
use crate::summarizer::Summarizer;
use async_trait::async_trait;
use consult_core::{ConsultResult, ConversationTurn};
use consult_memory::Retriever;
use consult_session::{
    clean_transcript, ActivityLog, ReportRenderer, ReportWriter, SessionState, TranscriptFile,
    BUSINESS_REPORT_FILE, CLEANED_TRANSCRIPT_FILE, IMPLEMENTATION_PLAN_FILE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Supplies the user's follow-up messages between rounds.
#[async_trait]
pub trait InputSource: Send {
    /// Next message, or `None` when the user is gone.
    async fn next_input(&mut self) -> ConsultResult<Option<String>>;
}

/// An input source that never has anything more to say.
pub struct NoFollowUps;

#[async_trait]
impl InputSource for NoFollowUps {
    async fn next_input(&mut self) -> ConsultResult<Option<String>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Stop after the first round.
    SingleShot,
    /// Ask for more input after every round until `exit`.
    Interactive,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub output_dir: PathBuf,
    pub plan: RoundPlan,
    pub budget: TurnBudget,
    pub mode: SessionMode,
}

impl SessionConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            plan: RoundPlan::default(),
            budget: TurnBudget::default(),
            mode: SessionMode::Interactive,
        }
    }
}

/// Models and adapters a session talks to.
#[derive(Clone)]
pub struct SessionServices {
    pub chat: Arc<LlmClient>,
    pub summarizer: Arc<dyn Summarizer>,
    pub oracle: Arc<dyn CompletionOracle>,
    pub retriever: Arc<Retriever>,
    pub renderer: Arc<dyn ReportRenderer>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub rounds: u32,
    /// Conversation driver invocations across all rounds.
    pub turns: u32,
    /// Business report of the last completed round.
    pub final_report: Option<String>,
    /// Every file written or rendered, in order.
    pub artifacts: Vec<PathBuf>,
}

struct RoundResult {
    turns: u32,
    report: String,
    artifacts: Vec<PathBuf>,
}

/// Everything a round needs that lives for the whole session.
struct SessionContext<'a> {
    state: SessionState,
    log: Arc<ActivityLog>,
    transcript: TranscriptFile,
    reports: ReportWriter,
    driver: ConversationDriver,
    sink: &'a Arc<dyn OutputSink>,
}

/// Drives whole sessions: rounds of the [`RoundPlan`] until the user exits.
pub struct SessionRunner {
    services: SessionServices,
    config: SessionConfig,
}

/// `exit` in any case, surrounding whitespace ignored.
pub fn is_exit(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("exit")
}

impl SessionRunner {
    pub fn new(services: SessionServices, config: SessionConfig) -> Self {
        Self { services, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn run_session(
        &self,
        initial_user_text: &str,
        input: &mut dyn InputSource,
        sink: Arc<dyn OutputSink>,
    ) -> ConsultResult<SessionOutcome> {
        let started = chrono::Local::now();
        let dir = self.config.output_dir.as_path();
        let log = Arc::new(ActivityLog::create(dir, started).await?);
        let driver = ConversationDriver::new(
            self.services.chat.clone(),
            self.services.oracle.clone(),
            sink.clone(),
            log.clone(),
            self.config.budget,
        );
        let mut ctx = SessionContext {
            state: SessionState::new(),
            log,
            transcript: TranscriptFile::create(dir, started).await?,
            reports: ReportWriter::new(dir),
            driver,
            sink: &sink,
        };

        let mut outcome = SessionOutcome {
            session_id: ctx.state.id,
            ..SessionOutcome::default()
        };

        info!(session_id = %ctx.state.id, mode = ?self.config.mode, "Starting consulting session");
        ctx.log.info("Starting Business Consulting AI Chatbot").await?;
        sink.terminal("Welcome to the Business Consulting AI Chatbot!")
            .await;

        let mut user_input = initial_user_text.to_string();
        while !is_exit(&user_input) {
            let round = self.run_round(&mut ctx, &user_input, outcome.rounds + 1).await?;
            outcome.rounds += 1;
            outcome.turns += round.turns;
            outcome.final_report = Some(round.report);
            outcome.artifacts.extend(round.artifacts);

            if self.config.mode == SessionMode::SingleShot {
                break;
            }
            match input.next_input().await? {
                Some(next) => {
                    ctx.log.info(&format!("User input: {next}")).await?;
                    user_input = next;
                }
                None => break,
            }
        }

        ctx.log
            .info("Business Consulting AI Chatbot session ended")
            .await?;
        info!(session_id = %outcome.session_id, rounds = outcome.rounds, turns = outcome.turns, "Session ended");
        sink.complete("Thank you for using the Business Consulting AI Chatbot!")
            .await;
        Ok(outcome)
    }

    async fn run_round(
        &self,
        ctx: &mut SessionContext<'_>,
        user_input: &str,
        round: u32,
    ) -> ConsultResult<RoundResult> {
        let user_turn = ConversationTurn::user(user_input);
        ctx.transcript.append(&user_turn).await?;
        ctx.state.push(user_turn);

        let mut chat = ChatSession::new();
        let mut result = RoundResult {
            turns: 0,
            report: String::new(),
            artifacts: Vec::new(),
        };

        for (index, step) in self.config.plan.steps().into_iter().enumerate() {
            let prompt = step.prompt.render(user_input);

            // The first step retrieves on the user's words; later steps refresh the
            // summary and retrieve on the prompt about to be sent.
            let context = if index == 0 {
                self.services
                    .retriever
                    .retrieve(user_input, ctx.state.summary())
                    .await
            } else {
                let summary = self.services.summarizer.summarize(ctx.state.history()).await;
                ctx.log
                    .info(&format!("Generated conversation summary: {summary}"))
                    .await?;
                ctx.state.set_summary(summary);
                self.services
                    .retriever
                    .retrieve(&prompt, ctx.state.summary())
                    .await
            };
            ctx.log
                .info("Vector database information retrieved")
                .await?;

            info!(session_id = %ctx.state.id, round, step = %step.kind, "Running step");
            let outcome = ctx
                .driver
                .run_turn(&mut chat, &prompt, &step.prompt.continuation, &context)
                .await?;
            result.turns += 1;
            if let TurnStatus::Incomplete(reason) = &outcome.status {
                warn!(step = %step.kind, ?reason, "Step ended before the response was complete");
            }
            ctx.log
                .info(&format!("Response for {} received", step.prompt.name))
                .await?;

            let turn = ConversationTurn::assistant(outcome.text.as_str());
            ctx.transcript.append(&turn).await?;
            ctx.state.push(turn);

            match step.kind {
                StepKind::Rewrite => {
                    let path = ctx.reports.write(BUSINESS_REPORT_FILE, &outcome.text).await?;
                    ctx.log
                        .info(&format!("Saved report to {}", path.display()))
                        .await?;
                    result.report = outcome.text;
                    result.artifacts.push(path);
                }
                StepKind::Implementation => {
                    let path = ctx
                        .reports
                        .write(IMPLEMENTATION_PLAN_FILE, &outcome.text)
                        .await?;
                    ctx.log
                        .info(&format!("Saved report to {}", path.display()))
                        .await?;
                    result.artifacts.push(path);
                }
                StepKind::Analysis(_) | StepKind::Critique(_) => {}
            }
        }

        ctx.sink
            .terminal(&format!(
                "Assistant: Analysis complete. Final reports have been saved to {}.",
                ctx.reports.dir().display()
            ))
            .await;
        ctx.log
            .info("Analysis complete. Final reports saved.")
            .await?;

        let cleaned = clean_transcript(&ctx.transcript.read().await?);
        let cleaned_path = ctx.reports.write(CLEANED_TRANSCRIPT_FILE, &cleaned).await?;
        result.artifacts.push(cleaned_path);

        let sources: Vec<PathBuf> = result.artifacts.clone();
        let mut rendered = 0;
        for source in &sources {
            if let Some(pdf) = self.render(ctx, source).await? {
                result.artifacts.push(pdf);
                rendered += 1;
            }
        }
        if rendered > 0 {
            ctx.sink
                .terminal("PDFs have been generated for the final reports and conversation transcript.")
                .await;
            ctx.log
                .info("PDFs generated for final reports and conversation transcript.")
                .await?;
        }

        Ok(result)
    }

    /// Render failures are logged and skipped; the markdown stays on disk.
    async fn render(
        &self,
        ctx: &SessionContext<'_>,
        source: &Path,
    ) -> ConsultResult<Option<PathBuf>> {
        match self.services.renderer.render_pdf(source).await {
            Ok(pdf) => Ok(pdf),
            Err(e) => {
                ctx.log
                    .error(&format!("PDF conversion failed for {}: {e}", source.display()))
                    .await?;
                Ok(None)
            }
        }
    }
}
