//! Prompt orchestration for the consulting workflow.
//!
//! A *turn* streams one prompt (wrapped with retrieved context) to the chat model and
//! keeps issuing continuation prompts while the [`CompletionOracle`] judges the answer
//! unfinished. A *round* runs the fixed [`RoundPlan`] of nine turns on one chat handle,
//! refreshing the conversation summary and retrieval before every step, then persists
//! the business report and implementation plan.

/// Provider backends behind [`backends::LlmBackend`].
pub mod backends;
/// Chat handle replaying history on every send.
pub mod chat;
/// Model configuration.
pub mod config;
/// One prompt driven to completion.
pub mod driver;
/// Provider-agnostic client.
pub mod llm;
/// Completeness verdicts.
pub mod oracle;
/// Prompt catalogue and round plan.
pub mod prompts;
/// Session loop.
pub mod runner;
/// Output sinks.
pub mod sink;
/// Streaming events.
pub mod stream;
/// Conversation summarization.
pub mod summarizer;

pub use chat::ChatSession;
pub use config::{LlmProvider, ModelConfig};
pub use driver::{
    format_turn_prompt, BudgetLimit, ConversationDriver, IncompleteReason, TurnBudget,
    TurnOutcome, TurnStatus,
};
pub use llm::LlmClient;
pub use oracle::{CompletionOracle, LlmOracle, Verdict};
pub use prompts::{PromptSpec, RoundPlan, Step, StepKind};
pub use runner::{
    is_exit, InputSource, NoFollowUps, SessionConfig, SessionMode, SessionOutcome, SessionRunner,
    SessionServices,
};
pub use sink::{NullSink, OutputSink};
pub use stream::StreamEvent;
pub use summarizer::{LlmSummarizer, Summarizer};
