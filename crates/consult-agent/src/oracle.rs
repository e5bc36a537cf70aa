use crate::llm::LlmClient;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const COMPLETENESS_PROMPT: &str = include_str!("../prompts/completeness.md");

/// Judgement on whether an accumulated response is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Complete,
    Incomplete,
    /// The judge failed or said nothing. Callers stop continuing.
    OracleError(String),
}

impl Verdict {
    /// Interpret a judge reply: `NOT DONE` anywhere (any case) means incomplete,
    /// blank means error, anything else means complete.
    pub fn from_oracle_text(text: &str) -> Self {
        if text.trim().is_empty() {
            Verdict::OracleError("empty response from oracle model".to_string())
        } else if text.to_uppercase().contains("NOT DONE") {
            Verdict::Incomplete
        } else {
            Verdict::Complete
        }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, Verdict::Incomplete)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Complete => write!(f, "DONE"),
            Verdict::Incomplete => write!(f, "NOT DONE"),
            Verdict::OracleError(reason) => write!(f, "oracle error: {reason}"),
        }
    }
}

/// Decides whether the chat model should be asked to continue.
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    /// Never fails; problems are reported as [`Verdict::OracleError`].
    async fn assess(&self, accumulated_text: &str) -> Verdict;
}

/// Oracle backed by a (usually small, fast) language model.
pub struct LlmOracle {
    client: Arc<LlmClient>,
}

impl LlmOracle {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }

    pub fn prompt_for(accumulated_text: &str) -> String {
        COMPLETENESS_PROMPT.replace("{response}", accumulated_text)
    }
}

#[async_trait]
impl CompletionOracle for LlmOracle {
    async fn assess(&self, accumulated_text: &str) -> Verdict {
        match self.client.ask(Self::prompt_for(accumulated_text)).await {
            Ok(reply) => {
                let verdict = Verdict::from_oracle_text(&reply);
                debug!(reply = %reply.trim(), %verdict, "Completeness check");
                verdict
            }
            Err(e) => {
                warn!(error = %e, "Completeness check failed");
                Verdict::OracleError(e.to_string())
            }
        }
    }
}
