//! The fixed prompt catalogue and the order a round walks through it.

use std::fmt;

/// Default continuation message.
pub const CONTINUE: &str = "continue with your response";
/// Continuation message for the evaluation-heavy third analysis prompt.
pub const CONTINUE_EVALUATIONS: &str = "Continue with evaluations";

/// Placeholder in the first analysis prompt replaced by the user's query.
pub const USER_QUERY_SLOT: &str = "{user_query}";

const ANALYSIS_1: &str = include_str!("../prompts/analysis_1.md");
const ANALYSIS_2: &str = include_str!("../prompts/analysis_2.md");
const ANALYSIS_3: &str = include_str!("../prompts/analysis_3.md");
const ANALYSIS_4: &str = include_str!("../prompts/analysis_4.md");
const ANALYSIS_5: &str = include_str!("../prompts/analysis_5.md");
const CRITIQUE: &str = include_str!("../prompts/critique.md");
const CONTINUE_CRITIQUE: &str = include_str!("../prompts/continue_critique.md");
const REWRITE: &str = include_str!("../prompts/rewrite.md");
const IMPLEMENTATION: &str = include_str!("../prompts/implementation.md");

/// A prompt template plus the message used to ask for more of its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub name: String,
    pub template: String,
    pub continuation: String,
}

impl PromptSpec {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        continuation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            continuation: continuation.into(),
        }
    }

    /// Fill the `{user_query}` slot, if the template has one.
    pub fn render(&self, user_query: &str) -> String {
        self.template.replace(USER_QUERY_SLOT, user_query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// 1-based index into the analysis prompts.
    Analysis(usize),
    /// 1-based index into the critique prompts.
    Critique(usize),
    /// Produces the final business report.
    Rewrite,
    /// Produces the implementation plan.
    Implementation,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Analysis(n) => write!(f, "analysis {n}"),
            StepKind::Critique(n) => write!(f, "critique {n}"),
            StepKind::Rewrite => write!(f, "rewrite"),
            StepKind::Implementation => write!(f, "implementation"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    pub kind: StepKind,
    pub prompt: &'a PromptSpec,
}

/// Ordered prompts for one round: analyses, critiques, rewrite, implementation.
#[derive(Debug, Clone)]
pub struct RoundPlan {
    pub analysis: Vec<PromptSpec>,
    pub critiques: Vec<PromptSpec>,
    pub rewrite: PromptSpec,
    pub implementation: PromptSpec,
}

impl RoundPlan {
    pub fn steps(&self) -> Vec<Step<'_>> {
        let analysis = self.analysis.iter().enumerate().map(|(i, prompt)| Step {
            kind: StepKind::Analysis(i + 1),
            prompt,
        });
        let critiques = self.critiques.iter().enumerate().map(|(i, prompt)| Step {
            kind: StepKind::Critique(i + 1),
            prompt,
        });

        analysis
            .chain(critiques)
            .chain([
                Step {
                    kind: StepKind::Rewrite,
                    prompt: &self.rewrite,
                },
                Step {
                    kind: StepKind::Implementation,
                    prompt: &self.implementation,
                },
            ])
            .collect()
    }

    pub fn step_count(&self) -> usize {
        self.analysis.len() + self.critiques.len() + 2
    }
}

impl Default for RoundPlan {
    fn default() -> Self {
        Self {
            analysis: vec![
                PromptSpec::new("PROMPT_1", ANALYSIS_1, CONTINUE),
                PromptSpec::new("PROMPT_2", ANALYSIS_2, CONTINUE),
                PromptSpec::new("PROMPT_3", ANALYSIS_3, CONTINUE_EVALUATIONS),
                PromptSpec::new("PROMPT_4", ANALYSIS_4, CONTINUE),
                PromptSpec::new("PROMPT_5", ANALYSIS_5, CONTINUE),
            ],
            critiques: vec![
                PromptSpec::new("CRITIQUE_PROMPT", CRITIQUE, CONTINUE),
                PromptSpec::new("CONTINUE_CRITIQUE_PROMPT", CONTINUE_CRITIQUE, CONTINUE),
            ],
            rewrite: PromptSpec::new("REWRITE_PROMPT", REWRITE, CONTINUE),
            implementation: PromptSpec::new("IMPLEMENTATION_PROMPT", IMPLEMENTATION, CONTINUE),
        }
    }
}
