use async_trait::async_trait;
use consult_core::{ConsultError, ConsultResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

pub const BUSINESS_REPORT_FILE: &str = "Final_Business_Report.md";
pub const IMPLEMENTATION_PLAN_FILE: &str = "Final_Implementation_Plan.md";
pub const CLEANED_TRANSCRIPT_FILE: &str = "Cleaned_Conversation_Transcript.md";

const PAGE_BREAK: &str = r#"<div class="page-break"></div>"#;
const RENDERABLE_EXTENSIONS: [&str; 3] = ["md", "txt", "log"];
const INPUT_SLOT: &str = "{input}";
const OUTPUT_SLOT: &str = "{output}";

/// Writes report artifacts into the output directory.
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write (or overwrite) `filename` and return its full path.
    pub async fn write(&self, filename: &str, content: &str) -> ConsultResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(filename);
        tokio::fs::write(&path, content).await?;
        info!(path = %path.display(), bytes = content.len(), "Saved report");
        Ok(path)
    }
}

/// Converts a markdown/text artifact into a PDF next to it.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Render `source`. Returns the PDF path, or `None` when rendering is disabled.
    async fn render_pdf(&self, source: &Path) -> ConsultResult<Option<PathBuf>>;
}

/// Renderer used when no converter is configured.
pub struct NoopRenderer;

#[async_trait]
impl ReportRenderer for NoopRenderer {
    async fn render_pdf(&self, source: &Path) -> ConsultResult<Option<PathBuf>> {
        info!(path = %source.display(), "PDF rendering disabled, skipping");
        Ok(None)
    }
}

/// `[renderer]` section of the config file.
///
/// `args` may contain `{input}` and `{output}` placeholders. With `{input}` the program
/// reads a pre-processed copy of the artifact written next to it; without it the
/// pre-processed markdown is piped to the program's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    pub program: String,
    #[serde(default = "default_renderer_args")]
    pub args: Vec<String>,
}

fn default_renderer_args() -> Vec<String> {
    ["-f", "markdown", "-o", "{output}"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl RendererConfig {
    pub fn pandoc() -> Self {
        Self {
            program: "pandoc".to_string(),
            args: default_renderer_args(),
        }
    }
}

/// Renders by piping pre-processed markdown into an external converter.
pub struct CommandRenderer {
    config: RendererConfig,
}

impl CommandRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Run the converter once. `input` is the staged file for `{input}` programs;
    /// otherwise `processed` goes to stdin.
    async fn convert(
        &self,
        input: Option<&Path>,
        output: &Path,
        processed: &str,
    ) -> ConsultResult<()> {
        let args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|a| {
                let a = match input {
                    Some(path) => a.replace(INPUT_SLOT, &path.to_string_lossy()),
                    None => a.clone(),
                };
                a.replace(OUTPUT_SLOT, &output.to_string_lossy())
            })
            .collect();

        let mut child = tokio::process::Command::new(&self.config.program)
            .args(&args)
            .stdin(if input.is_some() {
                Stdio::null()
            } else {
                Stdio::piped()
            })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ConsultError::Report(format!("failed to start {}: {e}", self.config.program))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(processed.as_bytes()).await?;
        }

        let result = child.wait_with_output().await?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!(program = %self.config.program, stderr = %stderr, "PDF conversion failed");
            return Err(ConsultError::Report(format!(
                "{} exited with {}: {}",
                self.config.program,
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Hidden sibling holding the pre-processed markdown, e.g. `.report.render.md`.
fn staged_input_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!(".{stem}.render.md"))
}

#[async_trait]
impl ReportRenderer for CommandRenderer {
    async fn render_pdf(&self, source: &Path) -> ConsultResult<Option<PathBuf>> {
        let supported = source
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| RENDERABLE_EXTENSIONS.contains(&e));
        if !supported {
            return Err(ConsultError::Report(format!(
                "unsupported file type for {}; expected .md, .txt or .log",
                source.display()
            )));
        }

        let content = tokio::fs::read_to_string(source).await?;
        let processed = preprocess_markdown(&content);
        let output = source.with_extension("pdf");

        let reads_file = self.config.args.iter().any(|a| a.contains(INPUT_SLOT));
        let staged = reads_file.then(|| staged_input_path(source));
        if let Some(path) = &staged {
            tokio::fs::write(path, &processed).await?;
        }

        let result = self.convert(staged.as_deref(), &output, &processed).await;
        if let Some(path) = &staged {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove staged render input");
            }
        }
        result?;

        info!(path = %output.display(), "PDF generated");
        Ok(Some(output))
    }
}

/// Prepare report markdown for PDF conversion.
///
/// A leading `Assistant:` prefix is dropped from every line, and each `### Title`
/// line starts a new page with `Title` promoted to a top-level heading.
pub fn preprocess_markdown(content: &str) -> String {
    let mut lines = Vec::new();
    for line in content.split('\n') {
        let line = line
            .strip_prefix("Assistant:")
            .map_or(line, str::trim_start);

        if let Some(title) = line.strip_prefix("### ") {
            lines.push(PAGE_BREAK.to_string());
            lines.push(format!("# {}", title.trim()));
        } else {
            lines.push(line.to_string());
        }
    }
    lines.join("\n")
}
