use crate::file_stamp;
use consult_core::ConsultResult;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// Category tag written in front of every activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Info,
    Warning,
    Error,
    /// Full outbound prompt text.
    Prompt,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Info => "INFO",
            Category::Warning => "WARNING",
            Category::Error => "ERROR",
            Category::Prompt => "PROMPT",
        }
    }
}

/// Flat append-only activity log.
///
/// Records are `[YYYY-mm-dd HH:MM:SS] - CATEGORY: message` followed by a blank line.
/// Every record is also emitted through `tracing`. Write failures propagate.
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    /// Create `Business_Chatbot_Log_<stamp>.txt` inside `dir`.
    pub async fn create(dir: &Path, started: chrono::DateTime<chrono::Local>) -> ConsultResult<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("Business_Chatbot_Log_{}.txt", file_stamp(started)));
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, category: Category, message: &str) -> ConsultResult<()> {
        match category {
            Category::Info => info!(target: "activity", "{message}"),
            Category::Warning => warn!(target: "activity", "{message}"),
            Category::Error => error!(target: "activity", "{message}"),
            Category::Prompt => debug!(target: "activity", len = message.len(), "prompt recorded"),
        }

        let line = format!(
            "[{}] - {}: {message}\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            category.as_str()
        );
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    pub async fn info(&self, message: &str) -> ConsultResult<()> {
        self.record(Category::Info, message).await
    }

    pub async fn warning(&self, message: &str) -> ConsultResult<()> {
        self.record(Category::Warning, message).await
    }

    pub async fn error(&self, message: &str) -> ConsultResult<()> {
        self.record(Category::Error, message).await
    }

    pub async fn prompt(&self, message: &str) -> ConsultResult<()> {
        self.record(Category::Prompt, message).await
    }
}
