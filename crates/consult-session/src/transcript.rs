use crate::file_stamp;
use consult_core::{ConsultResult, ConversationTurn};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

// ---------------------------------------------------------------------------
// TranscriptFile
// ---------------------------------------------------------------------------

/// Append-only transcript on disk.
///
/// Each turn is written as a `[YYYY-mm-dd HH:MM:SS]` marker line, then `Role: text`,
/// then a blank line. [`clean_transcript`] strips the marker lines again.
pub struct TranscriptFile {
    path: PathBuf,
}

impl TranscriptFile {
    /// Create `Conversation_Transcript_<stamp>.log` inside `dir`.
    pub async fn create(dir: &Path, started: chrono::DateTime<chrono::Local>) -> ConsultResult<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("Conversation_Transcript_{}.log", file_stamp(started)));
        Ok(Self { path })
    }

    /// Use an explicit path.
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, turn: &ConversationTurn) -> ConsultResult<()> {
        let stamp = turn
            .timestamp()
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        let block = format!("[{stamp}]\n{}: {}\n\n", turn.role(), turn.text());

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Full contents; empty when nothing was written yet.
    pub async fn read(&self) -> ConsultResult<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

/// Drop every line starting with `[` (timestamp markers), keep the rest in order.
pub fn clean_transcript(content: &str) -> String {
    content
        .split('\n')
        .filter(|line| !line.starts_with('['))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
