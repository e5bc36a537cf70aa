use async_trait::async_trait;
use consult_agent::{InputSource, OutputSink};
use consult_core::ConsultResult;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Prints session output to the terminal, streaming model text as it arrives.
pub struct ConsoleSink;

#[async_trait]
impl OutputSink for ConsoleSink {
    async fn terminal(&self, line: &str) {
        println!("{line}");
    }

    async fn stream(&self, chunk: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(chunk.as_bytes());
        let _ = stdout.flush();
    }

    async fn stream_end(&self) {
        println!();
    }
}

/// Reads follow-up messages from stdin, one per line.
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Prompt with `User: ` and read a line. `None` on end of input.
    pub async fn prompt(&mut self) -> ConsultResult<Option<String>> {
        print!("User: ");
        let _ = std::io::stdout().flush();
        Ok(self.lines.next_line().await?)
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn next_input(&mut self) -> ConsultResult<Option<String>> {
        self.prompt().await
    }
}
