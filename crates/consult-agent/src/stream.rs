use serde::{Deserialize, Serialize};

/// Events emitted while a chat response streams in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of assistant text.
    TextDelta { text: String },

    /// The stream has finished successfully.
    Done,

    /// The stream broke off.
    Error { message: String },
}

/// Pop every complete `data:` payload out of an SSE byte buffer.
///
/// Network chunks may split a multi-byte character, so bytes are only decoded once a
/// whole line has arrived. Incomplete trailing lines stay in `buffer` for the next
/// chunk. Blank lines and `:` comments are skipped.
pub(crate) fn drain_sse_data(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=line_end).collect();
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim();

        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            payloads.push(data.trim_start().to_string());
        }
    }
    payloads
}
