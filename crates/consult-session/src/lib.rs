//! Session bookkeeping and persisted artifacts.
//!
//! - [`SessionState`] — transcript, history string and latest summary of one session.
//! - [`TranscriptFile`] — timestamp-marked transcript on disk, plus [`clean_transcript`].
//! - [`ActivityLog`] — flat append-only log mirroring every exchange and oracle check.
//! - [`ReportWriter`] / [`ReportRenderer`] — final markdown artifacts and PDF conversion.

/// Flat activity log.
pub mod activity;
/// Report files and PDF rendering.
pub mod report;
/// In-memory session state.
pub mod state;
/// Transcript file and cleaning.
pub mod transcript;

pub use activity::{ActivityLog, Category};
pub use report::{
    preprocess_markdown, CommandRenderer, NoopRenderer, RendererConfig, ReportRenderer,
    ReportWriter, BUSINESS_REPORT_FILE, CLEANED_TRANSCRIPT_FILE, IMPLEMENTATION_PLAN_FILE,
};
pub use state::SessionState;
pub use transcript::{clean_transcript, TranscriptFile};

/// `YYYYmmdd_HHMMSS` suffix used in per-session file names.
pub fn file_stamp(at: chrono::DateTime<chrono::Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}
