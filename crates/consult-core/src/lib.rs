//! Core types and error definitions shared by every `consult-*` crate.
//!
//! # Main types
//!
//! - [`ConsultError`] — Unified error enum for all subsystems.
//! - [`ConsultResult`] — Convenience alias for `Result<T, ConsultError>`.
//! - [`Role`] — Author of a conversation turn (user or assistant).
//! - [`ConversationTurn`] — One immutable entry of a session transcript.

/// Error enum and result alias.
pub mod error;
/// Conversation turn types.
pub mod message;

pub use error::{ConsultError, ConsultResult};
pub use message::{ConversationTurn, Role};
