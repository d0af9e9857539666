//! Error taxonomy for the ingestion and routing pipeline.
//!
//! Every failure class has its own type so that logs and counters can tell
//! them apart. Per-message errors (`ExtractionError`, `PublishError`) never
//! abort a poll cycle; `MailboxError` aborts one cycle but never the process.

use std::time::Duration;

/// A single message could not be read or decoded.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to parse message: {0}")]
    Parse(#[from] mailparse::MailParseError),

    #[error("failed to fetch message {uid}: {reason}")]
    Fetch { uid: u32, reason: String },
}

/// The event transport refused or failed to confirm a publish.
#[derive(Debug, thiserror::Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Mail store failures.
///
/// `Connect` and `Select` are cycle-fatal: nothing is marked and the next
/// scheduled poll starts from scratch.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("mailbox connect failed: {0}")]
    Connect(String),

    #[error("mailbox login failed: {0}")]
    Login(String),

    #[error("mailbox select failed: {0}")]
    Select(String),

    #[error("unseen search failed: {0}")]
    Search(String),

    #[error("message fetch failed: {0}")]
    Fetch(String),

    #[error("flag store failed: {0}")]
    Store(String),

    #[error("logout failed: {0}")]
    Logout(String),
}

/// The analysis collaborator could not produce a response.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisUnavailable {
    #[error("analysis call timed out after {0:?}")]
    Timeout(Duration),

    #[error("analysis service returned status {0}")]
    Status(u16),

    #[error("analysis transport error: {0}")]
    Transport(String),

    #[error("analysis request could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The analysis response did not contain a usable routing decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedAnalysis {
    #[error("response is not valid JSON: {0}")]
    NotJson(String),

    #[error("response has no analysis field")]
    MissingAnalysis,

    #[error("analysis is not a JSON object")]
    NotAnObject,

    #[error("analysis field {0} is missing")]
    MissingField(&'static str),

    #[error("analysis field {0} is not a string")]
    NotAString(&'static str),
}
