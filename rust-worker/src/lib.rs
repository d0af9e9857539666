//! Mailroute - mailbox ingestion and allow-list routing for inbound email.
//!
//! This library provides shared modules for the two Mailroute binaries:
//! - `mailroute-fetcher`: Polls an IMAP mailbox and publishes extracted emails
//! - `mailroute-router`: Analyzes extracted emails and forwards allow-listed ones
//!
//! ## Architecture
//!
//! ```text
//! IMAP → Fetcher → incoming_emails → Router → analysis service
//!                                       └──→ routed_emails
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod html;
pub mod mailbox;
pub mod queue;
pub mod routing;
pub mod shutdown;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{AnalysisUnavailable, ExtractionError, MailboxError, MalformedAnalysis, PublishError};
pub use extract::extract_message;
pub use mailbox::{ImapSettings, ImapStore, MailboxPoller, PollStats};
pub use queue::{
    Attachment, EmailSink, ParsedEmail, Publisher, RoutedEmail, RoutedSink, EMAIL_QUEUE,
    ROUTED_QUEUE,
};
pub use routing::{AllowList, AnalysisClient, RoutingAction, RoutingDecider, RoutingOrchestrator, Strictness};
pub use shutdown::shutdown_signal;
pub use web::AppState;
