//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - Message types for the two-queue architecture
//! - Async publisher for enqueueing messages
//! - The sink traits the poller and router publish through
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → incoming_emails queue → Router → routed_emails queue
//! ```

pub mod publisher;
pub mod types;

pub use publisher::{message_key, EmailSink, Publisher, RoutedSink};
pub use types::{Attachment, ParsedEmail, RoutedEmail, EMAIL_QUEUE, ROUTED_QUEUE};
