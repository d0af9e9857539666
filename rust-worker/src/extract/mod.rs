//! Message extraction module.
//!
//! Turns raw mailbox messages into [`ParsedEmail`](crate::queue::ParsedEmail)
//! records for the `incoming_emails` queue.
//!
//! ## Processing Flow
//!
//! ```text
//! raw bytes → parse_content_tree() → MimePart tree → extract() → ParsedEmail
//! ```

pub mod extractor;
pub mod parser;
pub mod tree;

pub use extractor::{extract, extract_message, primary_mime_type, sanitize_file_name};
pub use parser::{parse_content_tree, read_headers, MessageHeaders};
pub use tree::MimePart;
