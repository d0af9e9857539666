//! Queue message types for the two-queue architecture.
//!
//! This module defines the message formats for:
//! - `incoming_emails` queue: Emails extracted from the mailbox by the fetcher
//! - `routed_emails` queue: Emails the router decided to forward

use serde::{Deserialize, Serialize};

/// Default queue name for extracted inbound emails.
pub const EMAIL_QUEUE: &str = "incoming_emails";

/// Default queue name for forward decisions.
pub const ROUTED_QUEUE: &str = "routed_emails";

// =============================================================================
// Extracted Email (incoming_emails queue)
// =============================================================================

/// Flattened view of a mailbox message.
///
/// `body` holds the last text/plain or text/html part found; the router
/// replaces it with sanitized plain text before analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEmail {
    /// Subject header value
    #[serde(default)]
    pub subject: String,
    /// From header value
    #[serde(default, rename = "from")]
    pub sender: String,
    /// Body text (may still contain HTML markup on the incoming queue)
    #[serde(default)]
    pub body: String,
    /// Attachments in traversal order
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl ParsedEmail {
    /// Create an email with no body and no attachments yet.
    pub fn new(subject: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            sender: sender.into(),
            body: String::new(),
            attachments: Vec::new(),
        }
    }
}

/// File captured from a part with an attachment or inline disposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Sanitized file name, only `[A-Za-z0-9.-]`
    pub file_name: String,
    /// Primary content type token, without parameters
    pub mime_type: String,
    /// Base64-encoded content
    pub content: String,
}

// =============================================================================
// Routed Email (routed_emails queue)
// =============================================================================

/// Forward decision published by the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedEmail {
    /// Allow-listed recipient
    pub forward_to: String,
    /// Sentiment reported by the analysis service
    pub sentiment: String,
    /// The sanitized email
    pub email: ParsedEmail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_email_uses_from_on_the_wire() {
        let mut email = ParsedEmail::new("Invoice", "billing@example.com");
        email.body = "Please pay".to_string();
        email.attachments.push(Attachment {
            file_name: "invoice.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            content: "JVBERi0=".to_string(),
        });

        let json = serde_json::to_string(&email).unwrap();
        assert!(json.contains("\"from\":\"billing@example.com\""));
        assert!(json.contains("\"fileName\":\"invoice.pdf\""));
        assert!(json.contains("\"mimeType\":\"application/pdf\""));
    }

    #[test]
    fn test_parsed_email_missing_fields_default() {
        let json = r#"{"subject": "Hi"}"#;

        let email: ParsedEmail = serde_json::from_str(json).unwrap();
        assert_eq!(email.subject, "Hi");
        assert_eq!(email.sender, "");
        assert!(email.attachments.is_empty());
    }

    #[test]
    fn test_routed_email_serialization() {
        let routed = RoutedEmail {
            forward_to: "alice.j@yourcompany.com".to_string(),
            sentiment: "Negative".to_string(),
            email: ParsedEmail::new("Broken", "customer@example.com"),
        };

        let json = serde_json::to_string(&routed).unwrap();
        assert!(json.contains("\"forwardTo\":\"alice.j@yourcompany.com\""));

        let parsed: RoutedEmail = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, routed);
    }
}
