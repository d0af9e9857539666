//! Flattening of a message content tree into a [`ParsedEmail`].
//!
//! The walk is depth-first, pre-order. Attachment parts are captured before
//! their type is looked at, so a multipart declared as an attachment is
//! captured whole and never descended into. Each text part overwrites the
//! body, so the last one in traversal order wins.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info};

use super::parser::{parse_content_tree, read_headers};
use super::tree::MimePart;
use crate::error::ExtractionError;
use crate::queue::{Attachment, ParsedEmail};

/// Extract a full [`ParsedEmail`] from raw message bytes.
pub fn extract_message(raw: &[u8]) -> Result<ParsedEmail, ExtractionError> {
    let headers = read_headers(raw)?;
    let tree = parse_content_tree(raw)?;
    Ok(extract(headers.subject, headers.sender, &tree))
}

/// Flatten an already parsed tree.
pub fn extract(subject: String, sender: String, root: &MimePart) -> ParsedEmail {
    let mut email = ParsedEmail::new(subject, sender);

    match root {
        MimePart::Text { content, .. } => email.body = content.clone(),
        MimePart::Container { children } => {
            for child in children {
                walk(child, &mut email);
            }
        }
        // The root's disposition is never consulted, so a root attachment
        // node cannot occur. Other root types carry no body.
        MimePart::Attachment { .. } | MimePart::Other { .. } => {}
    }

    info!(
        subject = %email.subject,
        body_length = email.body.len(),
        attachments = email.attachments.len(),
        "email_extract_complete"
    );

    email
}

fn walk(part: &MimePart, email: &mut ParsedEmail) {
    match part {
        MimePart::Attachment {
            file_name,
            content_type,
            data,
        } => {
            let Some(name) = file_name else {
                debug!(content_type = %content_type, "email_attachment_without_name");
                return;
            };

            let attachment = Attachment {
                file_name: sanitize_file_name(name),
                mime_type: primary_mime_type(content_type),
                content: STANDARD.encode(data),
            };

            info!(
                file_name = %attachment.file_name,
                mime_type = %attachment.mime_type,
                size = data.len(),
                "email_attachment_added"
            );

            email.attachments.push(attachment);
        }
        MimePart::Text { content, .. } => email.body = content.clone(),
        MimePart::Container { children } => {
            for child in children {
                walk(child, email);
            }
        }
        MimePart::Other { mime_type } => {
            debug!(mime_type = %mime_type, "email_part_ignored");
        }
    }
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
///
/// The substitution is per character, so the result has the same number of
/// characters as the input.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The declared content type up to the first `;`.
pub fn primary_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: Option<&str>, content_type: &str, data: &[u8]) -> MimePart {
        MimePart::Attachment {
            file_name: name.map(str::to_string),
            content_type: content_type.to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_single_plain_part() {
        let raw = b"Subject: Greeting\r\nFrom: bob@example.com\r\nContent-Type: text/plain\r\n\r\nHello";

        let email = extract_message(raw).unwrap();

        assert_eq!(email.subject, "Greeting");
        assert_eq!(email.sender, "bob@example.com");
        assert_eq!(email.body, "Hello");
        assert!(email.attachments.is_empty());
    }

    #[test]
    fn test_single_html_part_kept_verbatim() {
        let tree = MimePart::html("<b>Hi</b>");

        let email = extract("s".into(), "f".into(), &tree);

        assert_eq!(email.body, "<b>Hi</b>");
    }

    #[test]
    fn test_last_text_part_wins_in_pre_order() {
        let tree = MimePart::container(vec![
            MimePart::text("first"),
            MimePart::container(vec![
                MimePart::text("nested plain"),
                MimePart::container(vec![MimePart::html("<p>deepest</p>")]),
            ]),
            attachment(Some("notes.txt"), "text/plain", b"not the body"),
        ]);

        let email = extract("s".into(), "f".into(), &tree);

        assert_eq!(email.body, "<p>deepest</p>");
        assert_eq!(email.attachments.len(), 1);
    }

    #[test]
    fn test_later_sibling_overrides_nested_text() {
        let tree = MimePart::container(vec![
            MimePart::container(vec![MimePart::html("<p>inner</p>")]),
            MimePart::text("outer last"),
        ]);

        let email = extract("s".into(), "f".into(), &tree);

        assert_eq!(email.body, "outer last");
    }

    #[test]
    fn test_empty_multipart() {
        let email = extract("s".into(), "f".into(), &MimePart::container(vec![]));

        assert_eq!(email.body, "");
        assert!(email.attachments.is_empty());
    }

    #[test]
    fn test_attachments_in_discovery_order() {
        let tree = MimePart::container(vec![
            attachment(Some("a.txt"), "text/plain", b"a"),
            MimePart::container(vec![attachment(Some("b.bin"), "application/octet-stream", b"b")]),
            attachment(Some("c.png"), "image/png; name=\"c.png\"", b"c"),
        ]);

        let email = extract("s".into(), "f".into(), &tree);

        let names: Vec<_> = email.attachments.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.bin", "c.png"]);
        assert_eq!(email.attachments[2].mime_type, "image/png");
        assert_eq!(email.attachments[0].content, "YQ==");
    }

    #[test]
    fn test_attachment_without_name_is_dropped() {
        let tree = MimePart::container(vec![
            attachment(None, "application/pdf", b"%PDF"),
            MimePart::text("body"),
        ]);

        let email = extract("s".into(), "f".into(), &tree);

        assert!(email.attachments.is_empty());
        assert_eq!(email.body, "body");
    }

    #[test]
    fn test_other_parts_ignored() {
        let tree = MimePart::container(vec![
            MimePart::text("body"),
            MimePart::Other {
                mime_type: "image/gif".to_string(),
            },
        ]);

        let email = extract("s".into(), "f".into(), &tree);

        assert_eq!(email.body, "body");
        assert!(email.attachments.is_empty());
    }

    #[test]
    fn test_multipart_with_attachment_disposition_is_captured_whole() {
        let raw = r#"Subject: Forwarded
Content-Type: multipart/mixed; boundary="outer"

--outer
Content-Type: text/plain

See attached thread
--outer
Content-Type: multipart/alternative; boundary="inner"
Content-Disposition: attachment; filename="thread.eml"

--inner
Content-Type: text/plain

Should not become the body
--inner--
--outer--
"#;

        let email = extract_message(raw.as_bytes()).unwrap();

        assert_eq!(email.body.trim(), "See attached thread");
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].file_name, "thread.eml");
        assert_eq!(email.attachments[0].mime_type, "multipart/alternative");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report (final)!.pdf"), "report__final__.pdf");
        assert_eq!(sanitize_file_name("plain-name.v2.txt"), "plain-name.v2.txt");
        assert_eq!(sanitize_file_name(""), "");
    }

    #[test]
    fn test_sanitize_file_name_preserves_character_count() {
        for name in ["résumé 2024.docx", "日本語.txt", "a/b\\c:d*e?.zip", "tab\there"] {
            let sanitized = sanitize_file_name(name);
            assert_eq!(sanitized.chars().count(), name.chars().count());
            assert!(sanitized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'));
        }
    }

    #[test]
    fn test_primary_mime_type() {
        assert_eq!(primary_mime_type("application/pdf; name=\"x.pdf\""), "application/pdf");
        assert_eq!(primary_mime_type("image/png"), "image/png");
    }
}
