//! RFC 5322 message parsing using mailparse.
//!
//! Turns raw message bytes into headers plus a [`MimePart`] tree. Transfer
//! encodings and charsets are decoded here, so the extractor only deals with
//! strings and bytes.

use mailparse::{parse_headers, parse_mail, DispositionType, MailHeaderMap, ParsedMail};
use tracing::debug;

use super::tree::MimePart;
use crate::error::ExtractionError;

/// Headers read before body extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    pub subject: String,
    pub sender: String,
    pub message_id: Option<String>,
}

/// Read Subject, From and Message-Id without parsing the body.
pub fn read_headers(raw: &[u8]) -> Result<MessageHeaders, ExtractionError> {
    let (headers, _) = parse_headers(raw)?;

    Ok(MessageHeaders {
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        sender: headers.get_first_value("From").unwrap_or_default(),
        message_id: headers.get_first_value("Message-Id"),
    })
}

/// Parse a raw message into its content tree.
///
/// The root's own Content-Disposition is not consulted: a top-level
/// `text/plain` marked inline is still the body.
pub fn parse_content_tree(raw: &[u8]) -> Result<MimePart, ExtractionError> {
    let mail = parse_mail(raw)?;

    debug!(
        content_type = %mail.ctype.mimetype,
        subparts_count = mail.subparts.len(),
        "email_parse_tree_start"
    );

    classify(&mail, false)
}

fn classify(part: &ParsedMail, check_disposition: bool) -> Result<MimePart, ExtractionError> {
    let mime_type = part.ctype.mimetype.as_str();

    // mailparse reports a missing Content-Disposition as inline
    let declared = part.headers.get_first_value("Content-Disposition").is_some();

    if check_disposition && declared {
        let disposition = part.get_content_disposition();
        if matches!(
            disposition.disposition,
            DispositionType::Attachment | DispositionType::Inline
        ) {
            let file_name = disposition
                .params
                .get("filename")
                .or_else(|| part.ctype.params.get("name"))
                .cloned();
            let content_type = part
                .headers
                .get_first_value("Content-Type")
                .unwrap_or_else(|| mime_type.to_string());

            return Ok(MimePart::Attachment {
                file_name,
                content_type,
                data: part.get_body_raw()?,
            });
        }
    }

    if mime_type == "text/plain" || mime_type == "text/html" {
        return Ok(MimePart::Text {
            mime_type: mime_type.to_string(),
            content: part.get_body()?,
        });
    }

    if mime_type.starts_with("multipart/") {
        let children = part
            .subparts
            .iter()
            .map(|child| classify(child, true))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(MimePart::Container { children });
    }

    Ok(MimePart::Other {
        mime_type: mime_type.to_string(),
    })
}
