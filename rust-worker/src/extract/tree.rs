//! Content tree of a mail message.

/// One node of a message's MIME structure, classified for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimePart {
    /// A text/plain or text/html part, decoded to a string.
    Text { mime_type: String, content: String },
    /// A part declared with an attachment or inline disposition.
    Attachment {
        file_name: Option<String>,
        content_type: String,
        data: Vec<u8>,
    },
    /// A multipart container with its children in declared order.
    Container { children: Vec<MimePart> },
    /// Anything else. Ignored by extraction.
    Other { mime_type: String },
}

impl MimePart {
    /// Plain-text leaf, mostly useful for building trees by hand.
    pub fn text(content: impl Into<String>) -> Self {
        MimePart::Text {
            mime_type: "text/plain".to_string(),
            content: content.into(),
        }
    }

    /// HTML leaf.
    pub fn html(content: impl Into<String>) -> Self {
        MimePart::Text {
            mime_type: "text/html".to_string(),
            content: content.into(),
        }
    }

    pub fn container(children: Vec<MimePart>) -> Self {
        MimePart::Container { children }
    }
}
