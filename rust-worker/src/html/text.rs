//! Reduce an HTML body to readable plain text.

use scraper::{ElementRef, Html, Node};
use tracing::debug;

/// Elements whose text never reaches the reader.
const SKIPPED: &[&str] = &["script", "style", "template", "noscript"];

/// Elements that break words apart when rendered.
const BLOCKS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "td", "th", "table", "h1", "h2", "h3", "h4",
    "h5", "h6", "blockquote", "pre", "hr", "section", "article", "header", "footer",
];

/// Strip markup, decode entities and collapse whitespace.
///
/// Plain text passes through with only its whitespace normalized, so it is
/// safe to call on bodies that may or may not be HTML.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::with_capacity(html.len());
    collect_text(document.root_element(), &mut raw);

    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    debug!(
        html_length = html.len(),
        text_length = text.len(),
        "html_sanitized"
    );
    text
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED.contains(&name) {
        return;
    }

    let block = BLOCKS.contains(&name);
    if block {
        out.push(' ');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }

    if block {
        out.push(' ');
    }
}
