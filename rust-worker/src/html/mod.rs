//! HTML handling for message bodies.

pub mod text;

pub use text::html_to_text;
