//! Directive compiler
//!
//! Compilation runs in three stages:
//!
//! 1. comments are stripped ([`comments::strip`])
//! 2. the text is split at directive boundaries and every directive is
//!    classified, parsing its expressions ([`directive::classify`])
//! 3. the segments are assembled into a nested [`Program`] ([`builder::build`])
//!
//! Literal text is carried verbatim in [`Node::Text`] nodes, so no string
//! escaping or line folding is needed to embed it in the compiled form.

pub mod builder;
pub mod comments;
pub mod directive;
pub mod program;

pub use builder::{Segment, MAX_NESTING_DEPTH};
pub use directive::{Directive, LAYOUT_KEYWORDS};
pub use program::{Branch, Filter, Node, Program};

use crate::{delimiter::TagMatcher, error::Result};

/// Compile template text into a program
pub fn compile(text: &str, matcher: &TagMatcher, escape: bool) -> Result<Program> {
    let text = comments::strip(text, matcher);
    builder::build(segment(&text, matcher, escape)?)
}

/// Split `text` into literal and classified directive segments
pub fn segment(text: &str, matcher: &TagMatcher, escape: bool) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for tag in matcher.tags(text) {
        if tag.span.start > cursor {
            segments.push(Segment::Text(text[cursor..tag.span.start].to_string()));
        }
        segments.push(Segment::Directive(directive::classify(&tag.inner, escape)?));
        cursor = tag.span.end;
    }
    if cursor < text.len() {
        segments.push(Segment::Text(text[cursor..].to_string()));
    }

    Ok(segments)
}
