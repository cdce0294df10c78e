//! Directive tag matching for a configurable delimiter pair
//!
//! Every pass over template text (comment stripping, segmentation, block
//! collection, marker substitution) goes through a [`TagMatcher`], so the
//! delimiters are configured in exactly one place.

use std::ops::Range;

use regex::Regex;

use crate::error::ConfigError;

/// One `<% ... %>` tag located in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Byte range of the whole tag, delimiters included
    pub span: Range<usize>,
    /// Text between the delimiters, untrimmed
    pub inner: String,
}

impl Tag {
    /// First whitespace-separated word of the tag
    pub fn keyword(&self) -> &str {
        self.inner.split_whitespace().next().unwrap_or("")
    }

    /// Everything after the keyword, trimmed
    pub fn args(&self) -> &str {
        let trimmed = self.inner.trim();
        match trimmed.find(char::is_whitespace) {
            Some(pos) => trimmed[pos..].trim(),
            None => "",
        }
    }

    /// First argument, usually a block or slot name
    pub fn name(&self) -> Option<&str> {
        self.args().split_whitespace().next()
    }
}

/// An open tag and its matching close tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub open: Tag,
    pub close: Tag,
    /// Number of enclosing pairs of the same keyword
    pub depth: usize,
}

impl Pair {
    /// Byte range from the start of the open tag to the end of the close tag
    pub fn span(&self) -> Range<usize> {
        self.open.span.start..self.close.span.end
    }

    /// Byte range of the text between the two tags
    pub fn body_span(&self) -> Range<usize> {
        self.open.span.end..self.close.span.start
    }

    pub fn body<'t>(&self, text: &'t str) -> &'t str {
        &text[self.body_span()]
    }
}

/// Finds directive tags for one delimiter pair
#[derive(Debug, Clone)]
pub struct TagMatcher {
    left: String,
    right: String,
    tag: Regex,
    block_comment: Regex,
}

impl TagMatcher {
    pub fn new(left: &str, right: &str) -> Result<Self, ConfigError> {
        if left.is_empty() || right.is_empty() || left == right {
            return Err(ConfigError::Validation {
                message: format!("invalid delimiter pair `{}` / `{}`", left, right),
            });
        }

        let (l, r) = (regex::escape(left), regex::escape(right));
        let tag = Regex::new(&format!(r"(?s){}(.*?){}", l, r)).map_err(|e| invalid(&e))?;
        let block_comment =
            Regex::new(&format!(r"(?s){}\*.*?\*{}", l, r)).map_err(|e| invalid(&e))?;

        Ok(Self {
            left: left.to_string(),
            right: right.to_string(),
            tag,
            block_comment,
        })
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }

    /// All tags in document order
    pub fn tags(&self, text: &str) -> Vec<Tag> {
        self.tag
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(Tag {
                    span: whole.range(),
                    inner: caps.get(1).map_or("", |m| m.as_str()).to_string(),
                })
            })
            .collect()
    }

    /// Tags whose keyword is exactly `keyword`
    pub fn open_tags(&self, text: &str, keyword: &str) -> Vec<Tag> {
        self.tags(text)
            .into_iter()
            .filter(|tag| tag.keyword() == keyword)
            .collect()
    }

    pub fn first_open(&self, text: &str, keyword: &str) -> Option<Tag> {
        self.tags(text)
            .into_iter()
            .find(|tag| tag.keyword() == keyword)
    }

    pub fn has_open(&self, text: &str, keyword: &str) -> bool {
        self.first_open(text, keyword).is_some()
    }

    /// Every `keyword` ... `/keyword` pair, nested ones included, ordered by
    /// the position of the open tag. Unmatched tags are ignored.
    pub fn pairs(&self, text: &str, keyword: &str) -> Vec<Pair> {
        let close_keyword = format!("/{}", keyword);
        let mut stack: Vec<Tag> = Vec::new();
        let mut pairs = Vec::new();

        for tag in self.tags(text) {
            if tag.keyword() == keyword {
                stack.push(tag);
            } else if tag.keyword() == close_keyword {
                if let Some(open) = stack.pop() {
                    pairs.push(Pair {
                        open,
                        close: tag,
                        depth: stack.len(),
                    });
                }
            }
        }

        // Unclosed opens leave their inner pairs one level too deep
        let unclosed = stack.len();
        if unclosed > 0 {
            for pair in &mut pairs {
                let enclosing = stack
                    .iter()
                    .filter(|open| open.span.start < pair.open.span.start)
                    .count();
                pair.depth = pair.depth.saturating_sub(enclosing);
            }
        }

        pairs.sort_by_key(|pair| pair.open.span.start);
        pairs
    }

    /// Pairs not contained in another pair of the same keyword
    pub fn outer_pairs(&self, text: &str, keyword: &str) -> Vec<Pair> {
        self.pairs(text, keyword)
            .into_iter()
            .filter(|pair| pair.depth == 0)
            .collect()
    }

    /// Replace every `keyword` tag with the closure's output
    pub fn replace_open<F>(&self, text: &str, keyword: &str, mut replace: F) -> String
    where
        F: FnMut(&Tag) -> String,
    {
        let edits = self
            .open_tags(text, keyword)
            .into_iter()
            .map(|tag| {
                let replacement = replace(&tag);
                (tag.span, replacement)
            })
            .collect();
        splice(text, edits)
    }

    /// Replace every outermost `keyword` pair, tags included, with the
    /// closure's output. The closure receives the pair body.
    pub fn replace_pairs<F>(&self, text: &str, keyword: &str, mut replace: F) -> String
    where
        F: FnMut(&Pair, &str) -> String,
    {
        let edits = self
            .outer_pairs(text, keyword)
            .into_iter()
            .map(|pair| {
                let replacement = replace(&pair, pair.body(text));
                (pair.span(), replacement)
            })
            .collect();
        splice(text, edits)
    }

    /// Remove `<%* ... *%>` comments
    pub fn strip_block_comments(&self, text: &str) -> String {
        self.block_comment.replace_all(text, "").into_owned()
    }
}

fn invalid(err: &regex::Error) -> ConfigError {
    ConfigError::Validation {
        message: err.to_string(),
    }
}

/// Apply non-overlapping edits given in ascending order
pub(crate) fn splice(text: &str, edits: Vec<(Range<usize>, String)>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> TagMatcher {
        TagMatcher::new("<%", "%>").unwrap()
    }

    #[test]
    fn test_tag_keyword_and_args() {
        let tags = matcher().tags("a<% block  content hide %>b<%=title%>");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].keyword(), "block");
        assert_eq!(tags[0].args(), "content hide");
        assert_eq!(tags[0].name(), Some("content"));
        assert_eq!(tags[1].keyword(), "=title");
        assert_eq!(tags[1].args(), "");
    }

    #[test]
    fn test_keyword_must_be_whole_word() {
        let m = matcher();
        assert!(m.has_open("<% block a %>", "block"));
        assert!(!m.has_open("<% blocks a %>", "block"));
        assert!(m.has_open("<%child%>", "child"));
    }

    #[test]
    fn test_nested_pairs() {
        let text = "<% block outer %>x<% block inner %>y<% /block %>z<% /block %>";
        let m = matcher();
        let pairs = m.pairs(text, "block");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].open.name(), Some("outer"));
        assert_eq!(pairs[0].depth, 0);
        assert_eq!(pairs[0].body(text), "x<% block inner %>y<% /block %>z");
        assert_eq!(pairs[1].open.name(), Some("inner"));
        assert_eq!(pairs[1].depth, 1);

        let outer = m.outer_pairs(text, "block");
        assert_eq!(outer.len(), 1);
    }

    #[test]
    fn test_replace_pairs_and_open_tags() {
        let m = matcher();
        let text = "[<% slot a %>A<% /slot %>][<% slot b %>B<% /slot %>]";
        let replaced = m.replace_pairs(text, "slot", |pair, body| {
            format!("{}={}", pair.open.name().unwrap_or(""), body)
        });
        assert_eq!(replaced, "[a=A][b=B]");

        let replaced = m.replace_open("x<% parent %>y<% parent %>", "parent", |_| "P".into());
        assert_eq!(replaced, "xPyP");
    }

    #[test]
    fn test_custom_delimiters() {
        let m = TagMatcher::new("{{", "}}").unwrap();
        let tags = m.tags("a {{ if (x) }}b{{ /if }}");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].keyword(), "if");
        assert_eq!(m.strip_block_comments("a{{* note *}}b"), "ab");
    }

    #[test]
    fn test_invalid_delimiters() {
        assert!(TagMatcher::new("", "%>").is_err());
        assert!(TagMatcher::new("||", "||").is_err());
    }
}
