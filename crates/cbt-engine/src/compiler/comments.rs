//! Comment removal

use std::borrow::Cow;

use crate::delimiter::{splice, TagMatcher};

/// Remove `<%* ... *%>` block comments, then `//` line comments inside
/// directives. Literal text outside directives is never touched.
pub fn strip(text: &str, matcher: &TagMatcher) -> String {
    let text = matcher.strip_block_comments(text);

    let edits: Vec<_> = matcher
        .tags(&text)
        .into_iter()
        .filter_map(|tag| match strip_line_comments(&tag.inner) {
            Cow::Borrowed(_) => None,
            Cow::Owned(inner) => Some((
                tag.span,
                format!("{}{}{}", matcher.left(), inner, matcher.right()),
            )),
        })
        .collect();

    if edits.is_empty() {
        text
    } else {
        splice(&text, edits)
    }
}

/// Drop `//` through end of line, ignoring `//` inside string literals
pub fn strip_line_comments(source: &str) -> Cow<'_, str> {
    if !source.contains("//") {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    let mut changed = false;

    while let Some(c) = chars.next() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            }
            continue;
        }

        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '/' && chars.peek() == Some(&'/') => {
                chars.next();
                in_comment = true;
                changed = true;
            }
            None => out.push(c),
        }
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> TagMatcher {
        TagMatcher::new("<%", "%>").unwrap()
    }

    #[test]
    fn test_block_comments_removed() {
        let out = strip("a<%* note\n spanning lines *%>b", &matcher());
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_line_comments_inside_directives() {
        let out = strip("<% let x = 1 // counter\n%>http://keep", &matcher());
        assert_eq!(out, "<% let x = 1 \n%>http://keep");
    }

    #[test]
    fn test_line_comment_on_last_line() {
        let out = strip("<%= title // heading %>", &matcher());
        assert_eq!(out, "<%= title %>");
    }

    #[test]
    fn test_comment_markers_in_strings_kept() {
        let source = "<%= 'http://example.com' %>";
        assert_eq!(strip(source, &matcher()), source);
        assert!(matches!(strip_line_comments("'a//b' + \"c//\""), Cow::Borrowed(_)));
    }
}
