//! Block, slot and composition marker handling
//!
//! These are pure text transforms over one template body. The resolver
//! strings them together across the inheritance chain.

use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{compiler::LAYOUT_KEYWORDS, delimiter::{splice, TagMatcher}};

static PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(\S+?)="(.*?)""#).unwrap_or_else(|_| unreachable!("static param pattern"))
});

/// A block definition as written in one template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDef {
    /// Body between the block tags, trimmed
    pub body: String,
    /// Declared with `block NAME hide`
    pub hidden: bool,
}

/// Every named block in `text`, nested ones included. A name defined twice
/// keeps the later definition.
pub fn collect(text: &str, matcher: &TagMatcher) -> IndexMap<String, BlockDef> {
    let mut blocks = IndexMap::new();
    for pair in matcher.pairs(text, "block") {
        let mut args = pair.open.args().split_whitespace();
        if let Some(name) = args.next() {
            blocks.insert(
                name.to_string(),
                BlockDef {
                    body: pair.body(text).trim().to_string(),
                    hidden: args.next() == Some("hide"),
                },
            );
        }
    }
    blocks
}

/// Target of the first `extends` tag
pub fn extends_name(text: &str, matcher: &TagMatcher) -> Option<String> {
    matcher
        .first_open(text, "extends")
        .map(|tag| tag.args().to_string())
        .filter(|name| !name.is_empty())
}

/// `key="value"` parameters following the target name of `use`/`call`
pub fn parse_params(args: &str) -> HashMap<String, String> {
    let rest = args.trim_start();
    let rest = rest
        .find(char::is_whitespace)
        .map_or("", |pos| &rest[pos..]);
    PARAM
        .captures_iter(rest)
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))
        .collect()
}

/// Expand `use`, then `apply`, then `call` against `blocks`
///
/// Expanded bodies are expanded again; a block that is already being
/// expanded further up expands to nothing.
pub fn expand(
    text: &str,
    blocks: &IndexMap<String, BlockDef>,
    matcher: &TagMatcher,
    expanding: &mut Vec<String>,
) -> String {
    let text = matcher.replace_open(text, "use", |tag| {
        let Some(name) = tag.name() else {
            return String::new();
        };
        let params = parse_params(tag.args());
        invoke(name, &params, None, blocks, matcher, expanding)
    });

    let mut text = text;
    for keyword in ["apply", "call"] {
        text = matcher.replace_pairs(&text, keyword, |pair, body| {
            let Some(name) = pair.open.name() else {
                return String::new();
            };
            let mut params = parse_params(pair.open.args());
            let mut unnamed = None;
            for slot in matcher.outer_pairs(body, "slot") {
                let content = slot.body(body).trim().to_string();
                match slot.open.name() {
                    Some(slot_name) => {
                        params.insert(slot_name.to_string(), content);
                    }
                    None => unnamed = Some(content),
                }
            }
            let unnamed = unnamed.unwrap_or_else(|| remove_pairs(body, "slot", matcher).trim().to_string());
            invoke(name, &params, Some(&unnamed), blocks, matcher, expanding)
        });
    }
    text
}

fn invoke(
    name: &str,
    params: &HashMap<String, String>,
    unnamed: Option<&str>,
    blocks: &IndexMap<String, BlockDef>,
    matcher: &TagMatcher,
    expanding: &mut Vec<String>,
) -> String {
    let Some(target) = blocks.get(name) else {
        return String::new();
    };
    if expanding.iter().any(|n| n == name) {
        return String::new();
    }

    let filled = matcher.replace_pairs(&target.body, "slot", |slot, default| {
        let fallback = || default.trim().to_string();
        match slot.open.name() {
            Some(slot_name) => params
                .get(slot_name)
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or_else(fallback),
            None => unnamed.map_or_else(fallback, str::to_string),
        }
    });

    expanding.push(name.to_string());
    let expanded = expand(&filled, blocks, matcher, expanding);
    expanding.pop();
    expanded
}

/// Replace `parent` markers in `text` with the ancestor's body
pub fn substitute_parent(text: &str, ancestor: &str, matcher: &TagMatcher) -> String {
    let ancestor = ancestor.trim();
    matcher.replace_open(text, "parent", |_| ancestor.to_string())
}

/// When the ancestor has a `child` marker, the result is the ancestor with
/// the marker replaced by `text`; otherwise `text` is unchanged
pub fn substitute_child(text: &str, ancestor: &str, matcher: &TagMatcher) -> String {
    if !matcher.has_open(ancestor, "child") {
        return text.to_string();
    }
    let text = text.trim();
    matcher.replace_open(ancestor, "child", |_| text.to_string())
}

/// Fill the ancestor's slots from `text`
///
/// Named slots take the same-named slot of `text`, or keep their default.
/// The unnamed slot takes the unnamed slot of `text`, or else everything in
/// `text` outside its slots.
pub fn fill_slots(text: &str, ancestor: &str, matcher: &TagMatcher) -> String {
    if matcher.outer_pairs(ancestor, "slot").is_empty() {
        return text.to_string();
    }

    let mut named = HashMap::new();
    let mut unnamed = None;
    for slot in matcher.outer_pairs(text, "slot") {
        let content = slot.body(text).trim().to_string();
        match slot.open.name() {
            Some(name) => {
                named.insert(name.to_string(), content);
            }
            None => unnamed = Some(content),
        }
    }
    let unnamed = unnamed.unwrap_or_else(|| remove_pairs(text, "slot", matcher).trim().to_string());

    matcher.replace_pairs(ancestor, "slot", |slot, default| match slot.open.name() {
        Some(name) => named
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.trim().to_string()),
        None => unnamed.clone(),
    })
}

/// Remove `keyword` pairs together with their content
pub fn remove_pairs(text: &str, keyword: &str, matcher: &TagMatcher) -> String {
    matcher.replace_pairs(text, keyword, |_, _| String::new())
}

/// Remove every inheritance marker tag, keeping the text between them
pub fn strip_markers(text: &str, matcher: &TagMatcher) -> String {
    let edits = matcher
        .tags(text)
        .into_iter()
        .filter(|tag| LAYOUT_KEYWORDS.contains(&tag.keyword()))
        .map(|tag| (tag.span, String::new()))
        .collect();
    splice(text, edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> TagMatcher {
        TagMatcher::new("<%", "%>").unwrap()
    }

    fn blocks(text: &str) -> IndexMap<String, BlockDef> {
        collect(text, &matcher())
    }

    #[test]
    fn test_collect_nested_and_hidden() {
        let found = blocks(
            "<% block outer %> a <% block inner hide %>b<% /block %> <% /block %><% block inner %>c<% /block %>",
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found["outer"].body, "a <% block inner hide %>b<% /block %>");
        assert_eq!(
            found["inner"],
            BlockDef {
                body: "c".to_string(),
                hidden: false
            }
        );
    }

    #[test]
    fn test_extends_name() {
        assert_eq!(
            extends_name("<% extends layout %>\n<% block a %><% /block %>", &matcher()),
            Some("layout".to_string())
        );
        assert_eq!(extends_name("<% block a %><% /block %>", &matcher()), None);
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params("card title=\"Hello World\" note=\" x \"");
        assert_eq!(params["title"], "Hello World");
        assert_eq!(params["note"], "x");
        assert!(parse_params("card").is_empty());
    }

    #[test]
    fn test_use_fills_slots_from_params() {
        let defs = blocks(
            "<% block card %><h1><% slot title %>Default Title<% /slot %></h1><p><% slot body %>Default Body<% /slot %></p><% /block %>",
        );
        let out = expand(
            "<% use card title=\"Custom\" body=\"\" %>",
            &defs,
            &matcher(),
            &mut Vec::new(),
        );
        assert_eq!(out, "<h1>Custom</h1><p>Default Body</p>");
        assert_eq!(expand("<% use missing %>", &defs, &matcher(), &mut Vec::new()), "");
    }

    #[test]
    fn test_call_fills_named_and_unnamed_slots() {
        let defs = blocks(
            "<% block box %><h2><% slot title %>T<% /slot %></h2><div><% slot %>D<% /slot %></div><% /block %>",
        );
        let out = expand(
            "<% call box title=\"Param\" %>\n  <% slot title %>Slot Title<% /slot %>\n  Body text\n<% /call %>",
            &defs,
            &matcher(),
            &mut Vec::new(),
        );
        assert_eq!(out, "<h2>Slot Title</h2><div>Body text</div>");

        let out = expand(
            "<% apply box %><% slot %>Explicit<% /slot %>ignored<% /apply %>",
            &defs,
            &matcher(),
            &mut Vec::new(),
        );
        assert_eq!(out, "<h2>T</h2><div>Explicit</div>");
    }

    #[test]
    fn test_self_referencing_use_terminates() {
        let defs = blocks("<% block loop %>x<% use loop %><% /block %>");
        assert_eq!(expand("<% use loop %>", &defs, &matcher(), &mut Vec::new()), "x");
    }

    #[test]
    fn test_parent_and_child_substitution() {
        let m = matcher();
        assert_eq!(substitute_parent("Child: <% parent %>", " Base ", &m), "Child: Base");
        assert_eq!(
            substitute_child(" Inner ", "Before <% child %> After", &m),
            "Before Inner After"
        );
        assert_eq!(substitute_child("Inner", "No marker", &m), "Inner");
    }

    #[test]
    fn test_fill_slots() {
        let m = matcher();
        let ancestor = "<header><% slot head %>Default Head<% /slot %></header><main><% slot %>Default<% /slot %></main>";
        assert_eq!(
            fill_slots("<% slot head %>Custom Head<% /slot %> Loose text ", ancestor, &m),
            "<header>Custom Head</header><main>Loose text</main>"
        );
        assert_eq!(
            fill_slots("<% slot %>Only body<% /slot %>", ancestor, &m),
            "<header>Default Head</header><main>Only body</main>"
        );
        assert_eq!(fill_slots("plain", "no slots", &m), "plain");
    }

    #[test]
    fn test_strip_markers_keeps_other_directives() {
        let out = strip_markers(
            "<% extends base %><% block a %>x<%= y %><% /block %><% slot s %>d<% /slot %>",
            &matcher(),
        );
        assert_eq!(out, "x<%= y %>d");
    }
}
