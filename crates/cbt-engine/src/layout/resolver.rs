//! Inheritance resolution
//!
//! Every call to [`Resolver::resolve`] works on its own
//! [`ResolutionContext`], so one resolver can serve overlapping calls.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use tracing::debug;

use super::{
    blocks::{self, BlockDef},
    source::{self, TemplateSource},
};
use crate::{
    delimiter::TagMatcher,
    error::{Result, TemplateError},
};

/// A source file the resolved document was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub path: PathBuf,
    pub modified_ms: u64,
}

/// Fully expanded template text, ready for the directive compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    pub text: String,
    /// Leaf first, root last
    pub dependencies: Vec<Dependency>,
}

/// Per-call state: the inheritance chain and the paths already visited
#[derive(Debug, Default)]
pub struct ResolutionContext {
    visited: HashSet<PathBuf>,
    chain: Vec<TemplateSource>,
}

impl ResolutionContext {
    /// Load `leaf` and every ancestor it extends
    async fn load_chain(&mut self, leaf: PathBuf, resolver: &Resolver<'_>) -> Result<()> {
        let mut next = Some(leaf);

        while let Some(path) = next.take() {
            if !self.visited.insert(path.clone()) {
                return Err(TemplateError::CircularInheritance { path });
            }

            let template = source::load(&path).await?;
            if let Some(parent) = blocks::extends_name(&template.content, resolver.matcher) {
                let parent_path = source::extends_path(
                    &parent,
                    &path,
                    resolver.base_path,
                    resolver.default_extension,
                );
                debug!(
                    template = %path.display(),
                    parent = %parent_path.display(),
                    "Following extends"
                );
                next = Some(parent_path);
            }
            self.chain.push(template);
        }

        Ok(())
    }
}

/// Resolves templates relative to a base directory
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    matcher: &'a TagMatcher,
    base_path: &'a Path,
    default_extension: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(matcher: &'a TagMatcher, base_path: &'a Path, default_extension: &'a str) -> Self {
        Self {
            matcher,
            base_path,
            default_extension,
        }
    }

    /// Resolve `name` with its ancestors. With a non-empty `block`, only that
    /// block is returned, or `Block NAME not found!` when there is none.
    pub async fn resolve(&self, name: &str, block: &str) -> Result<ResolvedDocument> {
        let leaf = source::template_path(
            self.base_path,
            &source::with_extension(name, self.default_extension),
        );

        let mut context = ResolutionContext::default();
        context.load_chain(leaf, self).await?;

        let table = BlockTable::build(&context.chain, self.matcher);
        let text = match block {
            "" => {
                let root = context.chain.last().map_or("", |t| t.content.as_str());
                table.render_document(root)
            }
            selected => table
                .render_block(selected)
                .unwrap_or_else(|| format!("Block {} not found!", selected)),
        };

        debug!(
            template = name,
            block,
            depth = context.chain.len(),
            "Resolved template"
        );

        Ok(ResolvedDocument {
            text,
            dependencies: context
                .chain
                .into_iter()
                .map(|t| Dependency {
                    path: t.path,
                    modified_ms: t.modified_ms,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    body: String,
    hidden: bool,
}

/// Resolved body of every block in the chain
struct BlockTable<'m> {
    entries: IndexMap<String, Entry>,
    matcher: &'m TagMatcher,
}

impl<'m> BlockTable<'m> {
    /// Fold the chain from the leaf towards the root. A block the descendant
    /// already has is combined with the ancestor's definition through
    /// `parent`, `child` and `slot`; other ancestor blocks are taken as is.
    /// Visibility follows the most derived definition, so `hide` on either
    /// side of an override is decided by the descendant.
    fn build(chain: &[TemplateSource], matcher: &'m TagMatcher) -> Self {
        let levels: Vec<IndexMap<String, BlockDef>> = chain
            .iter()
            .map(|template| blocks::collect(&template.content, matcher))
            .collect();

        // Raw definitions for `use`/`call`, the most derived one winning
        let mut raw: IndexMap<String, BlockDef> = IndexMap::new();
        for level in levels.iter().rev() {
            for (name, def) in level {
                raw.insert(name.clone(), def.clone());
            }
        }
        let expand = |body: &str| blocks::expand(body, &raw, matcher, &mut Vec::new());

        let mut entries: IndexMap<String, Entry> = IndexMap::new();
        if let Some(leaf) = levels.first() {
            for (name, def) in leaf {
                entries.insert(
                    name.clone(),
                    Entry {
                        body: expand(&def.body),
                        hidden: def.hidden,
                    },
                );
            }
        }

        for level in levels.iter().skip(1) {
            for (name, def) in level {
                let ancestor = expand(&def.body);
                match entries.get_mut(name) {
                    Some(entry) => {
                        let body = blocks::substitute_parent(&entry.body, &ancestor, matcher);
                        let body = blocks::substitute_child(&body, &ancestor, matcher);
                        entry.body = blocks::fill_slots(&body, &ancestor, matcher);
                    }
                    None => {
                        entries.insert(
                            name.clone(),
                            Entry {
                                body: ancestor,
                                hidden: def.hidden,
                            },
                        );
                    }
                }
            }
        }

        Self { entries, matcher }
    }

    fn render_document(&self, root: &str) -> String {
        let rendered = self.render(root, &mut Vec::new());
        blocks::strip_markers(&rendered, self.matcher)
    }

    /// The selected block's resolved body, even when it is hidden
    fn render_block(&self, name: &str) -> Option<String> {
        let entry = self.entries.get(name)?;
        let rendered = self.render(&entry.body, &mut vec![name.to_string()]);
        Some(blocks::strip_markers(&rendered, self.matcher))
    }

    /// Replace block pairs with their resolved bodies, recursively
    fn render(&self, text: &str, expanding: &mut Vec<String>) -> String {
        self.matcher.replace_pairs(text, "block", |pair, body| {
            let Some(name) = pair.open.name() else {
                return String::new();
            };
            if expanding.iter().any(|n| n == name) {
                return String::new();
            }
            match self.entries.get(name) {
                Some(entry) if entry.hidden => String::new(),
                Some(entry) => {
                    expanding.push(name.to_string());
                    let out = self.render(&entry.body, expanding);
                    expanding.pop();
                    out
                }
                None => self.render(body.trim(), expanding),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, name: &str, content: &str) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    async fn resolve(dir: &TempDir, name: &str, block: &str) -> Result<ResolvedDocument> {
        let matcher = TagMatcher::new("<%", "%>").unwrap();
        Resolver::new(&matcher, dir.path(), ".html")
            .resolve(name, block)
            .await
    }

    #[tokio::test]
    async fn test_child_overrides_parent_block() {
        let dir = TempDir::new().unwrap();
        write(&dir, "parent.html", "<main><% block content %>Default<% /block %></main>");
        write(&dir, "child.html", "<% extends parent %><% block content %>Child<% /block %>");

        let doc = resolve(&dir, "child", "").await.unwrap();
        assert_eq!(doc.text, "<main>Child</main>");
        assert_eq!(doc.dependencies.len(), 2);
        assert!(doc.dependencies[0].path.ends_with("child.html"));
    }

    #[tokio::test]
    async fn test_parent_chain_across_three_levels() {
        let dir = TempDir::new().unwrap();
        write(&dir, "grandparent.html", "<% block content %>Grandparent<% /block %>");
        write(
            &dir,
            "parent.html",
            "<% extends grandparent %>\n<% block content %>Parent: <% parent %><% /block %>",
        );
        write(
            &dir,
            "child.html",
            "<% extends parent %>\n<% block content %>Child: <% parent %><% /block %>",
        );

        let doc = resolve(&dir, "child.html", "").await.unwrap();
        assert_eq!(doc.text, "Child: Parent: Grandparent");
    }

    #[tokio::test]
    async fn test_nested_and_hidden_blocks() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "parent.html",
            "<% block content %><% block visible %>Visible Content<% /block %>|<% block hidden hide %>Hidden Content<% /block %><% /block %>",
        );
        write(
            &dir,
            "child.html",
            "<% extends parent %><% block visible %>Child Visible<% /block %>",
        );

        let doc = resolve(&dir, "child", "").await.unwrap();
        assert_eq!(doc.text, "Child Visible|");
    }

    #[tokio::test]
    async fn test_hidden_block_can_be_selected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "page.html", "a<% block tip hide %>Tip<% /block %>b");

        assert_eq!(resolve(&dir, "page", "").await.unwrap().text, "ab");
        assert_eq!(resolve(&dir, "page", "tip").await.unwrap().text, "Tip");
        assert_eq!(
            resolve(&dir, "page", "nope").await.unwrap().text,
            "Block nope not found!"
        );
    }

    #[tokio::test]
    async fn test_extends_resolution_paths() {
        let dir = TempDir::new().unwrap();
        write(&dir, "layouts/base.html", "[<% block body %><% /block %>]");
        write(&dir, "pages/shared.html", "<% extends /layouts/base %>");
        write(
            &dir,
            "pages/home.html",
            "<% extends shared %><% block body %>home<% /block %>",
        );

        let doc = resolve(&dir, "pages/home", "").await.unwrap();
        assert_eq!(doc.text, "[home]");
        assert_eq!(doc.dependencies.len(), 3);
    }

    #[tokio::test]
    async fn test_cycles_are_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.html", "<% extends b %>");
        write(&dir, "b.html", "<% extends c %>");
        write(&dir, "c.html", "<% extends a %>");

        match resolve(&dir, "a", "").await {
            Err(TemplateError::CircularInheritance { path }) => {
                assert!(path.ends_with("a.html"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_ancestor_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "page.html", "<% extends nowhere %>");

        match resolve(&dir, "page", "").await {
            Err(TemplateError::Load { path, .. }) => assert!(path.ends_with("nowhere.html")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
