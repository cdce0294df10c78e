//! File template tests: inheritance, blocks, slots and composition

use std::path::Path;

use cbt_engine::{Engine, EngineConfig, FileOptions, TemplateError};
use serde_json::json;
use tempfile::TempDir;

struct Views {
    dir: TempDir,
    engine: Engine,
}

impl Views {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(EngineConfig {
            base_path: dir.path().to_path_buf(),
            cache_path: dir.path().join(".cache"),
            ..Default::default()
        })
        .unwrap();
        Self { dir, engine }
    }

    fn write(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new("."))).unwrap();
        std::fs::write(path, content).unwrap();
    }

    async fn render(&self, name: &str, data: serde_json::Value) -> String {
        self.render_block(name, "", data).await
    }

    async fn render_block(&self, name: &str, block: &str, data: serde_json::Value) -> String {
        let options = FileOptions::default().with_block(block).without_cache();
        self.engine.render_file(name, &data, &options).await.unwrap()
    }
}

#[tokio::test]
async fn test_child_block_replaces_parent_default() {
    let views = Views::new();
    views.write(
        "parent.html",
        "<html><% block content %>Default<% /block %></html>",
    );
    views.write(
        "child.html",
        "<% extends parent %><% block content %>Child<% /block %>",
    );

    let out = views.render("child", json!({})).await;
    assert!(out.contains("Child"));
    assert!(!out.contains("Default"));
}

#[tokio::test]
async fn test_hidden_block_without_override_is_empty() {
    let views = Views::new();
    views.write("one.html", "[<% block tip hide %>Tip<% /block %>]");
    views.write("two.html", "<% extends one %>");
    views.write("three.html", "<% extends two %>");

    for name in ["one", "two", "three"] {
        assert_eq!(views.render(name, json!({})).await, "[]", "{}", name);
    }
}

#[tokio::test]
async fn test_visible_override_of_hidden_block_renders() {
    let views = Views::new();
    views.write("parent.html", "a<% block x hide %>P<% /block %>b");
    views.write(
        "child.html",
        "<% extends parent %><% block x %>C<% /block %>",
    );

    assert_eq!(views.render("parent", json!({})).await, "ab");
    assert_eq!(views.render("child", json!({})).await, "aCb");
}

#[tokio::test]
async fn test_hidden_override_of_visible_block_is_empty() {
    let views = Views::new();
    views.write("parent.html", "a<% block x %>P<% /block %>b");
    views.write(
        "child.html",
        "<% extends parent %><% block x hide %>C<% /block %>",
    );
    views.write("grandchild.html", "<% extends child %>");

    assert_eq!(views.render("parent", json!({})).await, "aPb");
    assert_eq!(views.render("child", json!({})).await, "ab");
    assert_eq!(views.render("grandchild", json!({})).await, "ab");
    // Selecting the block directly still yields its body
    assert_eq!(views.render_block("child", "x", json!({})).await, "C");
}

#[tokio::test]
async fn test_child_marker_wraps_descendant_body() {
    let views = Views::new();
    views.write(
        "base.html",
        "<% block main %><section><% child %></section><% /block %>",
    );
    views.write(
        "page.html",
        "<% extends base %><% block main %><p><%= text %></p><% /block %>",
    );

    assert_eq!(
        views.render("page", json!({"text": "hi"})).await,
        "<section><p>hi</p></section>"
    );
}

#[tokio::test]
async fn test_slots_filled_from_child_block() {
    let views = Views::new();
    views.write(
        "layout.html",
        "<% block page %><h1><% slot title %>Untitled<% /slot %></h1><div><% slot %>Nothing<% /slot %></div><% /block %>",
    );
    views.write(
        "post.html",
        "<% extends layout %><% block page %><% slot title %><%= title %><% /slot %>Body of <%= title %><% /block %>",
    );

    assert_eq!(
        views.render("post", json!({"title": "Post"})).await,
        "<h1>Post</h1><div>Body of Post</div>"
    );
}

#[tokio::test]
async fn test_use_and_call_compose_blocks() {
    let views = Views::new();
    views.write(
        "components.html",
        "<% block card hide %><div class=\"card\"><b><% slot title %>Card<% /slot %></b><% slot %><% /slot %></div><% /block %>",
    );
    views.write(
        "page.html",
        "<% extends components %><% block body %><% use card title=\"Used\" %>|<% call card %><% slot title %>Called<% /slot %>Content<% /call %><% /block %>",
    );

    // `body` is not in the root template, so select it explicitly
    assert_eq!(
        views.render_block("page", "body", json!({})).await,
        "<div class=\"card\"><b>Used</b></div>|<div class=\"card\"><b>Called</b>Content</div>"
    );
}

#[tokio::test]
async fn test_block_selection() {
    let views = Views::new();
    views.write(
        "page.html",
        "<% block head %><title><%= title %></title><% /block %><% block body %>body<% /block %>",
    );

    assert_eq!(
        views.render_block("page", "head", json!({"title": "T"})).await,
        "<title>T</title>"
    );
    assert_eq!(
        views.render_block("page", "missing", json!({})).await,
        "Block missing not found!"
    );
}

#[tokio::test]
async fn test_two_node_cycle_fails_fast() {
    let views = Views::new();
    views.write("a.html", "<% extends b %>");
    views.write("b.html", "<% extends a %>");

    let result = views
        .engine
        .compile_file("a", &FileOptions::default().without_cache())
        .await;
    assert!(matches!(
        result,
        Err(TemplateError::CircularInheritance { .. })
    ));
}

#[tokio::test]
async fn test_missing_template_is_a_load_error() {
    let views = Views::new();
    let result = views
        .engine
        .compile_file("absent", &FileOptions::default())
        .await;
    match result {
        Err(TemplateError::Load { path, .. }) => assert!(path.ends_with("absent.html")),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_inherited_directives_compile_after_resolution() {
    let views = Views::new();
    views.write(
        "list.html",
        "<ul><% block items %><% /block %></ul>",
    );
    views.write(
        "names.html",
        "<% extends list %><% block items %><% foreach (n in names) %><li><%= n %></li><% /foreach %><% /block %>",
    );

    assert_eq!(
        views.render("names", json!({"names": ["x", "y"]})).await,
        "<ul><li>x</li><li>y</li></ul>"
    );
}
