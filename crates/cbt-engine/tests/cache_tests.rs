//! Compiled-cache behavior of file templates

use std::{
    fs::File,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use cbt_cache::cache_key;
use cbt_engine::{Engine, EngineConfig, FileOptions};
use serde_json::json;
use tempfile::TempDir;

fn setup() -> (TempDir, Engine) {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("views")).unwrap();
    let engine = Engine::new(EngineConfig {
        base_path: dir.path().join("views"),
        cache_path: dir.path().join("cache"),
        ..Default::default()
    })
    .unwrap();
    (dir, engine)
}

fn view(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join("views").join(name)
}

fn set_mtime(path: &Path, time: SystemTime) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(time).unwrap();
}

async fn render(engine: &Engine, name: &str) -> String {
    let out = engine
        .render_file(name, &json!({"who": "cache"}), &FileOptions::default())
        .await
        .unwrap();
    engine.flush_cache_writes().await;
    out
}

#[tokio::test]
async fn test_repeated_compiles_are_identical() {
    let (dir, engine) = setup();
    std::fs::write(view(&dir, "page.html"), "<p>Hello <%= who %></p>").unwrap();

    let first = render(&engine, "page").await;
    let second = render(&engine, "page").await;
    assert_eq!(first, "<p>Hello cache</p>");
    assert_eq!(first, second);

    let entry = dir
        .path()
        .join("cache")
        .join(cache_key("page.html", "", ".html"));
    assert!(entry.exists());
}

#[tokio::test]
async fn test_unchanged_mtime_serves_cached_program() {
    let (dir, engine) = setup();
    let path = view(&dir, "page.html");
    std::fs::write(&path, "v1").unwrap();
    let original = std::fs::metadata(&path).unwrap().modified().unwrap();

    assert_eq!(render(&engine, "page").await, "v1");

    // Same modification time: the cached program is still considered fresh
    std::fs::write(&path, "v2").unwrap();
    set_mtime(&path, original);
    assert_eq!(render(&engine, "page").await, "v1");

    set_mtime(&path, SystemTime::now() + Duration::from_secs(5));
    assert_eq!(render(&engine, "page").await, "v2");
}

#[tokio::test]
async fn test_deeply_nested_template_is_served_from_cache() {
    let (dir, engine) = setup();
    let path = view(&dir, "deep.html");
    let nested = |body: &str| {
        format!(
            "{}{}{}",
            "<% if (true) %>".repeat(40),
            body,
            "<% /if %>".repeat(40)
        )
    };
    std::fs::write(&path, nested("first")).unwrap();
    let original = std::fs::metadata(&path).unwrap().modified().unwrap();

    assert_eq!(render(&engine, "deep").await, "first");
    assert!(dir
        .path()
        .join("cache")
        .join(cache_key("deep.html", "", ".html"))
        .exists());

    // Only a decoded cache entry can still produce the old text
    std::fs::write(&path, nested("second")).unwrap();
    set_mtime(&path, original);
    assert_eq!(render(&engine, "deep").await, "first");
}

#[tokio::test]
async fn test_ancestor_change_invalidates_entry() {
    let (dir, engine) = setup();
    let parent = view(&dir, "parent.html");
    std::fs::write(&parent, "A:<% block b %><% /block %>").unwrap();
    std::fs::write(
        view(&dir, "child.html"),
        "<% extends parent %><% block b %>x<% /block %>",
    )
    .unwrap();

    assert_eq!(render(&engine, "child").await, "A:x");

    std::fs::write(&parent, "B:<% block b %><% /block %>").unwrap();
    set_mtime(&parent, SystemTime::now() + Duration::from_secs(5));
    assert_eq!(render(&engine, "child").await, "B:x");
}

#[tokio::test]
async fn test_block_selectors_use_separate_entries() {
    let (dir, engine) = setup();
    std::fs::write(
        view(&dir, "page.html"),
        "<% block a %>first<% /block %><% block b %>second<% /block %>",
    )
    .unwrap();

    let a = engine
        .render_file("page", &json!({}), &FileOptions::default().with_block("a"))
        .await
        .unwrap();
    let b = engine
        .render_file("page", &json!({}), &FileOptions::default().with_block("b"))
        .await
        .unwrap();
    engine.flush_cache_writes().await;

    assert_eq!((a.as_str(), b.as_str()), ("first", "second"));
    let cache = dir.path().join("cache");
    assert!(cache.join(cache_key("page.html", "a", ".html")).exists());
    assert!(cache.join(cache_key("page.html", "b", ".html")).exists());
}

#[tokio::test]
async fn test_corrupt_entry_is_recompiled() {
    let (dir, engine) = setup();
    std::fs::write(view(&dir, "page.html"), "fine").unwrap();
    let cache = dir.path().join("cache");
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::write(cache.join(cache_key("page.html", "", ".html")), "garbage").unwrap();

    assert_eq!(render(&engine, "page").await, "fine");
    assert_eq!(render(&engine, "page").await, "fine");
}

#[tokio::test]
async fn test_locked_entry_renders_without_writing() {
    let (dir, engine) = setup();
    std::fs::write(view(&dir, "page.html"), "locked").unwrap();
    let cache = dir.path().join("cache");
    let key = cache_key("page.html", "", ".html");
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::write(cache.join(format!("{}.lock", key)), "").unwrap();

    assert_eq!(render(&engine, "page").await, "locked");
    assert!(!cache.join(&key).exists());
}

#[tokio::test]
async fn test_cache_name_selects_derived_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("page.html"), "named").unwrap();
    let engine = Engine::new(EngineConfig {
        base_path: dir.path().to_path_buf(),
        ..Default::default()
    })
    .unwrap();

    let cache_name = format!("cbt-test-{:x}", path_hash(dir.path()));
    let options = FileOptions::default().with_cache_name(&cache_name);
    engine.render_file("page", &json!({}), &options).await.unwrap();
    engine.flush_cache_writes().await;

    let cache_dir = engine.config().cache_dir(Some(&cache_name));
    assert!(cache_dir.starts_with(std::env::temp_dir().join(&cache_name)));
    assert!(cache_dir.join(cache_key("page.html", "", ".html")).exists());
    std::fs::remove_dir_all(std::env::temp_dir().join(&cache_name)).unwrap();
}

fn path_hash(path: &Path) -> u64 {
    path.to_string_lossy()
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}
