//! # cbt engine
//!
//! Text templates with embedded directives, compiled into an executable
//! program and rendered against JSON data. File templates can inherit from
//! one another through `extends`, override named blocks, and compose
//! reusable fragments with slots.
//!
//! ## Features
//!
//! - **Configurable delimiters**: `<% %>` by default, any distinct pair allowed
//! - **Output filters**: HTML, URL, attribute, money, truncation and join forms
//! - **Control flow**: `if`/`elseif`/`else`, `foreach` with `foreachelse` and
//!   `foreachbreak`, block-scoped `let`
//! - **Sub-templates**: `define`/`run`, selectable at render time
//! - **Inheritance**: `extends`, `block`, `parent`, `child`, `slot`, `use`,
//!   `call`/`apply`
//! - **Compiled cache**: resolved file templates are cached on disk and
//!   revalidated against source modification times
//!
//! ```no_run
//! use cbt_engine::Engine;
//! use serde_json::json;
//!
//! let engine = Engine::default();
//! let html = engine.render("<h1><%= title %></h1>", &json!({"title": "Hi"}))?;
//! assert_eq!(html, "<h1>Hi</h1>");
//! # Ok::<(), cbt_engine::TemplateError>(())
//! ```

pub mod compiler;
pub mod config;
pub mod delimiter;
pub mod engine;
pub mod error;
pub mod expr;
pub mod helpers;
pub mod layout;
pub mod runtime;

pub use compiler::{compile, Filter, Node, Program, MAX_NESTING_DEPTH};
pub use config::{ConfigLoader, EngineConfig, FileOptions, DEFAULT_CACHE_NAME};
pub use delimiter::TagMatcher;
pub use engine::{Engine, VERSION};
pub use error::{ConfigError, Result, TemplateError};
pub use expr::{FunctionRegistry, Value, MAX_EXPRESSION_DEPTH};
pub use layout::{Dependency, ResolvedDocument, Resolver};
pub use runtime::{Template, MAX_SUB_DEPTH};
