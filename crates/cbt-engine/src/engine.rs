//! Engine API
//!
//! [`Engine`] ties the pieces together: inline templates go straight to the
//! directive compiler, file templates are resolved with their ancestors and
//! cached on disk as encoded programs.

use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use cbt_cache::{cache_key, CacheEntry, CompiledCache, Manifest};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    compiler::{self, Program},
    config::{EngineConfig, FileOptions},
    delimiter::TagMatcher,
    error::{ConfigError, Result},
    expr::{FunctionRegistry, Value},
    layout::{source, ResolvedDocument, Resolver},
    runtime::Template,
};

/// Engine version recorded in every cache manifest
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Template engine
///
/// Cloning is cheap and clones share the configuration, the registered
/// functions and the queue of pending cache writes.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    matcher: Arc<TagMatcher>,
    functions: Arc<FunctionRegistry>,
    pending_writes: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let matcher = TagMatcher::new(&config.left_delimiter, &config.right_delimiter)?;

        Ok(Self {
            config: Arc::new(config),
            matcher: Arc::new(matcher),
            functions: Arc::new(FunctionRegistry::new()),
            pending_writes: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Make `function` callable from directives as `name(...)`
    ///
    /// Templates compiled before the call keep the functions they were
    /// compiled with.
    pub fn register_function<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.functions).register(name, function);
    }

    /// Compile inline template text
    pub fn compile(&self, text: &str) -> Result<Template> {
        let program = compiler::compile(text, &self.matcher, self.config.escape)?;
        Ok(self.template(program))
    }

    pub fn render(&self, text: &str, data: &serde_json::Value) -> Result<String> {
        self.compile(text)?.render(data)
    }

    pub fn render_sub(&self, text: &str, data: &serde_json::Value, sub: &str) -> Result<String> {
        self.compile(text)?.render_sub(data, sub)
    }

    /// Resolve `name` against the base path without compiling it
    pub async fn resolve_file(&self, name: &str, block: &str) -> Result<ResolvedDocument> {
        self.resolver().resolve(name, block).await
    }

    /// Resolve and compile a template file
    ///
    /// With caching enabled a fresh cache entry is used as is; otherwise the
    /// compiled program is written back in the background.
    pub async fn compile_file(&self, name: &str, options: &FileOptions) -> Result<Template> {
        let name = source::with_extension(name, &self.config.default_extension);
        let extension = Path::new(&name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let key = cache_key(&name, &options.block, &extension);

        let cache = options.cache.then(|| {
            CompiledCache::on_disk(
                self.config.cache_dir(options.cache_name.as_deref()),
                VERSION,
                self.config.lock_stale_after(),
            )
        });

        if let Some(cache) = &cache {
            if let Some(entry) = cache.lookup(&key).await {
                match Program::decode(&entry.body) {
                    Ok(program) => {
                        debug!(template = %name, key = %key, "Using cached program");
                        return Ok(self.template(program));
                    }
                    Err(e) => warn!("Discarding undecodable cache entry {}: {}", key, e),
                }
            }
        }

        let document = self.resolver().resolve(&name, &options.block).await?;
        let program = compiler::compile(&document.text, &self.matcher, self.config.escape)?;

        if let Some(cache) = cache {
            let mut manifest = Manifest::new(VERSION);
            for dependency in &document.dependencies {
                manifest.record(dependency.path.to_string_lossy(), dependency.modified_ms);
            }
            match program.encode() {
                Ok(body) => self.spawn_store(cache, key, CacheEntry::new(manifest, body)),
                Err(e) => warn!("Cannot encode program for {}: {}", name, e),
            }
        }

        Ok(self.template(program))
    }

    pub async fn render_file(
        &self,
        name: &str,
        data: &serde_json::Value,
        options: &FileOptions,
    ) -> Result<String> {
        self.compile_file(name, options).await?.render(data)
    }

    /// Wait for every cache write started so far
    pub async fn flush_cache_writes(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self
                .pending_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            pending.drain(..).collect()
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Cache write task failed: {}", e);
            }
        }
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            &self.matcher,
            &self.config.base_path,
            &self.config.default_extension,
        )
    }

    fn template(&self, program: Program) -> Template {
        Template::new(program, Arc::clone(&self.functions))
    }

    fn spawn_store(&self, cache: CompiledCache, key: String, entry: CacheEntry) {
        let handle = tokio::spawn(async move {
            cache.store(&key, &entry).await;
        });

        let mut pending = self
            .pending_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
            .unwrap_or_else(|_| unreachable!("default configuration is valid"))
    }
}
