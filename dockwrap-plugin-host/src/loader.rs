//! Plugin loader using Rhai
//!
//! Discovers the plugins of a category and executes each one, in sorted
//! order, against a shared [`Namespace`].

use crate::hooks::{self, HookStore, ScriptCallable};
use crate::{bridge, os, Namespace};
use dockwrap_plugin_api::{discover, discover_matching, DiscoveryError};
use rhai::Engine;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Maximum expression nesting at the top level of a plugin
pub const MAX_EXPR_DEPTH: usize = 64;

/// Maximum expression nesting inside plugin functions
pub const MAX_FUNCTION_EXPR_DEPTH: usize = 32;

/// Errors that can occur during plugin loading
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to read plugin {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compile {origin}: {message}")]
    Compile { origin: String, message: String },

    #[error("Failed to execute {origin}: {message}")]
    Execute { origin: String, message: String },
}

/// Plugin loader with a configured Rhai engine
pub struct PluginLoader {
    engine: Rc<Engine>,
    root: PathBuf,
    hooks: Rc<HookStore>,
    hook_names: Vec<String>,
}

/// Builder for [`PluginLoader`]
pub struct PluginLoaderBuilder {
    engine: Engine,
    root: PathBuf,
    hooks: Rc<HookStore>,
    hook_names: Vec<String>,
}

impl PluginLoaderBuilder {
    fn new(root: PathBuf) -> Self {
        let mut engine = Engine::new();
        // same limits in debug and release builds
        engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH);
        engine.on_print(|text| tracing::info!(target: "dockwrap::plugin", "{}", text));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(
                target: "dockwrap::plugin",
                source = source.unwrap_or("<script>"),
                position = %pos,
                "{}",
                text
            )
        });
        bridge::register(&mut engine);
        os::register(&mut engine);

        Self {
            engine,
            root,
            hooks: Rc::new(HookStore::default()),
            hook_names: Vec::new(),
        }
    }

    /// Expose a registration hook named `name` to plugins
    ///
    /// Callables passed to it are collected with [`PluginLoader::take_hook`].
    pub fn hook(mut self, name: &str) -> Self {
        hooks::register_hook(&mut self.engine, name, Rc::clone(&self.hooks));
        self.hook_names.push(name.to_string());
        self
    }

    /// Limit the number of operations a single script may perform
    pub fn max_operations(mut self, operations: u64) -> Self {
        self.engine.set_max_operations(operations);
        self
    }

    /// Register additional native functions or types
    pub fn configure(mut self, f: impl FnOnce(&mut Engine)) -> Self {
        f(&mut self.engine);
        self
    }

    pub fn build(self) -> PluginLoader {
        PluginLoader {
            engine: Rc::new(self.engine),
            root: self.root,
            hooks: self.hooks,
            hook_names: self.hook_names,
        }
    }
}

impl PluginLoader {
    /// Start building a loader reading plugins under `root`
    pub fn builder(root: impl Into<PathBuf>) -> PluginLoaderBuilder {
        PluginLoaderBuilder::new(root.into())
    }

    /// Loader without hooks or extra functions
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::builder(root).build()
    }

    /// Root directory holding `<category>_plugins` directories
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Hook names exposed to plugins
    pub fn hook_names(&self) -> &[String] {
        &self.hook_names
    }

    /// Execute every plugin of `category` into `ns`
    ///
    /// Plugins run in sorted filename order. The first plugin that fails to
    /// read, compile or execute aborts the load; plugins after it do not
    /// run. Returns the paths executed.
    pub fn load(&self, category: &str, ns: &mut Namespace) -> Result<Vec<PathBuf>, LoadError> {
        let plugins = discover(category, &self.root)?;
        self.run_all(category, &plugins, ns)?;
        Ok(plugins)
    }

    /// Like [`PluginLoader::load`], restricted to stems matching `pattern`
    pub fn load_matching(
        &self,
        category: &str,
        ns: &mut Namespace,
        pattern: &str,
    ) -> Result<Vec<PathBuf>, LoadError> {
        let plugins = discover_matching(category, &self.root, pattern)?;
        self.run_all(category, &plugins, ns)?;
        Ok(plugins)
    }

    fn run_all(&self, category: &str, plugins: &[PathBuf], ns: &mut Namespace) -> Result<(), LoadError> {
        for path in plugins {
            let source = fs::read_to_string(path).map_err(|source| LoadError::Read {
                path: path.clone(),
                source,
            })?;
            self.run_script(&path.display().to_string(), &source, ns)?;
        }

        tracing::debug!(category, count = plugins.len(), "Plugins loaded");
        Ok(())
    }

    /// Execute `source` into `ns` as if it were a plugin named `origin`
    pub fn run_script(&self, origin: &str, source: &str, ns: &mut Namespace) -> Result<(), LoadError> {
        // 1. Compile
        let compiled = self.engine.compile(source).map_err(|e| LoadError::Compile {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;

        // 2. Link against functions defined by earlier scripts
        let mut ast = ns.link(&compiled);
        ast.set_source(origin);
        let ast = Rc::new(ast);

        // 3. Execute with hooks bound to this script
        {
            let _unit = self.hooks.enter(origin, Rc::clone(&ast));
            self.engine
                .run_ast_with_scope(ns.scope_mut(), &ast)
                .map_err(|e| LoadError::Execute {
                    origin: origin.to_string(),
                    message: e.to_string(),
                })?;
        }
        ns.absorb(&compiled);

        tracing::debug!(plugin = origin, "Plugin executed");
        Ok(())
    }

    /// Remove and return callables registered through `hook`, in
    /// registration order
    pub fn take_hook(&self, hook: &str) -> Vec<ScriptCallable> {
        self.hooks.take(hook, &self.engine)
    }

    /// Number of callables currently registered through `hook`
    pub fn hook_count(&self, hook: &str) -> usize {
        self.hooks.count(hook)
    }
}
