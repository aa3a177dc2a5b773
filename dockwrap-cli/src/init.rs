//! Container-side initialization.
//!
//! Loads the `init` plugins, lets every registered initializer adjust the
//! program arguments, then replaces the current process with the program.

use crate::config::Settings;
use crate::files;
use anyhow::{Context, Result};
use dockwrap::Builders;
use dockwrap_plugin_api::category;
use dockwrap_plugin_host::{Namespace, PluginLoader, ScriptCallable, StringList};
use std::convert::Infallible;
use std::os::unix::process::CommandExt;
use std::process::Command;

/// Hook plugins use to register initializers
pub const INIT_HOOK: &str = "initfunc";

/// Program and arguments the container will run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitCall {
    pub prog: String,
    pub args: Vec<String>,
}

impl InitCall {
    pub fn new(prog: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            prog: prog.into(),
            args,
        }
    }

    /// The full command line
    pub fn cmd(&self) -> Vec<String> {
        std::iter::once(self.prog.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Plugin loader with the init capabilities
pub fn loader(settings: &Settings) -> PluginLoader {
    PluginLoader::builder(&settings.plugin_root)
        .hook(INIT_HOOK)
        .configure(files::register)
        .build()
}

/// Adapt a script initializer to the native argument bundle
///
/// The script receives `args` as a shared list; its changes are copied
/// back once it returns.
fn initializer(callable: ScriptCallable) -> impl FnMut(&mut InitCall) -> Result<()> {
    move |call: &mut InitCall| {
        let args = StringList::new(call.args.iter().cloned());
        callable.call((call.prog.clone(), args.clone()))?;
        call.args = args.to_vec();
        Ok(())
    }
}

/// Load init plugins and run the registered initializers on `call`
pub fn prepare(settings: &Settings, mut call: InitCall) -> Result<InitCall> {
    let loader = loader(settings);
    let mut ns = Namespace::new();
    ns.set("PROG", call.prog.clone());

    let loaded = loader
        .load(category::INIT, &mut ns)
        .context("failed to load init plugins")?;
    tracing::debug!(plugins = loaded.len(), root = %settings.plugin_root.display(), "Init plugins loaded");

    let mut initializers: Builders<InitCall> = Builders::new();
    for callable in loader.take_hook(INIT_HOOK) {
        let name = format!("{}:{}", callable.origin(), callable.name());
        initializers.add(name, initializer(callable));
    }

    initializers.invoke(&mut call)?;
    tracing::debug!(prog = %call.prog, args = ?call.args, "Initialized");
    Ok(call)
}

/// Initialize and `exec` the program; returns only on failure
pub fn run(settings: &Settings, call: InitCall) -> Result<Infallible> {
    let call = prepare(settings, call)?;
    tracing::debug!(cmd = %call.cmd().join(" "), "Executing");

    let err = Command::new(&call.prog).args(&call.args).exec();
    Err(err).with_context(|| format!("failed to execute {}", call.prog))
}
