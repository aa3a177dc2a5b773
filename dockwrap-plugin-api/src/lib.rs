//! dockwrap-plugin-api: plugin layout contract shared by the host and tooling
//!
//! Plugins are Rhai scripts grouped by category. A category lives in its own
//! directory under a plugin root:
//!
//! ```text
//! <root>/init_plugins/ssh.rhai
//! <root>/runner_plugins/dev_src.rhai
//! ```
//!
//! Discovery is flat and sorted, so the execution order of plugins (and the
//! order in which they mutate a shared namespace) is reproducible.

use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extension of plugin scripts
pub const PLUGIN_EXTENSION: &str = "rhai";

/// Environment variable overriding the plugin root
pub const PLUGIN_DIR_ENV: &str = "DOCKWRAP_PLUGIN_DIR";

/// Plugin root used when [`PLUGIN_DIR_ENV`] is not set
pub const DEFAULT_PLUGIN_DIR: &str = "/usr/local/share/dockwrap";

/// Well-known plugin categories
pub mod category {
    /// Plugins executed by the container entrypoint
    pub const INIT: &str = "init";

    /// Plugins inlined into the external runner
    pub const RUNNER: &str = "runner";
}

/// Errors that can occur during plugin discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to read plugin directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid plugin name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Directory holding plugins of `category` under `root`
pub fn plugin_dir(category: &str, root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(format!("{}_plugins", category))
}

/// Plugin root from the environment, falling back to [`DEFAULT_PLUGIN_DIR`]
pub fn default_plugin_root() -> PathBuf {
    std::env::var_os(PLUGIN_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PLUGIN_DIR))
}

/// Return the plugin files of `category`, sorted by path.
///
/// Hidden files are skipped. A missing category directory is not an error:
/// it yields no plugins.
pub fn discover(category: &str, root: impl AsRef<Path>) -> Result<Vec<PathBuf>, DiscoveryError> {
    discover_matching(category, root, "*")
}

/// Like [`discover`], keeping only plugins whose file stem matches `pattern`.
///
/// The pattern is a shell-style wildcard: `*` matches any run of characters
/// and `?` a single one.
pub fn discover_matching(
    category: &str,
    root: impl AsRef<Path>,
    pattern: &str,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let dir = plugin_dir(category, root);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let matcher = wildcard(pattern)?;
    let entries = std::fs::read_dir(&dir).map_err(|source| DiscoveryError::ReadDirectory {
        path: dir.clone(),
        source,
    })?;

    let mut plugins = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| DiscoveryError::ReadDirectory {
                path: dir.clone(),
                source,
            })?
            .path();

        if !path.is_file() || path.extension().map_or(true, |e| e != PLUGIN_EXTENSION) {
            continue;
        }

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem.starts_with('.') {
            continue;
        }
        if matcher.is_match(stem) {
            plugins.push(path);
        }
    }

    plugins.sort();
    Ok(plugins)
}

fn wildcard(pattern: &str) -> Result<Regex, DiscoveryError> {
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');

    Regex::new(&re).map_err(|source| DiscoveryError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// How a runner option consumes its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Boolean switch, no value
    Flag,

    /// Takes a single value; the last occurrence wins
    Value,

    /// Takes a value and may be repeated; values accumulate
    Multi,
}

/// Option contributed to the external runner's argument parser
///
/// Runner options use `+` as prefix character (`++name`, `+x`) so that
/// everything starting with `-` is left for the program in the container.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    /// Option name, used as `++name` and as key in the parsed arguments
    /// (with dashes turned into underscores)
    pub name: String,

    /// Short option character (e.g., `O` for `+O`)
    pub short: Option<char>,

    /// Value handling
    pub kind: ArgKind,

    /// Help text for this option
    pub help: String,

    /// Default value if not provided
    pub default_value: Option<String>,
}

impl ArgSpec {
    /// Create an option of the given kind
    pub fn new(name: impl Into<String>, kind: ArgKind, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: None,
            kind,
            help: help.into(),
            default_value: None,
        }
    }

    /// Add a short option character
    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Key under which the parsed value is exposed
    pub fn key(&self) -> String {
        self.name.replace('-', "_")
    }
}
