//! Settings shared by the entrypoint and the runner
//!
//! Everything comes from the environment; command-line flags override
//! individual values where a binary accepts them.

use dockwrap::LogConfig;
use dockwrap_plugin_api::{DEFAULT_PLUGIN_DIR, PLUGIN_DIR_ENV};
use std::path::PathBuf;

/// Turns on debug logging (any value except empty, `0` or `false`)
pub const DEBUG_ENV: &str = "DOCKWRAP_DEBUG";

/// Image the installed runner starts
pub const IMAGE_ENV: &str = "DOCKWRAP_IMAGE";

/// Comma-separated programs shipped in the image
pub const PROGS_ENV: &str = "DOCKWRAP_PROGS";

/// Explicit path of the runner script
pub const RUNNER_SCRIPT_ENV: &str = "DOCKWRAP_RUNNER_SCRIPT";

pub const DEFAULT_IMAGE: &str = "dockwrap/dockwrap";

pub const DEFAULT_PROGS: &[&str] = &[
    "ansible",
    "ansible-doc",
    "ansible-galaxy",
    "ansible-playbook",
    "ansible-vault",
    "fab",
];

/// File name of the installed runner script, next to the runner binary
pub const RUNNER_SCRIPT_NAME: &str = "dockwrap-runner.rhai";

/// File name the runner binary is installed under
pub const RUNNER_NAME: &str = "dockwrap";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `init_plugins` and `runner_plugins`
    pub plugin_root: PathBuf,

    pub debug: bool,

    /// Docker image to run programs in
    pub image: String,

    /// Programs available in the image
    pub progs: Vec<String>,

    /// Runner script to use instead of the one next to the executable
    pub runner_script: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plugin_root: PathBuf::from(DEFAULT_PLUGIN_DIR),
            debug: false,
            image: DEFAULT_IMAGE.to_string(),
            progs: DEFAULT_PROGS.iter().map(|s| s.to_string()).collect(),
            runner_script: None,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let set = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Self {
            plugin_root: set(PLUGIN_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.plugin_root),
            debug: lookup(DEBUG_ENV).map_or(false, |v| is_truthy(&v)),
            image: set(IMAGE_ENV).unwrap_or(defaults.image),
            progs: set(PROGS_ENV)
                .map(|v| parse_progs(&v))
                .unwrap_or(defaults.progs),
            runner_script: set(RUNNER_SCRIPT_ENV).map(PathBuf::from),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::with_debug(self.debug)
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no")
}

fn parse_progs(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
