//! Module source resolution for the `MODULE` operator.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extension of script modules on disk
pub const MODULE_EXTENSION: &str = "rhai";

/// Errors that can occur while resolving a module
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Invalid module name: '{0}'")]
    InvalidName(String),

    #[error("Module not found: {name} (searched {searched:?})")]
    NotFound { name: String, searched: Vec<PathBuf> },

    #[error("Failed to read module {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Looks up the full source text of a module by its dotted name
pub trait ModuleResolver {
    fn source(&self, name: &str) -> Result<String, ModuleError>;
}

/// Default resolver: embedded modules first, then search directories.
///
/// A dotted name `a.b.c` maps to `<dir>/a/b/c.rhai` in each search
/// directory, in the order the directories were added.
#[derive(Debug, Clone, Default)]
pub struct Modules {
    builtin: BTreeMap<String, Cow<'static, str>>,
    search_path: Vec<PathBuf>,
}

impl Modules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module whose source is compiled into the binary
    pub fn with_builtin(
        mut self,
        name: impl Into<String>,
        source: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.builtin.insert(name.into(), source.into());
        self
    }

    /// Append a directory to the search path
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_path.push(dir.into());
        self
    }

    /// Candidate file paths for `name`, in lookup order
    pub fn candidates(&self, name: &str) -> Result<Vec<PathBuf>, ModuleError> {
        let relative = relative_path(name)?;
        Ok(self
            .search_path
            .iter()
            .map(|dir| dir.join(&relative))
            .collect())
    }
}

impl ModuleResolver for Modules {
    fn source(&self, name: &str) -> Result<String, ModuleError> {
        if let Some(source) = self.builtin.get(name) {
            return Ok(source.to_string());
        }

        let searched = self.candidates(name)?;
        match searched.iter().find(|path| path.is_file()) {
            Some(path) => read_module(path),
            None => Err(ModuleError::NotFound {
                name: name.to_string(),
                searched,
            }),
        }
    }
}

fn relative_path(name: &str) -> Result<PathBuf, ModuleError> {
    let valid = !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if !valid {
        return Err(ModuleError::InvalidName(name.to_string()));
    }

    let mut path: PathBuf = name.split('.').collect();
    path.set_extension(MODULE_EXTENSION);
    Ok(path)
}

fn read_module(path: &Path) -> Result<String, ModuleError> {
    std::fs::read_to_string(path).map_err(|source| ModuleError::Read {
        path: path.to_path_buf(),
        source,
    })
}
