//! Ordered lists of builder callables.
//!
//! A builder list collects callables that contribute to a single run: the
//! initializers of the container entrypoint, or the argument-parser and
//! `docker run` builders of the external runner. Every builder receives the
//! same argument bundle, in registration order, and works by mutating it.

use std::fmt;
use thiserror::Error;

type BuilderFn<A> = Box<dyn FnMut(&mut A) -> anyhow::Result<()>>;

/// A builder failed; the remaining builders were not invoked
#[derive(Debug, Error)]
#[error("Builder '{builder}' failed: {source}")]
pub struct BuildError {
    /// Name the builder was registered under
    pub builder: String,

    #[source]
    pub source: anyhow::Error,
}

/// Append-only list of builders sharing the argument bundle `A`.
///
/// A list belongs to one run; create a new one for every run.
///
/// ```
/// use dockwrap::Builders;
///
/// let mut builders: Builders<Vec<String>> = Builders::new();
/// builders.add("first", |args| {
///     args.push("-i".to_string());
///     Ok(())
/// });
/// builders.add("second", |args| {
///     args.push("--rm".to_string());
///     Ok(())
/// });
///
/// let mut args = Vec::new();
/// builders.invoke(&mut args).unwrap();
/// assert_eq!(args, vec!["-i", "--rm"]);
/// ```
pub struct Builders<A> {
    entries: Vec<(String, BuilderFn<A>)>,
}

impl<A> Builders<A> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a builder; it runs after every builder added before it
    pub fn add<F>(&mut self, name: impl Into<String>, builder: F)
    where
        F: FnMut(&mut A) -> anyhow::Result<()> + 'static,
    {
        self.entries.push((name.into(), Box::new(builder)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builder names in invocation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Invoke every builder in order with `args`, stopping at the first error
    pub fn invoke(&mut self, args: &mut A) -> Result<(), BuildError> {
        for (name, builder) in self.entries.iter_mut() {
            tracing::trace!(builder = %name, "Invoking builder");
            builder(args).map_err(|source| BuildError {
                builder: name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl<A> Default for Builders<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Builders<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
