//! Line-oriented template replacer.
//!
//! Streams a template line by line and replaces lines ending in a marker of
//! the form `##INIT:OPERATOR[:PARAM]##`. This is how the external runner is
//! materialized at install time: values only known inside the image (program
//! list, image name, helper modules, runner plugins) are embedded into the
//! script written to the host.
//!
//! Operators (case-insensitive):
//!
//! - `MODULE:<name>`: insert the source of a module instead of the line
//! - `PLUGINS:<category>`: insert every plugin of the category
//! - `SUPPRESS`: drop the line
//! - `VAR:<name>`: insert `let <name> = <literal>;` from the context
//!
//! ```
//! use dockwrap::{ReplacementContext, Replacer};
//!
//! let template = "let FOO = 1;  // ##INIT:VAR:FOO##\n";
//! let context = ReplacementContext::new().with("FOO", 2_i64);
//! let lines: Vec<String> = Replacer::from_reader(template.as_bytes(), context)
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(lines, vec!["let FOO = 2;\n"]);
//! ```

use crate::modules::{ModuleError, ModuleResolver, Modules};
use crate::value::ReplacementContext;
use dockwrap_plugin_api::DiscoveryError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"##INIT:([^#]+)##$").expect("marker pattern is valid"));

/// Errors raised while expanding a template
#[derive(Debug, Error)]
pub enum ReplaceError {
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Operator {operator} requires a parameter")]
    MissingParameter { operator: &'static str },

    #[error("Operator {operator} takes no parameter, got '{param}'")]
    UnexpectedParameter {
        operator: &'static str,
        param: String,
    },

    #[error("Module lookup failed: {0}")]
    Module(#[from] ModuleError),

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Plugin discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to read plugin {path}: {source}")]
    PluginRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read template: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write output: {0}")]
    Write(#[source] io::Error),
}

/// Built-in marker operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Module,
    Plugins,
    Suppress,
    Var,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::Module => "module",
            Operator::Plugins => "plugins",
            Operator::Suppress => "suppress",
            Operator::Var => "var",
        }
    }
}

impl FromStr for Operator {
    type Err = ReplaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "module" => Ok(Operator::Module),
            "plugins" => Ok(Operator::Plugins),
            "suppress" => Ok(Operator::Suppress),
            "var" => Ok(Operator::Var),
            _ => Err(ReplaceError::InvalidOperator(s.to_string())),
        }
    }
}

/// A marker found at the end of a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Operator as written in the template
    pub operator: String,

    /// Parameter; `None` when absent or empty
    pub param: Option<String>,
}

impl Marker {
    /// Find the marker terminating `line`, ignoring trailing whitespace
    pub fn find(line: &str) -> Option<Marker> {
        let captures = MARKER.captures(line.trim_end())?;
        let body = captures.get(1)?.as_str();
        let (operator, param) = body.split_once(':').unwrap_or((body, ""));

        Some(Marker {
            operator: operator.to_string(),
            param: (!param.is_empty()).then(|| param.to_string()),
        })
    }
}

/// Result of expanding one marked line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Replaces the line verbatim; carries its own newline if any
    Line(String),

    /// Replaces the line with each element in order
    Lines(Vec<String>),
}

/// Reads lines from a [`BufRead`] keeping their terminators
pub struct RawLines<R> {
    reader: R,
}

impl<R: BufRead> RawLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Iterator for RawLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(Ok(line)),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Lazy template expansion over a stream of lines.
///
/// Each call to `next` reads at most one input line; multi-line expansions
/// are queued and drained before the next input line is read. The first
/// error ends the iteration.
pub struct Replacer<I> {
    input: I,
    context: ReplacementContext,
    modules: Box<dyn ModuleResolver>,
    plugin_root: PathBuf,
    pending: VecDeque<String>,
    failed: bool,
}

impl<R: BufRead> Replacer<RawLines<R>> {
    /// Replace lines read from `reader`
    pub fn from_reader(reader: R, context: ReplacementContext) -> Self {
        Self::new(RawLines::new(reader), context)
    }
}

impl<I> Replacer<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    /// Create a replacer over lines that include their line terminators
    pub fn new(input: I, context: ReplacementContext) -> Self {
        Self {
            input,
            context,
            modules: Box::new(Modules::new().with_search_dir(".")),
            plugin_root: dockwrap_plugin_api::default_plugin_root(),
            pending: VecDeque::new(),
            failed: false,
        }
    }

    /// Resolve `MODULE` markers with `modules`
    pub fn with_modules(mut self, modules: impl ModuleResolver + 'static) -> Self {
        self.modules = Box::new(modules);
        self
    }

    /// Look up `PLUGINS` markers under `root`
    pub fn with_plugin_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.plugin_root = root.into();
        self
    }

    /// Write every output line to `out`, returning the number of lines.
    pub fn render_to<W: Write>(self, mut out: W) -> Result<usize, ReplaceError> {
        let mut count = 0;
        for line in self {
            out.write_all(line?.as_bytes()).map_err(ReplaceError::Write)?;
            count += 1;
        }
        out.flush().map_err(ReplaceError::Write)?;
        Ok(count)
    }

    fn expand(&self, line: &str) -> Result<Option<Expansion>, ReplaceError> {
        let Some(marker) = Marker::find(line) else {
            return Ok(None);
        };
        let operator: Operator = marker.operator.parse()?;
        tracing::debug!(operator = operator.name(), param = ?marker.param, "Expanding marker");

        let expansion = match (operator, marker.param) {
            (Operator::Suppress, None) => Expansion::Line(String::new()),
            (Operator::Suppress, Some(param)) => {
                return Err(ReplaceError::UnexpectedParameter {
                    operator: operator.name(),
                    param,
                })
            }
            (_, None) => {
                return Err(ReplaceError::MissingParameter {
                    operator: operator.name(),
                })
            }
            (Operator::Module, Some(name)) => self.handle_module(&name)?,
            (Operator::Plugins, Some(category)) => self.handle_plugins(&category)?,
            (Operator::Var, Some(name)) => self.handle_var(&name)?,
        };
        Ok(Some(expansion))
    }

    fn handle_module(&self, name: &str) -> Result<Expansion, ReplaceError> {
        let source = self.modules.source(name)?;
        if source.is_empty() {
            return Ok(Expansion::Line(source));
        }
        Ok(Expansion::Lines(
            source.split_inclusive('\n').map(str::to_string).collect(),
        ))
    }

    fn handle_plugins(&self, category: &str) -> Result<Expansion, ReplaceError> {
        let plugins = dockwrap_plugin_api::discover(category, &self.plugin_root)?;
        if plugins.is_empty() {
            return Ok(Expansion::Line(String::new()));
        }

        let mut lines = Vec::new();
        for path in &plugins {
            tracing::debug!(plugin = %path.display(), "Inlining plugin");
            read_plugin(path, &mut lines)?;
        }
        Ok(Expansion::Lines(lines))
    }

    fn handle_var(&self, name: &str) -> Result<Expansion, ReplaceError> {
        let value = self
            .context
            .get(name)
            .ok_or_else(|| ReplaceError::UndefinedVariable(name.to_string()))?;
        Ok(Expansion::Line(format!("let {} = {};\n", name, value.to_literal())))
    }
}

/// Append the lines of a plugin file, terminating the last one so that the
/// next plugin starts on a line of its own.
fn read_plugin(path: &Path, lines: &mut Vec<String>) -> Result<(), ReplaceError> {
    let plugin_read = |source| ReplaceError::PluginRead {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(plugin_read)?;
    for line in RawLines::new(BufReader::new(file)) {
        lines.push(line.map_err(plugin_read)?);
    }
    if let Some(last) = lines.last_mut() {
        if !last.ends_with('\n') {
            last.push('\n');
        }
    }
    Ok(())
}

impl<I> Iterator for Replacer<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<String, ReplaceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }
            if self.failed {
                return None;
            }

            let result = match self.input.next()? {
                Ok(line) => self.expand(&line).map(|expansion| (line, expansion)),
                Err(e) => Err(ReplaceError::Read(e)),
            };

            match result {
                Ok((line, None)) => return Some(Ok(line)),
                Ok((_, Some(Expansion::Line(replacement)))) => return Some(Ok(replacement)),
                Ok((_, Some(Expansion::Lines(lines)))) => self.pending.extend(lines),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
