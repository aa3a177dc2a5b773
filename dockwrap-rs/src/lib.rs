//! # dockwrap
//!
//! Core of a container entrypoint/runner pair for tool images.
//!
//! - [`Replacer`]: line-oriented template expansion used to materialize the
//!   external runner script at install time
//! - [`Builders`]: ordered callables invoked with a shared argument bundle
//! - [`DockerRunCommand`]: the `docker run` command assembled by the runner
//! - [`Modules`]: module source lookup for `MODULE` markers
//!
//! Plugin discovery lives in `dockwrap-plugin-api`; executing plugins is
//! the job of `dockwrap-plugin-host`.
//!
//! ## Quick Start
//!
//! ```
//! use dockwrap::{Modules, ReplacementContext, Replacer};
//!
//! let template = "\
//! let PROGS = [];  // ##INIT:VAR:PROGS##
//! // helpers  ##INIT:MODULE:dockwrap.helpers##
//! ";
//! let context = ReplacementContext::new().with("PROGS", vec!["ansible", "fab"]);
//! let modules = Modules::new().with_builtin("dockwrap.helpers", "fn one() { 1 }\n");
//!
//! let mut script = Vec::new();
//! Replacer::from_reader(template.as_bytes(), context)
//!     .with_modules(modules)
//!     .render_to(&mut script)
//!     .unwrap();
//!
//! assert_eq!(
//!     String::from_utf8(script).unwrap(),
//!     "let PROGS = [\"ansible\", \"fab\"];\nfn one() { 1 }\n"
//! );
//! ```

pub mod builders;
pub mod docker;
pub mod modules;
pub mod replacer;
pub mod tracing_support;
pub mod value;

pub use builders::{BuildError, Builders};
pub use docker::DockerRunCommand;
pub use modules::{ModuleError, ModuleResolver, Modules};
pub use replacer::{Expansion, Marker, Operator, RawLines, ReplaceError, Replacer};
pub use tracing_support::{init_logging, LogConfig, LogFormat};
pub use value::{ReplacementContext, Value};

pub use dockwrap_plugin_api as plugin_api;
