//! dockwrap-plugin-host: Rhai plugin host runtime for dockwrap
//!
//! Plugins are `.rhai` scripts under `<root>/<category>_plugins/`. The
//! [`PluginLoader`] runs them in sorted order against one shared
//! [`Namespace`], so later plugins see what earlier ones bound. Plugins hand
//! callables back to the host through registration hooks such as
//! `initfunc(...)`; the host collects them with
//! [`PluginLoader::take_hook`] and adds them to a [`dockwrap::Builders`]
//! list.
//!
//! ```
//! use dockwrap_plugin_host::{Namespace, PluginLoader, StringList};
//!
//! let loader = PluginLoader::builder("/nonexistent").hook("initfunc").build();
//! let mut ns = Namespace::new();
//! loader
//!     .run_script("demo", r#"initfunc(|prog, args| args.push(prog + "!"));"#, &mut ns)
//!     .unwrap();
//!
//! let args = StringList::new(["-v"]);
//! for callable in loader.take_hook("initfunc") {
//!     callable.call(("ansible".to_string(), args.clone())).unwrap();
//! }
//! assert_eq!(args.to_vec(), vec!["-v", "ansible!"]);
//! ```

pub mod bridge;
pub mod hooks;
pub mod loader;
pub mod namespace;
pub mod os;

pub use bridge::{DockerRun, StringList};
pub use hooks::{ScriptCallable, ScriptError};
pub use loader::{LoadError, PluginLoader, PluginLoaderBuilder};
pub use namespace::Namespace;

pub use rhai;
