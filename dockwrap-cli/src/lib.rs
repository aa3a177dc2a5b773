//! # dockwrap-cli
//!
//! The two programs of a dockwrap image:
//!
//! - `dockwrap-init`, the container entrypoint: runs the `init` plugins'
//!   initializers and then `exec`s the requested program, or installs the
//!   runner into a host directory mounted at `/target`
//! - `dockwrap-run`, the external runner installed on the host: turns a
//!   program invocation into `docker run ... <image> <prog> <args>`
//!
//! Both read their [`Settings`](config::Settings) from the environment.

pub mod config;
pub mod error;
pub mod files;
pub mod init;
pub mod install;
pub mod runner;
pub mod template;

pub use config::Settings;
pub use error::{CliError, CliResult};
