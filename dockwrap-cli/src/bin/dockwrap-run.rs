//! External runner, installed on the host as `dockwrap` with one link per
//! program.
//!
//! # Usage
//!
//! ```bash
//! # Through a program link
//! fab ++debug deploy
//!
//! # Directly
//! dockwrap +O net=host ansible all -m ping
//! ```

use dockwrap::init_logging;
use dockwrap_cli::{runner, Settings};
use std::env;
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let argv: Vec<String> = env::args().collect();

    let mut settings = Settings::from_env();
    if argv.iter().skip(1).any(|arg| arg == "++debug") {
        settings.debug = true;
    }
    init_logging(&settings.log_config());

    match runner::run(&settings, &argv, &mut io::stdout().lock()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("dockwrap: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
