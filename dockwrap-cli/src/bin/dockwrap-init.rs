//! Container entrypoint.
//!
//! # Usage
//!
//! ```bash
//! # Run a program after the init plugins prepared it
//! dockwrap-init ansible-playbook site.yml
//!
//! # Install the runner and program links on the host
//! docker run --rm -v $HOME/.local/bin:/target dockwrap/dockwrap install
//! ```

use dockwrap::init_logging;
use dockwrap_cli::init::{self, InitCall};
use dockwrap_cli::{install, CliError, Settings};
use std::env;
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let settings = Settings::from_env();
    init_logging(&settings.log_config());

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((prog, rest)) = args.split_first() else {
        print_help();
        return ExitCode::FAILURE;
    };

    let result = match prog.as_str() {
        "--help" | "-h" => {
            print_help();
            return ExitCode::SUCCESS;
        }
        "install" => install::parse_args(rest)
            .and_then(|args| install::install(&args, &settings, &mut io::stdout().lock())),
        _ => init::run(&settings, InitCall::new(prog.as_str(), rest.to_vec()))
            .map(|never| match never {})
            .map_err(CliError::from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dockwrap-init: {:#}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn print_help() {
    println!(
        r#"dockwrap-init - dockwrap container entrypoint

USAGE:
    dockwrap-init <PROG> [ARGS...]     Initialize and run PROG
    dockwrap-init install [OPTIONS]    Install the runner into /target

Run 'dockwrap-init install --help' for the install options.
"#
    );
}
