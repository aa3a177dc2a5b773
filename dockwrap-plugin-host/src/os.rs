//! Process environment and filesystem functions exposed to plugins.

use crate::bridge::strings;
use rhai::{Array, Dynamic, Engine, EvalAltResult};
use std::path::Path;
use std::process::Command;

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Register environment, path and subprocess functions on `engine`
pub fn register(engine: &mut Engine) {
    engine
        .register_fn("getenv", |name: &str| -> Dynamic {
            std::env::var(name).map(Dynamic::from).unwrap_or(Dynamic::UNIT)
        })
        .register_fn("getenv", |name: &str, default: &str| -> String {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        })
        .register_fn("has_env", |name: &str| std::env::var_os(name).is_some())
        .register_fn("setenv", |name: &str, value: &str| std::env::set_var(name, value))
        .register_fn("unsetenv", |name: &str| std::env::remove_var(name))
        .register_fn("path_exists", |path: &str| Path::new(path).exists())
        .register_fn("is_dir", |path: &str| Path::new(path).is_dir())
        .register_fn("join_path", |base: &str, rest: &str| {
            Path::new(base).join(rest).to_string_lossy().into_owned()
        })
        .register_fn("home_dir", || -> ScriptResult<String> {
            dirs::home_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .ok_or_else(|| "home directory is not known".into())
        })
        .register_fn("cwd", || -> ScriptResult<String> {
            std::env::current_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .map_err(|e| format!("cannot read current directory: {}", e).into())
        })
        .register_fn("run_output", run_output)
        .register_fn("shell_words", |line: &str| -> ScriptResult<Array> {
            let words = shell_words(line).map_err(|e| format!("shell_words: {}", e))?;
            Ok(words.into_iter().map(Dynamic::from).collect())
        });
}

/// Split `line` into words the way a POSIX shell would, without expansions
pub fn shell_words(line: &str) -> Result<Vec<String>, String> {
    shlex::split(line).ok_or_else(|| format!("unbalanced quoting in {:?}", line))
}

/// Run `argv` and return its trimmed stdout; fails on non-zero exit
fn run_output(argv: Array) -> ScriptResult<String> {
    let argv = strings(argv)?;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| -> Box<EvalAltResult> { "run_output: empty command".into() })?;

    tracing::debug!(command = ?argv, "Running command for plugin");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| format!("run_output: cannot run {}: {}", program, e))?;

    if !output.status.success() {
        return Err(format!(
            "run_output: {} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
