//! The runner script template and its rendering.
//!
//! The template ships inside the binaries. `install` renders it once into
//! the target directory; the runner renders whatever script it is given
//! again before executing it, which is a no-op for an installed script and
//! a full materialization when it runs from the template.

use crate::config::Settings;
use anyhow::{Context, Result};
use dockwrap::{Modules, ReplacementContext, Replacer};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Source of the external runner script
pub const RUNNER_TEMPLATE: &str = include_str!("../runner/external_runner.rhai");

/// Module name of the runner helper functions
pub const HELPERS_MODULE: &str = "dockwrap.runner";

/// Helper functions inlined into the runner script
pub const HELPERS: &str = include_str!("../runner/helpers.rhai");

/// Replacement variables every runner script receives
pub fn context(settings: &Settings, image: &str) -> ReplacementContext {
    ReplacementContext::new()
        .with("PROGS", settings.progs.clone())
        .with("DOCKER_IMAGE", image)
}

/// Modules available to `MODULE` markers, with `dir` searched after the
/// built-in ones
pub fn modules(dir: Option<&Path>) -> Modules {
    let modules = Modules::new().with_builtin(HELPERS_MODULE, HELPERS);
    match dir {
        Some(dir) => modules.with_search_dir(dir),
        None => modules,
    }
}

/// Render `source` into `out`
///
/// `dir` is the directory the source came from, searched for modules.
pub fn render(
    source: impl Read,
    dir: Option<&Path>,
    context: ReplacementContext,
    settings: &Settings,
    out: impl Write,
) -> Result<usize> {
    let lines = Replacer::from_reader(BufReader::new(source), context)
        .with_modules(modules(dir))
        .with_plugin_root(&settings.plugin_root)
        .render_to(out)?;
    Ok(lines)
}

/// Render the script at `path`, or the built-in template when `path` is
/// `None`, into a string
pub fn render_script(
    path: Option<&Path>,
    context: ReplacementContext,
    settings: &Settings,
) -> Result<String> {
    let mut out = Vec::new();
    match path {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            render(file, path.parent(), context, settings, &mut out)
                .with_context(|| format!("failed to render {}", path.display()))?;
        }
        None => {
            render(RUNNER_TEMPLATE.as_bytes(), None, context, settings, &mut out)
                .context("failed to render the built-in runner template")?;
        }
    }
    String::from_utf8(out).context("rendered runner script is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn settings(root: &Path) -> Settings {
        Settings {
            plugin_root: root.to_path_buf(),
            progs: vec!["ansible".to_string(), "fab".to_string()],
            ..Settings::default()
        }
    }

    #[test]
    fn test_template_is_materialized() {
        let root = TempDir::new().unwrap();
        let settings = settings(root.path());

        let script = render_script(None, context(&settings, "me/tools"), &settings).unwrap();

        assert!(script.contains("let PROGS = [\"ansible\", \"fab\"];\n"));
        assert!(script.contains("let DOCKER_IMAGE = \"me/tools\";\n"));
        assert!(script.contains("fn mount("));
        assert!(!script.contains("##INIT:"));
    }

    #[test]
    fn test_runner_plugins_are_inlined() {
        let root = TempDir::new().unwrap();
        let dir = dockwrap_plugin_api::plugin_dir("runner", root.path());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("extra.rhai"), "let EXTRA = 1;").unwrap();
        let settings = settings(root.path());

        let script = render_script(None, context(&settings, "img"), &settings).unwrap();
        assert!(script.contains("let EXTRA = 1;\n"));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let root = TempDir::new().unwrap();
        let settings = settings(root.path());
        let once = render_script(None, context(&settings, "img"), &settings).unwrap();

        let installed = root.path().join("dockwrap-runner.rhai");
        fs::write(&installed, &once).unwrap();
        let twice = render_script(Some(&installed), ReplacementContext::new(), &settings).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_modules_from_script_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("site")).unwrap();
        fs::write(dir.path().join("site").join("extra.rhai"), "fn extra() { 1 }\n").unwrap();
        let script = dir.path().join("runner.rhai");
        fs::write(&script, "// ##INIT:MODULE:site.extra##\n").unwrap();
        let settings = settings(dir.path());

        let out = render_script(Some(&script), ReplacementContext::new(), &settings).unwrap();
        assert_eq!(out, "fn extra() { 1 }\n");
    }
}
