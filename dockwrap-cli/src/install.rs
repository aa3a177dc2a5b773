//! Installation of the runner on the host.
//!
//! The host directory is mounted at the target (`/target` by default). The
//! rendered runner script and the runner binary go there, together with a
//! link per program pointing at the runner.

use crate::config::{Settings, DEFAULT_IMAGE, IMAGE_ENV, RUNNER_NAME, RUNNER_SCRIPT_NAME};
use crate::error::{CliError, CliResult};
use crate::template;
use anyhow::{anyhow, Context};
use clap::Parser;
use dockwrap::ReplacementContext;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Binary installed as the runner unless `--runner-bin` says otherwise
pub const RUNNER_BIN: &str = "dockwrap-run";

/// Install a runner and shortcuts to all supported programs
#[derive(Debug, Clone, Parser)]
#[command(name = "install")]
pub struct InstallArgs {
    /// Name of the docker image the runner starts
    #[arg(long, env = IMAGE_ENV, default_value = DEFAULT_IMAGE)]
    pub image_name: String,

    /// Only install the runner, skip the links
    #[arg(long)]
    pub no_links: bool,

    /// Directory to install into, mounted from the host
    #[arg(long, default_value = "/target")]
    pub target: PathBuf,

    /// Runner template to render instead of the built-in one
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Runner binary to install (default: dockwrap-run next to this program)
    #[arg(long)]
    pub runner_bin: Option<PathBuf>,

    /// JSON object with extra replacement variables
    #[arg(long, value_name = "FILE")]
    pub vars: Option<PathBuf>,

    /// Do not require the target to be a mountpoint
    #[arg(long)]
    pub skip_mount_check: bool,
}

fn is_mountpoint(path: &Path) -> bool {
    Command::new("mountpoint")
        .arg("-q")
        .arg(path)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn default_runner_bin() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate the current executable")?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow!("executable {} has no parent directory", exe.display()))?;
    Ok(dir.join(RUNNER_BIN))
}

fn replacements(args: &InstallArgs, settings: &Settings) -> anyhow::Result<ReplacementContext> {
    let mut context = template::context(settings, &args.image_name);
    if let Some(path) = &args.vars {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let vars = ReplacementContext::from_json(&json)
            .with_context(|| format!("invalid variables in {}", path.display()))?;
        context.extend(vars);
    }
    Ok(context)
}

fn install_script(args: &InstallArgs, settings: &Settings) -> anyhow::Result<PathBuf> {
    let context = replacements(args, settings)?;
    let dst = args.target.join(RUNNER_SCRIPT_NAME);
    let out = File::create(&dst).with_context(|| format!("failed to create {}", dst.display()))?;
    let mut out = BufWriter::new(out);

    let lines = match &args.template {
        Some(path) => {
            let src =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            template::render(src, path.parent(), context, settings, &mut out)
                .with_context(|| format!("failed to render {}", path.display()))?
        }
        None => template::render(
            template::RUNNER_TEMPLATE.as_bytes(),
            None,
            context,
            settings,
            &mut out,
        )
        .context("failed to render the built-in runner template")?,
    };
    out.flush()
        .with_context(|| format!("failed to write {}", dst.display()))?;

    tracing::info!(script = %dst.display(), lines, "Runner script installed");
    Ok(dst)
}

fn install_runner(args: &InstallArgs) -> anyhow::Result<PathBuf> {
    let src = match &args.runner_bin {
        Some(path) => path.clone(),
        None => default_runner_bin()?,
    };
    let dst = args.target.join(RUNNER_NAME);
    fs::copy(&src, &dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;

    tracing::info!(runner = %dst.display(), "Runner installed");
    Ok(dst)
}

fn install_links(args: &InstallArgs, settings: &Settings, out: &mut impl Write) -> anyhow::Result<()> {
    write!(out, "installing links ... ")?;
    for prog in &settings.progs {
        let link = args.target.join(prog);
        write!(out, " {}", prog)?;
        if link.symlink_metadata().is_ok() {
            write!(out, " (skip)")?;
            continue;
        }
        std::os::unix::fs::symlink(RUNNER_NAME, &link)
            .with_context(|| format!("failed to link {}", link.display()))?;
    }
    writeln!(out)?;
    Ok(())
}

/// Install the runner into the target directory
///
/// Progress goes to `out`. Fails with [`CliError::NotMounted`] when the
/// target is not a mountpoint, unless the check is skipped.
pub fn install(args: &InstallArgs, settings: &Settings, out: &mut impl Write) -> CliResult<()> {
    if !args.skip_mount_check && !is_mountpoint(&args.target) {
        return Err(CliError::NotMounted {
            target: args.target.clone(),
        });
    }

    writeln!(out, "installing runner").context("failed to write output")?;
    install_script(args, settings)?;
    install_runner(args)?;

    if args.no_links {
        writeln!(out, "skipping links").context("failed to write output")?;
        return Ok(());
    }
    install_links(args, settings, out)?;
    Ok(())
}

/// Parse `install` options; `argv` excludes the `install` word itself
pub fn parse_args(argv: &[String]) -> CliResult<InstallArgs> {
    InstallArgs::try_parse_from(std::iter::once("install".to_string()).chain(argv.iter().cloned()))
        .map_err(|e| CliError::usage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        target: TempDir,
        runner: PathBuf,
        _bin: TempDir,
        settings: Settings,
    }

    fn fixture() -> Fixture {
        let bin = TempDir::new().unwrap();
        let runner = bin.path().join(RUNNER_BIN);
        fs::write(&runner, "#!/bin/sh\n").unwrap();
        Fixture {
            target: TempDir::new().unwrap(),
            runner,
            settings: Settings {
                plugin_root: bin.path().join("plugins"),
                progs: vec!["ansible".to_string(), "fab".to_string()],
                ..Settings::default()
            },
            _bin: bin,
        }
    }

    fn args(f: &Fixture, extra: &[&str]) -> InstallArgs {
        let mut argv = vec![
            "--skip-mount-check".to_string(),
            "--target".to_string(),
            f.target.path().display().to_string(),
            "--runner-bin".to_string(),
            f.runner.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        parse_args(&argv).unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        let args = parse_args(&[]).unwrap();
        assert_eq!(args.target, PathBuf::from("/target"));
        assert!(!args.no_links);
        assert!(!args.skip_mount_check);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = parse_args(&["--bogus".to_string()]).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_install() {
        let f = fixture();
        let mut out = Vec::new();

        install(&args(&f, &["--image-name", "me/tools"]), &f.settings, &mut out).unwrap();

        let script = fs::read_to_string(f.target.path().join(RUNNER_SCRIPT_NAME)).unwrap();
        assert!(script.contains("let PROGS = [\"ansible\", \"fab\"];"));
        assert!(script.contains("let DOCKER_IMAGE = \"me/tools\";"));
        assert!(f.target.path().join(RUNNER_NAME).is_file());

        let link = fs::read_link(f.target.path().join("fab")).unwrap();
        assert_eq!(link, PathBuf::from(RUNNER_NAME));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "installing runner\ninstalling links ...  ansible fab\n"
        );
    }

    #[test]
    fn test_existing_links_are_skipped() {
        let f = fixture();
        fs::write(f.target.path().join("ansible"), "mine").unwrap();
        let mut out = Vec::new();

        install(&args(&f, &[]), &f.settings, &mut out).unwrap();

        assert_eq!(fs::read_to_string(f.target.path().join("ansible")).unwrap(), "mine");
        assert!(String::from_utf8(out).unwrap().contains(" ansible (skip) fab"));
    }

    #[test]
    fn test_no_links() {
        let f = fixture();
        let mut out = Vec::new();

        install(&args(&f, &["--no-links"]), &f.settings, &mut out).unwrap();

        assert!(f.target.path().join(RUNNER_SCRIPT_NAME).exists());
        assert!(!f.target.path().join("fab").exists());
        assert!(String::from_utf8(out).unwrap().ends_with("skipping links\n"));
    }

    #[test]
    fn test_extra_vars() {
        let f = fixture();
        let template = f.target.path().join("custom.rhai");
        fs::write(&template, "let REGION = \"\";  // ##INIT:VAR:REGION##\n").unwrap();
        let vars = f.target.path().join("vars.json");
        fs::write(&vars, r#"{"REGION": "eu-west-1"}"#).unwrap();

        install(
            &args(
                &f,
                &[
                    "--no-links",
                    "--template",
                    &template.display().to_string(),
                    "--vars",
                    &vars.display().to_string(),
                ],
            ),
            &f.settings,
            &mut Vec::new(),
        )
        .unwrap();

        let script = fs::read_to_string(f.target.path().join(RUNNER_SCRIPT_NAME)).unwrap();
        assert_eq!(script, "let REGION = \"eu-west-1\";\n");
    }

    #[test]
    fn test_not_mounted() {
        let f = fixture();
        let mut args = args(&f, &[]);
        args.skip_mount_check = false;
        args.target = f.target.path().join("not-a-mount");

        let err = install(&args, &f.settings, &mut Vec::new()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!args.target.join(RUNNER_SCRIPT_NAME).exists());
    }

    #[test]
    fn test_missing_runner_binary() {
        let f = fixture();
        let mut args = args(&f, &[]);
        args.runner_bin = Some(f.target.path().join("missing"));

        let err = install(&args, &f.settings, &mut Vec::new()).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(format!("{:#}", err).contains("failed to copy"));
    }
}
