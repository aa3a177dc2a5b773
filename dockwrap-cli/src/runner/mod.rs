//! The external runner.
//!
//! Wraps `docker run -it --rm <image>`: runner options (prefixed with `+`)
//! adjust the docker invocation, everything else goes to the program in the
//! container. The runner script and its inlined plugins extend both steps
//! through `argparse_builder` and `docker_run_builder`.

pub mod args;
pub mod base;

use crate::config::{Settings, RUNNER_SCRIPT_NAME};
use crate::template;
use anyhow::{anyhow, Context, Result};
use args::ParserSpec;
use base::DockerRunCall;
use dockwrap::{Builders, DockerRunCommand, Value};
use dockwrap_plugin_host::{DockerRun, Namespace, PluginLoader};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Hook for option builders, run before parsing
pub const ARGPARSE_HOOK: &str = "argparse_builder";

/// Hook for command builders, run after parsing
pub const DOCKER_RUN_HOOK: &str = "docker_run_builder";

pub const DESCRIPTION: &str = "Run a program in a dockwrap container.";

/// What the runner decided to do
#[derive(Debug)]
pub enum Plan {
    /// Print usage
    Help(String),

    /// Run (or with `++dry-run`, print) a docker command
    Run {
        command: DockerRunCommand,
        dry_run: bool,
    },
}

/// A loaded runner script
pub struct Runner {
    loader: PluginLoader,
    ns: Namespace,
    settings: Settings,
    invoked_as: String,
}

/// Runner script to execute: explicit setting, else the installed script
/// next to the executable; `None` means the built-in template
pub fn script_path(settings: &Settings) -> Option<PathBuf> {
    if let Some(path) = &settings.runner_script {
        return Some(path.clone());
    }
    let exe = std::env::current_exe().ok()?;
    let candidate = exe.parent()?.join(RUNNER_SCRIPT_NAME);
    candidate.is_file().then_some(candidate)
}

/// Basename of `argv0`
pub fn invocation_name(argv0: &str) -> String {
    Path::new(argv0)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| argv0.to_string())
}

impl Runner {
    /// Render and run the runner script
    pub fn load(settings: &Settings, invoked_as: &str) -> Result<Self> {
        let path = script_path(settings);
        let source = template::render_script(
            path.as_deref(),
            template::context(settings, &settings.image),
            settings,
        )?;
        let origin = path
            .as_ref()
            .map_or_else(|| "<built-in runner>".to_string(), |p| p.display().to_string());

        let loader = PluginLoader::builder(&settings.plugin_root)
            .hook(ARGPARSE_HOOK)
            .hook(DOCKER_RUN_HOOK)
            .configure(args::register)
            .build();

        let mut ns = Namespace::new();
        ns.set("DOCKER_IMAGE", settings.image.clone());
        ns.set_value("PROGS", &Value::from(settings.progs.clone()));
        loader
            .run_script(&origin, &source, &mut ns)
            .context("failed to run the runner script")?;
        tracing::debug!(script = %origin, "Runner script loaded");

        Ok(Self {
            loader,
            ns,
            settings: settings.clone(),
            invoked_as: invoked_as.to_string(),
        })
    }

    /// Image set by the runner script
    pub fn image(&self) -> String {
        self.ns
            .get::<String>("DOCKER_IMAGE")
            .unwrap_or_else(|| self.settings.image.clone())
    }

    /// Programs listed by the runner script
    pub fn progs(&self) -> Vec<String> {
        match self.ns.get_value("PROGS") {
            Some(Value::List(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Str(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => self.settings.progs.clone(),
        }
    }

    fn argparse_builders(&self) -> Builders<ParserSpec> {
        let mut builders: Builders<ParserSpec> = Builders::new();
        builders.add(
            "argparse_base",
            base::argparse_base(&self.invoked_as, &self.progs()),
        );
        for callable in self.loader.take_hook(ARGPARSE_HOOK) {
            let name = format!("{}:{}", callable.origin(), callable.name());
            builders.add(name, move |parser: &mut ParserSpec| {
                callable.call((parser.clone(),))?;
                Ok(())
            });
        }
        builders
    }

    fn docker_run_builders(&self) -> Builders<DockerRunCall> {
        let mut builders: Builders<DockerRunCall> = Builders::new();
        builders.add("docker_run_base", base::docker_run_base);
        builders.add("docker_run_opts", base::docker_run_opts);
        for callable in self.loader.take_hook(DOCKER_RUN_HOOK) {
            let name = format!("{}:{}", callable.origin(), callable.name());
            builders.add(name, move |call: &mut DockerRunCall| {
                callable.call((call.args.to_map(), call.run.clone()))?;
                Ok(())
            });
        }
        builders
    }

    /// Parse `args` (without the program name) and build the command
    pub fn plan(self, args: &[String]) -> Result<Plan> {
        let mut parser = ParserSpec::new(DESCRIPTION);
        self.argparse_builders().invoke(&mut parser)?;

        let parsed = parser.parse(args)?;
        tracing::debug!(args = ?parsed, "Runner arguments");
        if parsed.flag("help") {
            return Ok(Plan::Help(parser.render_help(&self.invoked_as)));
        }
        parser.require_prog(&parsed)?;
        let prog = parsed
            .prog()
            .ok_or_else(|| anyhow!("no program to run"))?
            .to_string();

        let run = DockerRun::new(DockerRunCommand::new(
            self.image(),
            prog,
            parsed.rest.clone(),
        ));
        let mut call = DockerRunCall { args: parsed, run };
        self.docker_run_builders().invoke(&mut call)?;

        let command = call.run.snapshot();
        tracing::debug!(docker_run = %command, "Command assembled");
        Ok(Plan::Run {
            command,
            dry_run: call.args.flag("dry_run"),
        })
    }
}

/// Carry out `plan`, returning the exit status
pub fn execute(plan: Plan, out: &mut impl Write) -> Result<u8> {
    match plan {
        Plan::Help(text) => {
            write!(out, "{}", text)?;
            Ok(0)
        }
        Plan::Run {
            command,
            dry_run: true,
        } => {
            writeln!(out, "{}", command.cmd().join(" "))?;
            Ok(0)
        }
        Plan::Run { command, .. } => {
            let mut cmd = command
                .command()
                .ok_or_else(|| anyhow!("no command to start the container with"))?;
            let status = cmd
                .status()
                .with_context(|| format!("failed to run {}", command.launcher.join(" ")))?;
            tracing::debug!(%status, "Container exited");
            Ok(status.code().map_or(1, |code| code.clamp(0, 255) as u8))
        }
    }
}

/// Runner entry: `argv` includes the invocation name
pub fn run(settings: &Settings, argv: &[String], out: &mut impl Write) -> Result<u8> {
    let (argv0, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("empty command line"))?;
    let runner = Runner::load(settings, &invocation_name(argv0))?;
    execute(runner.plan(args)?, out)
}
