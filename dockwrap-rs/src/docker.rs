//! The `docker run` command assembled by the external runner.

use serde::Serialize;
use std::fmt;
use std::process::Command;

/// Launcher used unless replaced
pub const DEFAULT_LAUNCHER: [&str; 2] = ["docker", "run"];

/// Components of a `docker run` invocation.
///
/// Builders mutate the fields directly; [`DockerRunCommand::cmd`] assembles
/// the final command line as launcher, docker args, image, program and
/// program args.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DockerRunCommand {
    /// Command starting the container (`docker run`)
    pub launcher: Vec<String>,

    /// Extra arguments for `docker run`
    pub docker_args: Vec<String>,

    /// Image to run
    pub image: String,

    /// Program to run inside the container
    pub prog: String,

    /// Arguments to the above program
    pub prog_args: Vec<String>,
}

impl DockerRunCommand {
    pub fn new<S: Into<String>>(
        image: impl Into<String>,
        prog: impl Into<String>,
        prog_args: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            launcher: DEFAULT_LAUNCHER.iter().map(|s| s.to_string()).collect(),
            docker_args: Vec::new(),
            image: image.into(),
            prog: prog.into(),
            prog_args: prog_args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_docker_args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.docker_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_launcher<S: Into<String>>(mut self, launcher: impl IntoIterator<Item = S>) -> Self {
        self.launcher = launcher.into_iter().map(Into::into).collect();
        self
    }

    /// Fully assembled command line
    pub fn cmd(&self) -> Vec<String> {
        let mut cmd = Vec::with_capacity(
            self.launcher.len() + self.docker_args.len() + 2 + self.prog_args.len(),
        );
        cmd.extend(self.launcher.iter().cloned());
        cmd.extend(self.docker_args.iter().cloned());
        cmd.push(self.image.clone());
        cmd.push(self.prog.clone());
        cmd.extend(self.prog_args.iter().cloned());
        cmd
    }

    /// A [`Command`] ready to spawn, or `None` if the launcher is empty
    pub fn command(&self) -> Option<Command> {
        if self.launcher.is_empty() {
            return None;
        }
        let cmd = self.cmd();
        let (program, args) = cmd.split_first()?;
        let mut command = Command::new(program);
        command.args(args);
        Some(command)
    }
}

impl fmt::Display for DockerRunCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DockerRunCommand<cmd: \"{}\">", self.cmd().join(" "))
    }
}
