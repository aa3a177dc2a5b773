//! Builders every runner starts with.

use super::args::{ParsedArgs, ParserSpec, PROG_KEY};
use anyhow::Result;
use dockwrap::Value;
use dockwrap_plugin_api::{ArgKind, ArgSpec};
use dockwrap_plugin_host::DockerRun;

/// Names under which the runner takes the program as first argument
pub const RUNNER_NAMES: &[&str] = &["dockwrap", "dockwrap-run", "external-runner"];

/// Environment variable the container sees when the runner debugs
pub const CONTAINER_DEBUG: &str = "DOCKWRAP_DEBUG=true";

/// Arguments handed to docker run builders
#[derive(Debug, Clone)]
pub struct DockerRunCall {
    pub args: ParsedArgs,
    pub run: DockerRun,
}

/// Options of the runner itself
///
/// Invoked under one of [`RUNNER_NAMES`], the first positional argument
/// names the program; through a program link the link name does.
pub fn argparse_base(invoked_as: &str, progs: &[String]) -> impl FnMut(&mut ParserSpec) -> Result<()> {
    let invoked_as = invoked_as.to_string();
    let prog_help = format!("program to run (e.g.: install, {})", progs.join(", "));

    move |parser: &mut ParserSpec| {
        if RUNNER_NAMES.contains(&invoked_as.as_str()) {
            parser.prog_positional(prog_help.clone());
        } else {
            parser.set_default(PROG_KEY, invoked_as.as_str());
        }

        parser.add(ArgSpec::new("debug", ArgKind::Flag, "enable debugging output"));
        parser.add(
            ArgSpec::new(
                "docker-opt",
                ArgKind::Multi,
                "pass specified long-style option to docker run",
            )
            .with_short('O'),
        );
        parser.add(ArgSpec::new("help", ArgKind::Flag, "show this help message and exit"));
        parser.add(ArgSpec::new(
            "dry-run",
            ArgKind::Flag,
            "print the docker command instead of running it",
        ));
        parser.set_default("docker_opt", Value::List(Vec::new()));
        Ok(())
    }
}

/// Interactive, self-removing container; debug propagates inside
pub fn docker_run_base(call: &mut DockerRunCall) -> Result<()> {
    let debug = call.args.flag("debug");
    call.run.update(|cmd| {
        cmd.docker_args.extend(["-i", "-t", "--rm"].map(String::from));
        if debug {
            cmd.docker_args.extend(["-e".to_string(), CONTAINER_DEBUG.to_string()]);
        }
    });
    Ok(())
}

/// `+O opt` becomes `--opt`
pub fn docker_run_opts(call: &mut DockerRunCall) -> Result<()> {
    let opts = call.args.list("docker_opt");
    call.run.update(|cmd| {
        cmd.docker_args
            .extend(opts.iter().map(|opt| format!("--{}", opt)));
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockwrap::DockerRunCommand;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn parse(invoked_as: &str, args: &[&str]) -> ParsedArgs {
        let mut parser = ParserSpec::new("test");
        argparse_base(invoked_as, &argv(&["ansible", "fab"]))(&mut parser).unwrap();
        parser.parse(&argv(args)).unwrap()
    }

    fn build(args: ParsedArgs) -> Vec<String> {
        let prog = args.prog().unwrap_or_default().to_string();
        let mut call = DockerRunCall {
            run: DockerRun::new(DockerRunCommand::new("img", prog, args.rest.clone())),
            args,
        };
        docker_run_base(&mut call).unwrap();
        docker_run_opts(&mut call).unwrap();
        call.run.snapshot().cmd()
    }

    #[test]
    fn test_invoked_through_link() {
        let args = parse("fab", &["deploy", "-H", "web1"]);
        assert_eq!(args.prog(), Some("fab"));
        assert_eq!(
            build(args),
            argv(&["docker", "run", "-i", "-t", "--rm", "img", "fab", "deploy", "-H", "web1"])
        );
    }

    #[test]
    fn test_invoked_as_runner() {
        let args = parse("dockwrap", &["ansible", "all", "-m", "ping"]);
        assert_eq!(args.prog(), Some("ansible"));
        assert_eq!(args.rest, argv(&["all", "-m", "ping"]));
    }

    #[test]
    fn test_debug_and_docker_opts() {
        let args = parse("fab", &["++debug", "+O", "net=host", "++docker-opt", "privileged", "x"]);
        assert_eq!(
            build(args),
            argv(&[
                "docker",
                "run",
                "-i",
                "-t",
                "--rm",
                "-e",
                "DOCKWRAP_DEBUG=true",
                "--net=host",
                "--privileged",
                "img",
                "fab",
                "x"
            ])
        );
    }

    #[test]
    fn test_help_and_dry_run_flags() {
        let args = parse("fab", &["++help", "++dry-run"]);
        assert!(args.flag("help"));
        assert!(args.flag("dry_run"));
    }
}
