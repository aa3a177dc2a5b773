//! Runner option parsing.
//!
//! Runner options are prefixed with `+` (`++debug`, `+O opt`) so that
//! anything starting with `-` reaches the program in the container. Known
//! options are picked out of the command line wherever they appear and
//! parsed with `clap`; everything else, in order, becomes the program
//! arguments.

use dockwrap::Value;
use dockwrap_plugin_api::{ArgKind, ArgSpec};
use dockwrap_plugin_host::bridge;
use dockwrap_plugin_host::rhai::{Dynamic, Engine, EvalAltResult, Map};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;
use thiserror::Error;

/// Key of the program positional
pub const PROG_KEY: &str = "prog";

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("option +{0} requires a value")]
    MissingValue(String),

    #[error("option ++{0} does not take a value")]
    UnexpectedValue(String),

    #[error("the following arguments are required: {0}")]
    MissingPositional(&'static str),

    #[error(transparent)]
    Parse(#[from] clap::Error),
}

#[derive(Debug, Default)]
struct ParserState {
    description: String,
    options: Vec<ArgSpec>,
    prog_help: Option<String>,
    defaults: BTreeMap<String, Value>,
}

/// Shared, mutable description of the runner's options
///
/// Argparse builders (native and script) add options and defaults to it
/// before the command line is parsed.
#[derive(Debug, Clone, Default)]
pub struct ParserSpec(Rc<RefCell<ParserState>>);

/// Result of parsing the runner command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    values: BTreeMap<String, Value>,

    /// Arguments for the program in the container
    pub rest: Vec<String>,
}

impl ParsedArgs {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value of a flag; false if unset
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(Value::Bool(true)))
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Strings of a list value; empty if unset
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::Str(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn prog(&self) -> Option<&str> {
        self.string(PROG_KEY)
    }

    /// Values as a script object map
    pub fn to_map(&self) -> Map {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str().into(), bridge::to_dynamic(v)))
            .collect()
    }
}

impl ParserSpec {
    pub fn new(description: impl Into<String>) -> Self {
        let spec = Self::default();
        spec.0.borrow_mut().description = description.into();
        spec
    }

    /// Add an option, replacing any option of the same name
    pub fn add(&self, spec: ArgSpec) {
        let mut state = self.0.borrow_mut();
        state.options.retain(|o| o.name != spec.name);
        state.options.push(spec);
    }

    /// Take the first positional argument as the program
    pub fn prog_positional(&self, help: impl Into<String>) {
        self.0.borrow_mut().prog_help = Some(help.into());
    }

    /// Value of `key` when no option sets it
    pub fn set_default(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().defaults.insert(key.into(), value.into());
    }

    pub fn options(&self) -> Vec<ArgSpec> {
        self.0.borrow().options.clone()
    }

    fn find_long(&self, name: &str) -> Option<ArgSpec> {
        self.0.borrow().options.iter().find(|o| o.name == name).cloned()
    }

    fn find_short(&self, short: char) -> Option<ArgSpec> {
        self.0
            .borrow()
            .options
            .iter()
            .find(|o| o.short == Some(short))
            .cloned()
    }

    fn command(&self) -> clap::Command {
        let state = self.0.borrow();
        let mut cmd = clap::Command::new("dockwrap")
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .args_override_self(true);

        for option in &state.options {
            let arg = clap::Arg::new(option.key()).long(option.name.clone());
            let arg = match option.kind {
                ArgKind::Flag => arg.action(clap::ArgAction::SetTrue),
                ArgKind::Value => arg
                    .action(clap::ArgAction::Set)
                    .num_args(1)
                    .allow_hyphen_values(true),
                ArgKind::Multi => arg
                    .action(clap::ArgAction::Append)
                    .num_args(1)
                    .allow_hyphen_values(true),
            };
            cmd = cmd.arg(arg);
        }
        cmd
    }

    /// Split `args` into runner options and program arguments, then parse
    /// the options
    pub fn parse(&self, args: &[String]) -> Result<ParsedArgs, ArgsError> {
        let takes_prog = self.0.borrow().prog_help.is_some();
        let mut known = Vec::new();
        let mut rest = Vec::new();
        let mut prog = None;
        let mut tokens = args.iter();

        while let Some(token) = tokens.next() {
            let (spec, inline) = if let Some(long) = token.strip_prefix("++") {
                match long.split_once('=') {
                    Some((name, value)) => (self.find_long(name), Some(value.to_string())),
                    None => (self.find_long(long), None),
                }
            } else if let Some(short) = token.strip_prefix('+') {
                let mut chars = short.chars();
                match chars.next() {
                    Some(c) => {
                        let attached = chars.as_str();
                        let spec = self.find_short(c);
                        let inline = match &spec {
                            Some(s) if s.kind != ArgKind::Flag && !attached.is_empty() => {
                                Some(attached.to_string())
                            }
                            Some(_) if !attached.is_empty() => {
                                // clustered flags are not supported
                                rest.push(token.clone());
                                continue;
                            }
                            _ => None,
                        };
                        (spec, inline)
                    }
                    None => (None, None),
                }
            } else {
                (None, None)
            };

            let Some(spec) = spec else {
                if takes_prog && prog.is_none() && !token.starts_with('+') {
                    prog = Some(token.clone());
                } else {
                    rest.push(token.clone());
                }
                continue;
            };

            match spec.kind {
                ArgKind::Flag => {
                    if inline.is_some() {
                        return Err(ArgsError::UnexpectedValue(spec.name));
                    }
                    known.push(format!("--{}", spec.name));
                }
                ArgKind::Value | ArgKind::Multi => {
                    let value = match inline {
                        Some(value) => value,
                        None => tokens
                            .next()
                            .cloned()
                            .ok_or_else(|| ArgsError::MissingValue(format!("+{}", spec.name)))?,
                    };
                    known.push(format!("--{}={}", spec.name, value));
                }
            }
        }

        let matches = self.command().try_get_matches_from(known)?;
        let state = self.0.borrow();
        let mut values = state.defaults.clone();

        for option in &state.options {
            let key = option.key();
            let value = match option.kind {
                ArgKind::Flag => Some(Value::Bool(matches.get_flag(&key))),
                ArgKind::Value => matches.get_one::<String>(&key).map(|v| Value::from(v.as_str())),
                ArgKind::Multi => matches
                    .get_many::<String>(&key)
                    .map(|vs| Value::List(vs.map(|v| Value::from(v.as_str())).collect())),
            };
            match value {
                Some(value) => {
                    values.insert(key, value);
                }
                None => {
                    if let Some(default) = &option.default_value {
                        values.entry(key).or_insert_with(|| Value::from(default.as_str()));
                    }
                }
            }
        }
        if let Some(prog) = prog {
            values.insert(PROG_KEY.to_string(), Value::Str(prog));
        }

        Ok(ParsedArgs { values, rest })
    }

    /// Fail if the program positional is expected but was not given
    pub fn require_prog(&self, parsed: &ParsedArgs) -> Result<(), ArgsError> {
        if parsed.prog().is_none() {
            return Err(ArgsError::MissingPositional(PROG_KEY));
        }
        Ok(())
    }

    /// Usage text for `name`
    pub fn render_help(&self, name: &str) -> String {
        let state = self.0.borrow();
        let mut help = String::new();

        let positional = if state.prog_help.is_some() { " prog" } else { "" };
        let _ = writeln!(help, "usage: {} [++options]{} [args...]", name, positional);
        if !state.description.is_empty() {
            let _ = writeln!(help, "\n{}", state.description);
        }
        if let Some(prog_help) = &state.prog_help {
            let _ = writeln!(help, "\npositional arguments:\n  {:<24}{}", PROG_KEY, prog_help);
        }

        let _ = writeln!(help, "\noptions:");
        for option in &state.options {
            let mut usage = match option.short {
                Some(c) => format!("+{}, ++{}", c, option.name),
                None => format!("++{}", option.name),
            };
            if option.kind != ArgKind::Flag {
                let _ = write!(usage, " {}", option.key().to_uppercase());
            }
            if usage.len() >= 24 {
                let _ = writeln!(help, "  {}\n  {:<24}{}", usage, "", option.help);
            } else {
                let _ = writeln!(help, "  {:<24}{}", usage, option.help);
            }
        }
        help
    }
}

fn script_default(value: Dynamic) -> Result<Value, Box<EvalAltResult>> {
    let type_name = value.type_name();
    bridge::from_dynamic(&value)
        .ok_or_else(|| format!("unsupported default value of type {}", type_name).into())
}

/// Register `ParserSpec` on `engine` as the `parser` handed to argparse
/// builders
pub fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<ParserSpec>("ArgParser")
        .register_fn("add_flag", |p: &mut ParserSpec, name: &str, help: &str| {
            p.add(ArgSpec::new(name, ArgKind::Flag, help));
        })
        .register_fn("add_option", |p: &mut ParserSpec, name: &str, help: &str| {
            p.add(ArgSpec::new(name, ArgKind::Value, help));
        })
        .register_fn(
            "add_option",
            |p: &mut ParserSpec, name: &str, short: char, help: &str| {
                p.add(ArgSpec::new(name, ArgKind::Value, help).with_short(short));
            },
        )
        .register_fn("add_multi_option", |p: &mut ParserSpec, name: &str, help: &str| {
            p.add(ArgSpec::new(name, ArgKind::Multi, help));
        })
        .register_fn(
            "add_multi_option",
            |p: &mut ParserSpec, name: &str, short: char, help: &str| {
                p.add(ArgSpec::new(name, ArgKind::Multi, help).with_short(short));
            },
        )
        .register_fn(
            "set_default",
            |p: &mut ParserSpec, key: &str, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
                p.set_default(key, script_default(value)?);
                Ok(())
            },
        );
}
