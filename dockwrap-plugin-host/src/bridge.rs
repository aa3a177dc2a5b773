//! Bridge between Rhai plugins and host types
//!
//! Host data handed to plugins is wrapped in shared handles so that changes
//! a plugin makes through a handle are seen by the host afterwards.

use dockwrap::{DockerRunCommand, Value};
use rhai::{Array, Dynamic, Engine, EvalAltResult, INT};
use std::cell::RefCell;
use std::rc::Rc;

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Convert a [`Value`] into a script value
pub fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Bool(b) => Dynamic::from(*b),
        Value::Int(i) => Dynamic::from(*i),
        Value::Str(s) => Dynamic::from(s.clone()),
        Value::List(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
    }
}

/// Convert a script value back into a [`Value`]
///
/// Returns `None` for values with no [`Value`] counterpart (maps, floats,
/// custom types, unit).
pub fn from_dynamic(value: &Dynamic) -> Option<Value> {
    let value = value.flatten_clone();
    if let Ok(b) = value.as_bool() {
        return Some(Value::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Some(Value::Int(i));
    }
    if value.is_string() {
        return value.into_string().ok().map(Value::Str);
    }
    value
        .try_cast::<Array>()
        .and_then(|items| items.iter().map(from_dynamic).collect::<Option<Vec<_>>>())
        .map(Value::List)
}

/// Convert a script array of strings into owned strings
///
/// Integers and booleans are accepted and stringified.
pub fn strings(items: Array) -> ScriptResult<Vec<String>> {
    items
        .into_iter()
        .map(|item| {
            if item.is_string() {
                item.into_string().map_err(|e| e.into())
            } else if item.is_int() || item.is_bool() {
                Ok(item.to_string())
            } else {
                Err(format!("expected string, got {}", item.type_name()).into())
            }
        })
        .collect()
}

fn to_array(items: &[String]) -> Array {
    items.iter().cloned().map(Dynamic::from).collect()
}

fn index(len: usize, i: INT) -> ScriptResult<usize> {
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| format!("index {} out of range for list of length {}", i, len).into())
}

/// Shared, mutable list of strings
///
/// Handed to init builders as the program arguments.
#[derive(Debug, Clone, Default)]
pub struct StringList(Rc<RefCell<Vec<String>>>);

impl StringList {
    pub fn new<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        Self(Rc::new(RefCell::new(items.into_iter().map(Into::into).collect())))
    }

    /// Current contents
    pub fn to_vec(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Shared handle on a [`DockerRunCommand`]
#[derive(Debug, Clone)]
pub struct DockerRun(Rc<RefCell<DockerRunCommand>>);

impl DockerRun {
    pub fn new(cmd: DockerRunCommand) -> Self {
        Self(Rc::new(RefCell::new(cmd)))
    }

    /// Copy of the command in its current state
    pub fn snapshot(&self) -> DockerRunCommand {
        self.0.borrow().clone()
    }

    /// Apply `f` to the underlying command
    pub fn update<R>(&self, f: impl FnOnce(&mut DockerRunCommand) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

/// Register bridge types on `engine`
pub fn register(engine: &mut Engine) {
    register_string_list(engine);
    register_docker_run(engine);
}

fn register_string_list(engine: &mut Engine) {
    engine
        .register_type_with_name::<StringList>("StringList")
        .register_fn("push", |list: &mut StringList, item: &str| {
            list.0.borrow_mut().push(item.to_string());
        })
        .register_fn(
            "insert",
            |list: &mut StringList, i: INT, item: &str| -> ScriptResult<()> {
                let len = list.len();
                let at = usize::try_from(i)
                    .ok()
                    .filter(|&at| at <= len)
                    .ok_or_else(|| format!("index {} out of range for insert", i))?;
                list.0.borrow_mut().insert(at, item.to_string());
                Ok(())
            },
        )
        .register_fn(
            "extend",
            |list: &mut StringList, items: Array| -> ScriptResult<()> {
                let items = strings(items)?;
                list.0.borrow_mut().extend(items);
                Ok(())
            },
        )
        .register_fn(
            "remove",
            |list: &mut StringList, i: INT| -> ScriptResult<String> {
                let at = index(list.len(), i)?;
                Ok(list.0.borrow_mut().remove(at))
            },
        )
        .register_fn("clear", |list: &mut StringList| list.0.borrow_mut().clear())
        .register_fn("len", |list: &mut StringList| list.len() as INT)
        .register_fn("is_empty", |list: &mut StringList| list.is_empty())
        .register_fn("contains", |list: &mut StringList, item: &str| {
            list.0.borrow().iter().any(|s| s == item)
        })
        .register_fn("to_array", |list: &mut StringList| to_array(&list.0.borrow()))
        .register_fn("to_string", |list: &mut StringList| {
            format!("{:?}", list.0.borrow())
        })
        .register_indexer_get(|list: &mut StringList, i: INT| -> ScriptResult<String> {
            let at = index(list.len(), i)?;
            Ok(list.0.borrow()[at].clone())
        })
        .register_indexer_set(
            |list: &mut StringList, i: INT, item: String| -> ScriptResult<()> {
                let at = index(list.len(), i)?;
                list.0.borrow_mut()[at] = item;
                Ok(())
            },
        );
}

fn register_docker_run(engine: &mut Engine) {
    engine
        .register_type_with_name::<DockerRun>("DockerRun")
        .register_get_set(
            "prog",
            |run: &mut DockerRun| run.0.borrow().prog.clone(),
            |run: &mut DockerRun, prog: String| run.0.borrow_mut().prog = prog,
        )
        .register_get_set(
            "image",
            |run: &mut DockerRun| run.0.borrow().image.clone(),
            |run: &mut DockerRun, image: String| run.0.borrow_mut().image = image,
        )
        .register_get_set(
            "docker_args",
            |run: &mut DockerRun| to_array(&run.0.borrow().docker_args),
            |run: &mut DockerRun, args: Array| -> ScriptResult<()> {
                run.0.borrow_mut().docker_args = strings(args)?;
                Ok(())
            },
        )
        .register_get_set(
            "prog_args",
            |run: &mut DockerRun| to_array(&run.0.borrow().prog_args),
            |run: &mut DockerRun, args: Array| -> ScriptResult<()> {
                run.0.borrow_mut().prog_args = strings(args)?;
                Ok(())
            },
        )
        .register_get("cmd", |run: &mut DockerRun| to_array(&run.0.borrow().cmd()))
        .register_fn(
            "add_docker_args",
            |run: &mut DockerRun, args: Array| -> ScriptResult<()> {
                let args = strings(args)?;
                run.0.borrow_mut().docker_args.extend(args);
                Ok(())
            },
        )
        .register_fn("add_docker_arg", |run: &mut DockerRun, arg: &str| {
            run.0.borrow_mut().docker_args.push(arg.to_string());
        })
        .register_fn(
            "add_prog_args",
            |run: &mut DockerRun, args: Array| -> ScriptResult<()> {
                let args = strings(args)?;
                run.0.borrow_mut().prog_args.extend(args);
                Ok(())
            },
        )
        .register_fn("to_string", |run: &mut DockerRun| run.0.borrow().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::Scope;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        register(&mut engine);
        engine
    }

    #[test]
    fn test_value_roundtrip() {
        let value = Value::List(vec![
            Value::from("a\"b"),
            Value::from(3_i64),
            Value::from(false),
        ]);
        assert_eq!(from_dynamic(&to_dynamic(&value)), Some(value));
    }

    #[test]
    fn test_literal_evaluates_to_value() {
        let value = Value::from(vec!["ansible", "it's \"quoted\"\n"]);
        let engine = Engine::new();
        let result: Dynamic = engine.eval(&value.to_literal()).unwrap();
        assert_eq!(from_dynamic(&result), Some(value));
    }

    #[test]
    fn test_unrepresentable() {
        assert_eq!(from_dynamic(&Dynamic::UNIT), None);
        assert_eq!(from_dynamic(&Dynamic::from(rhai::Map::new())), None);
    }

    #[test]
    fn test_string_list_mutation() {
        let engine = engine();
        let list = StringList::new(["-v"]);
        let mut scope = Scope::new();
        scope.push("args", list.clone());

        engine
            .run_with_scope(
                &mut scope,
                r#"
                    args.insert(0, "--first");
                    args.push("last");
                    args.extend(["x", 1]);
                    args[1] = "-vv";
                "#,
            )
            .unwrap();

        assert_eq!(list.to_vec(), vec!["--first", "-vv", "last", "x", "1"]);
    }

    #[test]
    fn test_string_list_queries() {
        let engine = engine();
        let mut scope = Scope::new();
        scope.push("args", StringList::new(["a", "b"]));

        let len: INT = engine.eval_with_scope(&mut scope, "args.len()").unwrap();
        let has: bool = engine.eval_with_scope(&mut scope, r#"args.contains("b")"#).unwrap();
        let first: String = engine.eval_with_scope(&mut scope, "args[0]").unwrap();

        assert_eq!(len, 2);
        assert!(has);
        assert_eq!(first, "a");
        assert!(engine.eval_with_scope::<String>(&mut scope, "args[5]").is_err());
    }

    #[test]
    fn test_docker_run_handle() {
        let engine = engine();
        let run = DockerRun::new(DockerRunCommand::new("img", "fab", ["deploy"]));
        let mut scope = Scope::new();
        scope.push("run", run.clone());

        engine
            .run_with_scope(
                &mut scope,
                r#"
                    run.add_docker_args(["-v", "/src:/src"]);
                    run.prog = "ansible";
                    run.prog_args = ["--version"];
                "#,
            )
            .unwrap();

        assert_eq!(
            run.snapshot().cmd(),
            vec!["docker", "run", "-v", "/src:/src", "img", "ansible", "--version"]
        );
    }

    #[test]
    fn test_docker_run_rejects_non_strings() {
        let engine = engine();
        let mut scope = Scope::new();
        scope.push("run", DockerRun::new(DockerRunCommand::new("img", "fab", ["x"])));

        let err = engine
            .run_with_scope(&mut scope, "run.add_docker_args([#{}]);")
            .unwrap_err();
        assert!(err.to_string().contains("expected string"));
    }
}
