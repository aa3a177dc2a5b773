//! Integration tests for plugin loading
//!
//! Plugins are written into a temporary plugin root and loaded the way the
//! entrypoint and the runner load them.

use dockwrap::{Builders, DockerRunCommand, ReplacementContext, Replacer};
use dockwrap_plugin_host::rhai::Dynamic;
use dockwrap_plugin_host::{DockerRun, LoadError, Namespace, PluginLoader, StringList};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_plugin(root: &Path, category: &str, name: &str, source: &str) {
    let dir = dockwrap_plugin_api::plugin_dir(category, root);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{}.rhai", name)), source).unwrap();
}

#[test]
fn test_plugins_run_in_sorted_order() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "init", "b", "let B = A + 1; ORDER.push(\"b\");");
    write_plugin(root.path(), "init", "a", "let A = 1; ORDER.push(\"a\");");

    let loader = PluginLoader::new(root.path());
    let mut ns = Namespace::new();
    ns.set("ORDER", Dynamic::from(StringList::default()));

    let loaded = loader.load("init", &mut ns).unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(ns.get::<i64>("B"), Some(2));
    assert_eq!(ns.get::<StringList>("ORDER").unwrap().to_vec(), vec!["a", "b"]);
}

#[test]
fn test_plugin_mutates_host_bindings() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "init", "mutate", "let BAR = FOO;\nFOO = 2;\n");

    let loader = PluginLoader::new(root.path());
    let mut ns = Namespace::new();
    ns.set("FOO", 1_i64);
    loader.load("init", &mut ns).unwrap();

    assert_eq!(ns.get::<i64>("FOO"), Some(2));
    assert_eq!(ns.get::<i64>("BAR"), Some(1));
}

#[test]
fn test_failing_plugin_aborts_load() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "init", "a", "let A = true;");
    write_plugin(root.path(), "init", "b", "throw \"boom\";");
    write_plugin(root.path(), "init", "c", "let C = true;");

    let loader = PluginLoader::new(root.path());
    let mut ns = Namespace::new();
    let err = loader.load("init", &mut ns).unwrap_err();

    match err {
        LoadError::Execute { origin, message } => {
            assert!(origin.ends_with("b.rhai"));
            assert!(message.contains("boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(ns.contains("A"));
    assert!(!ns.contains("C"));
}

#[test]
fn test_categories_are_separate() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "init", "only_init", "let INIT = true;");
    write_plugin(root.path(), "runner", "only_runner", "let RUNNER = true;");

    let loader = PluginLoader::new(root.path());
    let mut ns = Namespace::new();
    loader.load("runner", &mut ns).unwrap();

    assert!(ns.contains("RUNNER"));
    assert!(!ns.contains("INIT"));
}

#[test]
fn test_hooks_feed_builders() {
    let root = TempDir::new().unwrap();
    write_plugin(
        root.path(),
        "init",
        "a_first",
        "initfunc(|prog, args| args.push(prog));",
    );
    write_plugin(
        root.path(),
        "init",
        "b_second",
        r#"
            fn add_flag(prog, args) { args.insert(0, "--flag"); }
            initfunc(Fn("add_flag"));
        "#,
    );

    let loader = PluginLoader::builder(root.path()).hook("initfunc").build();
    let mut ns = Namespace::new();
    loader.load("init", &mut ns).unwrap();
    assert_eq!(loader.hook_count("initfunc"), 2);

    let mut builders: Builders<(String, StringList)> = Builders::new();
    for callable in loader.take_hook("initfunc") {
        let name = format!("{}:{}", callable.origin(), callable.name());
        builders.add(name, move |(prog, args)| {
            callable.call((prog.clone(), args.clone()))?;
            Ok(())
        });
    }
    assert_eq!(loader.hook_count("initfunc"), 0);

    let args = StringList::new(["x"]);
    let mut bundle = ("ansible".to_string(), args.clone());
    builders.invoke(&mut bundle).unwrap();

    assert_eq!(args.to_vec(), vec!["--flag", "x", "ansible"]);
}

#[test]
fn test_callable_error_stops_builders() {
    let loader = PluginLoader::builder("/nonexistent").hook("docker_run").build();
    let mut ns = Namespace::new();
    loader
        .run_script(
            "inline",
            r#"
                docker_run(|args, run| { throw "no docker here"; });
                docker_run(|args, run| run.add_docker_arg("--never"));
            "#,
            &mut ns,
        )
        .unwrap();

    let run = DockerRun::new(DockerRunCommand::new("img", "fab", ["x"]));
    let mut builders: Builders<DockerRun> = Builders::new();
    for callable in loader.take_hook("docker_run") {
        let name = callable.name().to_string();
        builders.add(name, move |run| {
            callable.call((rhai_map(), run.clone()))?;
            Ok(())
        });
    }

    let mut target = run.clone();
    let err = builders.invoke(&mut target).unwrap_err();
    assert!(err.to_string().contains("no docker here"));
    assert!(run.snapshot().docker_args.is_empty());
}

#[test]
fn test_hook_outside_load_fails() {
    let loader = PluginLoader::builder("/nonexistent").hook("initfunc").build();
    let mut ns = Namespace::new();
    loader
        .run_script("inline", "initfunc(|| initfunc(|| 1));", &mut ns)
        .unwrap();

    let callables = loader.take_hook("initfunc");
    assert_eq!(callables.len(), 1);

    let err = callables[0].call(()).unwrap_err();
    assert_eq!(err.origin, "inline");
    assert!(err.message.contains("can only be called while plugins load"));
    assert_eq!(loader.hook_count("initfunc"), 0);
}

#[test]
fn test_rendered_template_runs_as_plugin() {
    let template = "\
let PROGS = [];  // ##INIT:VAR:PROGS##
let DOCKER_IMAGE = \"\";  // ##INIT:VAR:DOCKER_IMAGE##
let COUNT = PROGS.len();
";
    let context = ReplacementContext::new()
        .with("PROGS", vec!["ansible", "fab \"quoted\""])
        .with("DOCKER_IMAGE", "dockwrap/dockwrap");
    let mut script = Vec::new();
    Replacer::from_reader(template.as_bytes(), context.clone())
        .render_to(&mut script)
        .unwrap();

    let loader = PluginLoader::new("/nonexistent");
    let mut ns = Namespace::new();
    loader
        .run_script("runner", &String::from_utf8(script).unwrap(), &mut ns)
        .unwrap();

    assert_eq!(ns.get_value("PROGS").as_ref(), context.get("PROGS"));
    assert_eq!(ns.get::<String>("DOCKER_IMAGE"), Some("dockwrap/dockwrap".to_string()));
    assert_eq!(ns.get::<i64>("COUNT"), Some(2));
}

fn rhai_map() -> dockwrap_plugin_host::rhai::Map {
    dockwrap_plugin_host::rhai::Map::new()
}
