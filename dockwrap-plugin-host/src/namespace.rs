//! Shared namespace plugins run against.

use crate::bridge;
use dockwrap::Value;
use rhai::{Dynamic, Scope, AST};
use std::any::Any;

/// Mutable binding scope shared by the host and every plugin of a load pass.
///
/// Plugins execute with this scope as their top level: they see bindings
/// made by the host and by plugins loaded before them, and bindings they
/// create (`let NAME = ...`) or overwrite stay visible afterwards. Script
/// functions (`fn name() {...}`) defined by a plugin are kept as well and
/// can be called by plugins executed later.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    scope: Scope<'static>,
    functions: AST,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a native value, replacing an existing binding
    ///
    /// Custom types go through [`Dynamic::from`].
    pub fn set(&mut self, name: &str, value: impl Into<Dynamic>) -> &mut Self {
        self.scope.set_or_push(name, value.into());
        self
    }

    /// Bind `name` to a [`Value`]
    pub fn set_value(&mut self, name: &str, value: &Value) -> &mut Self {
        self.scope.set_or_push(name, bridge::to_dynamic(value));
        self
    }

    /// Read a binding as `T`; `None` if absent or of another type
    pub fn get<T: Any + Clone>(&self, name: &str) -> Option<T> {
        self.scope
            .get_value::<Dynamic>(name)
            .and_then(|value| value.flatten().try_cast::<T>())
    }

    /// Read a binding as a [`Value`]; `None` if absent or not representable
    pub fn get_value(&self, name: &str) -> Option<Value> {
        self.scope
            .get_value::<Dynamic>(name)
            .and_then(|value| bridge::from_dynamic(&value))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scope.contains(name)
    }

    /// Bound names, in order of first binding
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, _, _) in self.scope.iter() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.is_empty()
    }

    /// Script functions defined so far
    pub fn functions(&self) -> &AST {
        &self.functions
    }

    /// Prepend the accumulated functions to `ast`
    pub(crate) fn link(&self, ast: &AST) -> AST {
        self.functions.merge(ast)
    }

    /// Keep the functions of `ast` for later scripts
    pub(crate) fn absorb(&mut self, ast: &AST) {
        self.functions.combine(ast.clone_functions_only());
    }

    pub fn scope(&self) -> &Scope<'static> {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope<'static> {
        &mut self.scope
    }
}
