//! Registration hooks plugins use to hand callables to the host.
//!
//! A hook is a native function such as `initfunc(|prog, args| ...)`. Each
//! call records the function pointer together with the compiled plugin it
//! came from, so the host can invoke it after loading has finished.

use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, FuncArgs, AST};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Error raised by a plugin callable
///
/// Carries the rendered script error; Rhai errors are not `Send`.
#[derive(Debug, Error)]
#[error("{origin}: {function}: {message}")]
pub struct ScriptError {
    pub origin: String,
    pub function: String,
    pub message: String,
}

struct Unit {
    origin: String,
    ast: Rc<AST>,
}

struct Registration {
    func: FnPtr,
    unit: Rc<Unit>,
}

/// Hook registrations collected during loading
#[derive(Default)]
pub(crate) struct HookStore {
    current: RefCell<Option<Rc<Unit>>>,
    registered: RefCell<BTreeMap<String, Vec<Registration>>>,
}

/// Clears the current unit on drop
pub(crate) struct UnitGuard<'a>(&'a HookStore);

impl Drop for UnitGuard<'_> {
    fn drop(&mut self) {
        self.0.current.borrow_mut().take();
    }
}

impl HookStore {
    /// Mark `ast` as the script being executed until the guard drops
    pub(crate) fn enter(&self, origin: &str, ast: Rc<AST>) -> UnitGuard<'_> {
        *self.current.borrow_mut() = Some(Rc::new(Unit {
            origin: origin.to_string(),
            ast,
        }));
        UnitGuard(self)
    }

    fn register(&self, hook: &str, func: FnPtr) -> Result<(), Box<EvalAltResult>> {
        let unit = self
            .current
            .borrow()
            .clone()
            .ok_or_else(|| format!("{}() can only be called while plugins load", hook))?;
        tracing::debug!(hook, function = func.fn_name(), origin = %unit.origin, "Hook registered");
        self.registered
            .borrow_mut()
            .entry(hook.to_string())
            .or_default()
            .push(Registration { func, unit });
        Ok(())
    }

    /// Remove and return the registrations of `hook`, in call order
    pub(crate) fn take(&self, hook: &str, engine: &Rc<Engine>) -> Vec<ScriptCallable> {
        self.registered
            .borrow_mut()
            .remove(hook)
            .unwrap_or_default()
            .into_iter()
            .map(|r| ScriptCallable {
                engine: Rc::clone(engine),
                ast: Rc::clone(&r.unit.ast),
                origin: r.unit.origin.clone(),
                func: r.func,
            })
            .collect()
    }

    pub(crate) fn count(&self, hook: &str) -> usize {
        self.registered.borrow().get(hook).map_or(0, Vec::len)
    }
}

/// Register the native function `hook` recording callables into `store`
///
/// Accepts a function pointer (`Fn("name")` or a closure) or the name of a
/// script function.
pub(crate) fn register_hook(engine: &mut Engine, hook: &str, store: Rc<HookStore>) {
    let name = hook.to_string();
    let by_ptr = Rc::clone(&store);
    engine.register_fn(hook, move |func: FnPtr| by_ptr.register(&name, func));

    let name = hook.to_string();
    engine.register_fn(hook, move |func: &str| -> Result<(), Box<EvalAltResult>> {
        let func = FnPtr::new(func)?;
        store.register(&name, func)
    });
}

/// A plugin function bound to the script it was defined in
#[derive(Clone)]
pub struct ScriptCallable {
    engine: Rc<Engine>,
    ast: Rc<AST>,
    func: FnPtr,
    origin: String,
}

impl ScriptCallable {
    /// Path or label of the defining script
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Function name (closures have generated names)
    pub fn name(&self) -> &str {
        self.func.fn_name()
    }

    /// Call the function, returning its result
    pub fn call(&self, args: impl FuncArgs) -> Result<Dynamic, ScriptError> {
        self.func
            .call::<Dynamic>(&self.engine, &self.ast, args)
            .map_err(|e| ScriptError {
                origin: self.origin.clone(),
                function: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

impl fmt::Debug for ScriptCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCallable")
            .field("origin", &self.origin)
            .field("func", &self.func.fn_name())
            .finish()
    }
}
