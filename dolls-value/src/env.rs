//! Variable scopes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Value;

struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<Env>,
}

/// A name-to-value scope chained to its enclosing scope.
/// Cloning an `Env` shares the scope.
#[derive(Clone)]
pub struct Env(Rc<RefCell<Scope>>);

impl Env {
    /// Creates a scope with no parent.
    pub fn global() -> Self {
        Self(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: None,
        })))
    }

    /// Creates a scope that falls back to `self` for lookups.
    pub fn child(&self) -> Self {
        Self(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// Looks `name` up through the scope chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let parent = {
                let scope = current.0.borrow();
                if let Some(value) = scope.vars.get(name) {
                    return Some(value.clone());
                }
                scope.parent.clone()
            };
            current = parent?;
        }
    }

    /// Like [`Env::get`], but an unbound name reads as `nil`.
    pub fn lookup(&self, name: &str) -> Value {
        self.get(name).unwrap_or(Value::Nil)
    }

    /// Binds `name` in this scope, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().vars.insert(name.into(), value);
    }

}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.0.borrow();
        let mut names: Vec<&String> = scope.vars.keys().collect();
        names.sort();
        f.debug_struct("Env")
            .field("names", &names)
            .field("nested", &scope.parent.is_some())
            .finish()
    }
}
