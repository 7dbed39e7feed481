use std::collections::HashMap;

use crate::value::Value;

/// A single scope level: the script scope at the bottom, plus one per
/// user-function call in flight.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: HashMap<String, Value>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }
}

/// The full environment is a stack of scopes. Reads search innermost to
/// outermost, so function bodies see script-level bindings; writes always
/// bind in the innermost scope.
///
/// Cloning the environment clones every binding, which is what selection
/// evaluation relies on to observe the script scope without mutating it.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Look up a variable, searching from innermost scope outward.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Bind a variable in the current (innermost) scope.
    pub fn set(&mut self, name: &str, value: Value) {
        self.scopes
            .last_mut()
            .expect("no scope on stack")
            .set(name, value);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_see_outer_bindings() {
        let mut env = Environment::new();
        env.set("x", Value::Number(1.0));
        env.push_scope();
        assert_eq!(env.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn inner_writes_do_not_escape_their_scope() {
        let mut env = Environment::new();
        env.set("x", Value::Number(1.0));
        env.push_scope();
        env.set("x", Value::Number(2.0));
        assert_eq!(env.get("x"), Some(&Value::Number(2.0)));
        env.pop_scope();
        assert_eq!(env.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn cloned_environments_are_independent() {
        let mut env = Environment::new();
        env.set("x", Value::Number(1.0));
        let mut copy = env.clone();
        copy.set("x", Value::Number(2.0));
        assert_eq!(env.get("x"), Some(&Value::Number(1.0)));
    }
}
