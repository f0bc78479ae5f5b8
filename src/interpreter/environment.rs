//! Execution environment for the Omnia interpreter.
//!
//! Scopes form a parent-linked chain of `Arc`s. Closures keep the scope they
//! were created in alive, and spawned threads share scopes with their parent,
//! so every scope guards its bindings with its own lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::RuntimeError;
use super::value::Value;

/// A named slot
#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

/// One lexical scope
#[derive(Debug, Default)]
pub struct Environment {
    bindings: RwLock<HashMap<String, Binding>>,
    parent: Option<Arc<Environment>>,
}

impl Environment {
    /// Create a root scope
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a scope nested in `parent`
    pub fn child(parent: &Arc<Environment>) -> Arc<Self> {
        Arc::new(Self {
            bindings: RwLock::new(HashMap::new()),
            parent: Some(Arc::clone(parent)),
        })
    }

    /// Define (or shadow) a name in this scope
    pub fn define(&self, name: impl Into<String>, value: Value, mutable: bool) {
        self.bindings
            .write()
            .insert(name.into(), Binding { value, mutable });
    }

    /// Look a name up, innermost scope first
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.bindings.read().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get(name))
    }

    /// Reassign an existing binding in the nearest scope that holds it
    pub fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        {
            let mut bindings = self.bindings.write();
            if let Some(binding) = bindings.get_mut(name) {
                if !binding.mutable {
                    return Err(RuntimeError::immutable_assign(name));
                }
                binding.value = value;
                return Ok(());
            }
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(RuntimeError::undefined_variable(name)),
        }
    }

    /// Snapshot of this scope's own bindings, sorted by name
    pub fn local_bindings(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<(String, Value)> = self
            .bindings
            .read()
            .iter()
            .map(|(name, binding)| (name.clone(), binding.value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::error::ErrorKind;

    #[test]
    fn test_lookup_walks_parents() {
        let root = Environment::new();
        root.define("x", Value::Int(1), false);
        let inner = Environment::child(&root);
        assert!(matches!(inner.get("x"), Some(Value::Int(1))));
        assert!(inner.get("y").is_none());
    }

    #[test]
    fn test_shadowing_does_not_touch_parent() {
        let root = Environment::new();
        root.define("x", Value::Int(1), false);
        let inner = Environment::child(&root);
        inner.define("x", Value::Int(2), false);
        assert!(matches!(inner.get("x"), Some(Value::Int(2))));
        assert!(matches!(root.get("x"), Some(Value::Int(1))));
    }

    #[test]
    fn test_assign_respects_mutability() {
        let root = Environment::new();
        root.define("fixed", Value::Int(1), false);
        root.define("counter", Value::Int(1), true);
        let inner = Environment::child(&root);

        inner.assign("counter", Value::Int(5)).unwrap();
        assert!(matches!(root.get("counter"), Some(Value::Int(5))));

        let err = inner.assign("fixed", Value::Int(2)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ImmutableAssignError);

        let err = inner.assign("missing", Value::Int(2)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameError);
    }

    #[test]
    fn test_local_bindings_are_sorted() {
        let env = Environment::new();
        env.define("b", Value::Int(2), false);
        env.define("a", Value::Int(1), true);
        let names: Vec<String> = env.local_bindings().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
