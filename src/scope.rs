use std::sync::Arc;

use crate::value::{Map, Value};

/// A layered set of variable bindings.
///
/// Each layer is an ordered map with an optional parent. Lookup checks the
/// innermost layer first and walks outward, so inner bindings shadow outer
/// ones without modifying them. Layers are shared through [`Arc`], which lets
/// lambdas keep the scope they were created in alive after evaluation moves on.
///
/// ```
/// use std::sync::Arc;
/// use jsonte::{Scope, Value};
///
/// let mut global = Scope::new();
/// global.insert("name", Value::String("outer".into()));
/// let global = Arc::new(global);
///
/// let mut inner = Scope::child(&global);
/// inner.insert("name", Value::String("inner".into()));
///
/// assert_eq!(inner.get("name"), Some(&Value::String("inner".into())));
/// assert_eq!(global.get("name"), Some(&Value::String("outer".into())));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: Map,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    /// A root layer holding the given bindings.
    pub fn from_map(bindings: Map) -> Self {
        Scope {
            bindings,
            parent: None,
        }
    }

    /// An empty layer on top of `parent`.
    pub fn child(parent: &Arc<Scope>) -> Self {
        Scope {
            bindings: Map::new(),
            parent: Some(Arc::clone(parent)),
        }
    }

    /// A layer holding `bindings` on top of `parent`.
    pub fn with_bindings(parent: &Arc<Scope>, bindings: Map) -> Self {
        Scope {
            bindings,
            parent: Some(Arc::clone(parent)),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Innermost binding for `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.bindings.get(name) {
                return Some(value);
            }
            scope = scope.parent.as_deref()?;
        }
    }
}
