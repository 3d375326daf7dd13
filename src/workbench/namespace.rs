//! Per-execution binding environment.
//!
//! The namespace is built additively: it holds the injected dataset, the
//! request parameters, and nothing else. Workshop libraries are resolved
//! through the shared registry on lookup — they are visible, but they are
//! not *in* the map, so no script operation can replace one. There is no
//! parent scope and no dynamic lookup escape hatch: a name either resolves
//! here or the script fails.

use std::collections::HashMap;

use crate::script::value::Value;
use crate::script::ScriptError;
use crate::workshop::Workshop;

pub struct ExecutionNamespace<'a> {
    bindings: HashMap<String, Value>,
    workshop: &'a Workshop,
}

impl<'a> ExecutionNamespace<'a> {
    pub fn new(workshop: &'a Workshop) -> Self {
        Self {
            bindings: HashMap::new(),
            workshop,
        }
    }

    /// Installs an initial binding (dataset, params). Panics if the name
    /// would shadow a workshop library; initial bindings are chosen by the
    /// workbench, not by the script, so this is a programming error.
    pub fn install(&mut self, name: &str, value: Value) {
        assert!(
            !self.workshop.contains(name),
            "initial binding '{name}' collides with a workshop library"
        );
        self.bindings.insert(name.to_string(), value);
    }

    /// Resolves a name: script bindings first, then workshop libraries.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.get(name) {
            return Some(value.clone());
        }
        if self.workshop.contains(name) {
            return Some(Value::Library(name.to_string()));
        }
        None
    }

    /// Script-level assignment. Library names cannot be rebound — the
    /// registry stays the only resolver for them.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        if self.workshop.contains(name) {
            return Err(ScriptError::LibraryRebind {
                name: name.to_string(),
            });
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    pub fn workshop(&self) -> &'a Workshop {
        self.workshop
    }

    /// Consumes the namespace and extracts one binding; everything else is
    /// dropped here, ending the namespace's lifetime.
    pub fn into_binding(mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order_bindings_then_workshop() {
        let mut ns = ExecutionNamespace::new(Workshop::global());
        assert!(ns.get("x").is_none());

        ns.install("x", Value::Int(1));
        assert!(matches!(ns.get("x"), Some(Value::Int(1))));

        // Libraries resolve without being in the bindings map
        assert!(matches!(ns.get("stats"), Some(Value::Library(name)) if name == "stats"));
    }

    #[test]
    fn test_library_rebind_rejected() {
        let mut ns = ExecutionNamespace::new(Workshop::global());
        let err = ns.assign("stats", Value::Int(1)).unwrap_err();
        assert!(matches!(err, ScriptError::LibraryRebind { name } if name == "stats"));
        // Still resolves to the library
        assert!(matches!(ns.get("stats"), Some(Value::Library(_))));
    }

    #[test]
    fn test_assign_and_reassign_plain_names() {
        let mut ns = ExecutionNamespace::new(Workshop::global());
        ns.assign("x", Value::Int(1)).unwrap();
        ns.assign("x", Value::Str("y".into())).unwrap();
        assert!(matches!(ns.get("x"), Some(Value::Str(_))));
    }

    #[test]
    fn test_into_binding_extracts_and_drops_rest() {
        let mut ns = ExecutionNamespace::new(Workshop::global());
        ns.install("keep", Value::Int(1));
        ns.install("other", Value::Int(2));
        assert!(matches!(ns.into_binding("keep"), Some(Value::Int(1))));
    }

    #[test]
    fn test_ambient_names_do_not_resolve() {
        // Names that exist in the host process are invisible by construction
        let ns = ExecutionNamespace::new(Workshop::global());
        for name in ["std", "tokio", "fs", "env", "process"] {
            assert!(ns.get(name).is_none(), "'{name}' should not resolve");
        }
    }
}
