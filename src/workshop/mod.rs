//! Workshop — the process-wide registry of preloaded library handles.
//!
//! Built exactly once at startup and shared read-only by every execution
//! namespace. The set is hardcoded: no request-time input can add, remove,
//! or swap a library, which keeps the "which capability do we trust"
//! decision out of the per-request trust boundary entirely.
//!
//! Builtin libraries (the safe analogues of the data-science stack the
//! upstream planner writes against):
//! - `stats` — aggregate statistics over column values
//! - `text`  — string cleanup, scalar or elementwise
//! - `num`   — numeric rounding/clamping, scalar or elementwise

mod num;
mod stats;
mod text;

use std::sync::OnceLock;

use crate::script::value::Value;
use crate::script::ScriptError;

pub use num::NumLibrary;
pub use stats::StatsLibrary;
pub use text::TextLibrary;

/// A preloaded, vetted library handle.
///
/// Libraries are pure compute over script values: no I/O, no process state,
/// no interior mutability. `call` is the only entry point the workbench
/// dispatches to.
pub trait Library: Send + Sync {
    /// Conventional name the script binds the library under (e.g. `stats`).
    fn name(&self) -> &'static str;

    /// One-line description, shown on the status surface.
    fn description(&self) -> &'static str;

    /// The closed set of callable functions.
    fn functions(&self) -> &'static [&'static str];

    /// Invokes `function` with evaluated arguments.
    fn call(&self, function: &str, args: &[Value]) -> Result<Value, ScriptError>;
}

/// The registry. Never mutated after [`Workshop::global`] initializes it.
pub struct Workshop {
    libraries: Vec<Box<dyn Library>>,
}

static WORKSHOP: OnceLock<Workshop> = OnceLock::new();

impl Workshop {
    /// Returns the process-wide registry, building it on first use.
    /// Idempotent: every caller sees the same instance.
    pub fn global() -> &'static Workshop {
        WORKSHOP.get_or_init(Workshop::build)
    }

    fn build() -> Workshop {
        Workshop {
            libraries: vec![
                Box::new(StatsLibrary),
                Box::new(TextLibrary),
                Box::new(NumLibrary),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Library> {
        self.libraries
            .iter()
            .find(|lib| lib.name() == name)
            .map(|lib| lib.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.libraries.iter().map(|lib| lib.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }
}

// ── Shared argument helpers for builtin libraries ────────

/// Checks an exact argument count.
fn expect_arity(
    library: &str,
    function: &str,
    args: &[Value],
    expected: usize,
) -> Result<(), ScriptError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ScriptError::Arity {
            function: format!("{library}.{function}"),
            expected: match expected {
                1 => "1",
                2 => "2",
                3 => "3",
                _ => "several",
            },
            found: args.len(),
        })
    }
}

/// Extracts the numeric values of a list argument, skipping nulls.
/// Non-numeric, non-null items are a type error (mirrors aggregate
/// semantics on a numeric column).
fn numeric_items(
    library: &str,
    function: &str,
    value: &Value,
) -> Result<Vec<f64>, ScriptError> {
    let items = match value {
        Value::List(items) => items,
        other => {
            return Err(ScriptError::TypeMismatch {
                context: format!("{library}.{function}"),
                expected: "a list of numbers",
                found: other.type_name().to_string(),
            })
        }
    };
    let mut numbers = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Null => continue,
            other => match other.as_f64() {
                Some(n) => numbers.push(n),
                None => {
                    return Err(ScriptError::TypeMismatch {
                        context: format!("{library}.{function}"),
                        expected: "a list of numbers",
                        found: format!("list containing {}", other.type_name()),
                    })
                }
            },
        }
    }
    Ok(numbers)
}

/// Extracts a required scalar number argument.
fn number_arg(library: &str, function: &str, value: &Value) -> Result<f64, ScriptError> {
    value.as_f64().ok_or_else(|| ScriptError::TypeMismatch {
        context: format!("{library}.{function}"),
        expected: "a number",
        found: value.type_name().to_string(),
    })
}

/// Extracts a required string argument.
fn string_arg<'a>(
    library: &str,
    function: &str,
    value: &'a Value,
) -> Result<&'a str, ScriptError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(ScriptError::TypeMismatch {
            context: format!("{library}.{function}"),
            expected: "a string",
            found: other.type_name().to_string(),
        }),
    }
}

fn unknown_function(library: &str, function: &str) -> ScriptError {
    ScriptError::UnknownFunction {
        library: library.to_string(),
        function: function.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_is_idempotent() {
        let a = Workshop::global() as *const Workshop;
        let b = Workshop::global() as *const Workshop;
        assert_eq!(a, b);
    }

    #[test]
    fn test_fixed_library_set() {
        let workshop = Workshop::global();
        assert_eq!(workshop.len(), 3);
        assert_eq!(workshop.names(), vec!["stats", "text", "num"]);
        assert!(workshop.contains("stats"));
        assert!(!workshop.contains("pandas"));
    }

    #[test]
    fn test_get_unknown_is_none() {
        assert!(Workshop::global().get("requests").is_none());
    }

    #[test]
    fn test_every_library_advertises_its_functions() {
        let workshop = Workshop::global();
        for name in workshop.names() {
            let lib = workshop.get(name).unwrap();
            assert!(!lib.functions().is_empty());
            assert!(!lib.description().is_empty());
        }
    }

    #[test]
    fn test_advertised_functions_are_callable() {
        // Calling an advertised function with garbage arity must fail with
        // Arity/TypeMismatch, never UnknownFunction.
        let workshop = Workshop::global();
        for name in workshop.names() {
            let lib = workshop.get(name).unwrap();
            for function in lib.functions() {
                let err = lib.call(function, &[]).unwrap_err();
                assert!(
                    !matches!(err, ScriptError::UnknownFunction { .. }),
                    "{name}.{function} not wired up"
                );
            }
        }
    }
}
