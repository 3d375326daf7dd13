//! Builtin library: string cleanup.
//!
//! Every function accepts either a single string or a list (a column of
//! strings); list inputs are mapped elementwise with nulls passed through
//! untouched, which is what column-level cleanup wants.

use super::{expect_arity, string_arg, unknown_function, Library};
use crate::script::value::Value;
use crate::script::ScriptError;

pub struct TextLibrary;

const NAME: &str = "text";

const FUNCTIONS: &[&str] = &["upper", "lower", "trim", "replace", "contains"];

impl Library for TextLibrary {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "string cleanup, scalar or elementwise over a column"
    }

    fn functions(&self) -> &'static [&'static str] {
        FUNCTIONS
    }

    fn call(&self, function: &str, args: &[Value]) -> Result<Value, ScriptError> {
        match function {
            "upper" => {
                expect_arity(NAME, function, args, 1)?;
                map_strings(function, &args[0], &|s| Value::Str(s.to_uppercase()))
            }
            "lower" => {
                expect_arity(NAME, function, args, 1)?;
                map_strings(function, &args[0], &|s| Value::Str(s.to_lowercase()))
            }
            "trim" => {
                expect_arity(NAME, function, args, 1)?;
                map_strings(function, &args[0], &|s| Value::Str(s.trim().to_string()))
            }
            "replace" => {
                expect_arity(NAME, function, args, 3)?;
                let from = string_arg(NAME, function, &args[1])?.to_string();
                let to = string_arg(NAME, function, &args[2])?.to_string();
                map_strings(function, &args[0], &move |s| {
                    Value::Str(s.replace(&from, &to))
                })
            }
            "contains" => {
                expect_arity(NAME, function, args, 2)?;
                let needle = string_arg(NAME, function, &args[1])?.to_string();
                map_strings(function, &args[0], &move |s| {
                    Value::Bool(s.contains(&needle))
                })
            }
            _ => Err(unknown_function(NAME, function)),
        }
    }
}

/// Applies `f` to a string scalar, or elementwise over a list with nulls
/// passed through.
fn map_strings(
    function: &str,
    value: &Value,
    f: &dyn Fn(&str) -> Value,
) -> Result<Value, ScriptError> {
    match value {
        Value::Str(s) => Ok(f(s)),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Null => out.push(Value::Null),
                    Value::Str(s) => out.push(f(s)),
                    other => {
                        return Err(ScriptError::TypeMismatch {
                            context: format!("{NAME}.{function}"),
                            expected: "a string or a list of strings",
                            found: format!("list containing {}", other.type_name()),
                        })
                    }
                }
            }
            Ok(Value::List(out))
        }
        other => Err(ScriptError::TypeMismatch {
            context: format!("{NAME}.{function}"),
            expected: "a string or a list of strings",
            found: other.type_name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: &str, args: &[Value]) -> Result<Value, ScriptError> {
        TextLibrary.call(function, args)
    }

    #[test]
    fn test_scalar_upper_lower_trim() {
        assert!(matches!(
            call("upper", &[Value::Str("ada".into())]).unwrap(),
            Value::Str(s) if s == "ADA"
        ));
        assert!(matches!(
            call("lower", &[Value::Str("ADA".into())]).unwrap(),
            Value::Str(s) if s == "ada"
        ));
        assert!(matches!(
            call("trim", &[Value::Str("  x \t".into())]).unwrap(),
            Value::Str(s) if s == "x"
        ));
    }

    #[test]
    fn test_elementwise_with_null_passthrough() {
        let column = Value::List(vec![
            Value::Str("a".into()),
            Value::Null,
            Value::Str("b".into()),
        ]);
        match call("upper", &[column]).unwrap() {
            Value::List(items) => {
                assert!(matches!(&items[0], Value::Str(s) if s == "A"));
                assert!(matches!(items[1], Value::Null));
                assert!(matches!(&items[2], Value::Str(s) if s == "B"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_replace() {
        let result = call(
            "replace",
            &[
                Value::Str("n/a".into()),
                Value::Str("n/a".into()),
                Value::Str("".into()),
            ],
        )
        .unwrap();
        assert!(matches!(result, Value::Str(s) if s.is_empty()));
    }

    #[test]
    fn test_contains() {
        assert!(matches!(
            call(
                "contains",
                &[Value::Str("warehouse".into()), Value::Str("house".into())]
            )
            .unwrap(),
            Value::Bool(true)
        ));
    }

    #[test]
    fn test_numeric_input_is_type_error() {
        assert!(matches!(
            call("upper", &[Value::Int(3)]).unwrap_err(),
            ScriptError::TypeMismatch { .. }
        ));
        let column = Value::List(vec![Value::Int(3)]);
        assert!(matches!(
            call("trim", &[column]).unwrap_err(),
            ScriptError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_unknown_function() {
        assert!(matches!(
            call("capitalize", &[Value::Str("x".into())]).unwrap_err(),
            ScriptError::UnknownFunction { .. }
        ));
    }
}
