//! Builtin library: numeric rounding and clamping.
//!
//! Like [`text`](super::TextLibrary), every function accepts a scalar or a
//! list and maps elementwise with null passthrough. Integers stay integers
//! where the operation allows it.

use super::{expect_arity, number_arg, unknown_function, Library};
use crate::script::value::Value;
use crate::script::ScriptError;

pub struct NumLibrary;

const NAME: &str = "num";

const FUNCTIONS: &[&str] = &["round", "abs", "floor", "ceil", "clip"];

impl Library for NumLibrary {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "numeric rounding and clamping, scalar or elementwise"
    }

    fn functions(&self) -> &'static [&'static str] {
        FUNCTIONS
    }

    fn call(&self, function: &str, args: &[Value]) -> Result<Value, ScriptError> {
        match function {
            "round" => {
                if args.is_empty() || args.len() > 2 {
                    return Err(ScriptError::Arity {
                        function: "num.round".to_string(),
                        expected: "1 or 2",
                        found: args.len(),
                    });
                }
                let digits = match args.get(1) {
                    Some(v) => {
                        let d = number_arg(NAME, function, v)?;
                        if d < 0.0 || d.fract() != 0.0 || d > 12.0 {
                            return Err(ScriptError::InvalidArgument {
                                function: "num.round".to_string(),
                                message: format!("digits must be an integer in 0..=12, got {d}"),
                            });
                        }
                        d as i32
                    }
                    None => 0,
                };
                map_numbers(function, &args[0], &move |v| Ok(round_value(v, digits)))
            }
            "abs" => {
                expect_arity(NAME, function, args, 1)?;
                map_numbers(function, &args[0], &|v| match v {
                    Value::Int(i) => i
                        .checked_abs()
                        .map(Value::Int)
                        .ok_or(ScriptError::Overflow),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    _ => unreachable!("map_numbers filters"),
                })
            }
            "floor" => {
                expect_arity(NAME, function, args, 1)?;
                map_numbers(function, &args[0], &|v| match v {
                    Value::Int(i) => Ok(Value::Int(i)),
                    Value::Float(f) => Ok(Value::Float(f.floor())),
                    _ => unreachable!("map_numbers filters"),
                })
            }
            "ceil" => {
                expect_arity(NAME, function, args, 1)?;
                map_numbers(function, &args[0], &|v| match v {
                    Value::Int(i) => Ok(Value::Int(i)),
                    Value::Float(f) => Ok(Value::Float(f.ceil())),
                    _ => unreachable!("map_numbers filters"),
                })
            }
            "clip" => {
                expect_arity(NAME, function, args, 3)?;
                let lo = number_arg(NAME, function, &args[1])?;
                let hi = number_arg(NAME, function, &args[2])?;
                if lo > hi {
                    return Err(ScriptError::InvalidArgument {
                        function: "num.clip".to_string(),
                        message: format!("lower bound {lo} exceeds upper bound {hi}"),
                    });
                }
                map_numbers(function, &args[0], &move |v| {
                    let n = v.as_f64().expect("map_numbers filters");
                    Ok(Value::Float(n.clamp(lo, hi)))
                })
            }
            _ => Err(unknown_function(NAME, function)),
        }
    }
}

fn round_value(value: Value, digits: i32) -> Value {
    match value {
        Value::Int(i) => Value::Int(i),
        Value::Float(f) => {
            let factor = 10f64.powi(digits);
            Value::Float((f * factor).round() / factor)
        }
        _ => unreachable!("map_numbers filters"),
    }
}

/// Applies `f` to a numeric scalar, or elementwise over a list with nulls
/// passed through.
fn map_numbers(
    function: &str,
    value: &Value,
    f: &dyn Fn(Value) -> Result<Value, ScriptError>,
) -> Result<Value, ScriptError> {
    match value {
        Value::Int(_) | Value::Float(_) => f(value.clone()),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Null => out.push(Value::Null),
                    Value::Int(_) | Value::Float(_) => out.push(f(item.clone())?),
                    other => {
                        return Err(ScriptError::TypeMismatch {
                            context: format!("{NAME}.{function}"),
                            expected: "a number or a list of numbers",
                            found: format!("list containing {}", other.type_name()),
                        })
                    }
                }
            }
            Ok(Value::List(out))
        }
        other => Err(ScriptError::TypeMismatch {
            context: format!("{NAME}.{function}"),
            expected: "a number or a list of numbers",
            found: other.type_name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: &str, args: &[Value]) -> Result<Value, ScriptError> {
        NumLibrary.call(function, args)
    }

    #[test]
    fn test_round_default_and_digits() {
        assert!(matches!(
            call("round", &[Value::Float(2.4)]).unwrap(),
            Value::Float(f) if f == 2.0
        ));
        assert!(matches!(
            call("round", &[Value::Float(2.345), Value::Int(2)]).unwrap(),
            Value::Float(f) if (f - 2.35).abs() < 1e-9
        ));
        // Integers pass through regardless of digits
        assert!(matches!(
            call("round", &[Value::Int(7), Value::Int(2)]).unwrap(),
            Value::Int(7)
        ));
    }

    #[test]
    fn test_round_rejects_bad_digits() {
        assert!(matches!(
            call("round", &[Value::Float(1.0), Value::Float(1.5)]).unwrap_err(),
            ScriptError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn test_abs() {
        assert!(matches!(call("abs", &[Value::Int(-3)]).unwrap(), Value::Int(3)));
        assert!(matches!(
            call("abs", &[Value::Float(-1.5)]).unwrap(),
            Value::Float(f) if f == 1.5
        ));
    }

    #[test]
    fn test_abs_overflow() {
        assert!(matches!(
            call("abs", &[Value::Int(i64::MIN)]).unwrap_err(),
            ScriptError::Overflow
        ));
    }

    #[test]
    fn test_floor_ceil() {
        assert!(matches!(
            call("floor", &[Value::Float(1.9)]).unwrap(),
            Value::Float(f) if f == 1.0
        ));
        assert!(matches!(
            call("ceil", &[Value::Float(1.1)]).unwrap(),
            Value::Float(f) if f == 2.0
        ));
    }

    #[test]
    fn test_clip_elementwise() {
        let column = Value::List(vec![
            Value::Int(-5),
            Value::Null,
            Value::Int(3),
            Value::Int(99),
        ]);
        match call("clip", &[column, Value::Int(0), Value::Int(10)]).unwrap() {
            Value::List(items) => {
                assert!(matches!(items[0], Value::Float(f) if f == 0.0));
                assert!(matches!(items[1], Value::Null));
                assert!(matches!(items[2], Value::Float(f) if f == 3.0));
                assert!(matches!(items[3], Value::Float(f) if f == 10.0));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_clip_rejects_inverted_bounds() {
        assert!(matches!(
            call("clip", &[Value::Int(1), Value::Int(5), Value::Int(0)]).unwrap_err(),
            ScriptError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn test_string_input_is_type_error() {
        assert!(matches!(
            call("round", &[Value::Str("x".into())]).unwrap_err(),
            ScriptError::TypeMismatch { .. }
        ));
    }
}
