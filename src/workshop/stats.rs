//! Builtin library: aggregate statistics over column values.
//!
//! Inputs are lists (typically a column pulled out of the dataset with
//! `dataframe["col"]`). Nulls are skipped, matching how the profiler treats
//! missing values; an aggregate over no numeric values is `null`.

use super::{expect_arity, number_arg, numeric_items, unknown_function, Library};
use crate::script::value::Value;
use crate::script::ScriptError;

pub struct StatsLibrary;

const NAME: &str = "stats";

const FUNCTIONS: &[&str] = &[
    "mean", "median", "stdev", "quantile", "min", "max", "sum", "count",
];

impl Library for StatsLibrary {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "aggregate statistics over column values (nulls skipped)"
    }

    fn functions(&self) -> &'static [&'static str] {
        FUNCTIONS
    }

    fn call(&self, function: &str, args: &[Value]) -> Result<Value, ScriptError> {
        match function {
            "mean" => {
                expect_arity(NAME, function, args, 1)?;
                let numbers = numeric_items(NAME, function, &args[0])?;
                Ok(mean(&numbers).map_or(Value::Null, Value::Float))
            }
            "median" => {
                expect_arity(NAME, function, args, 1)?;
                let numbers = numeric_items(NAME, function, &args[0])?;
                Ok(median(numbers).map_or(Value::Null, Value::Float))
            }
            "stdev" => {
                expect_arity(NAME, function, args, 1)?;
                let numbers = numeric_items(NAME, function, &args[0])?;
                Ok(stdev(&numbers).map_or(Value::Null, Value::Float))
            }
            "quantile" => {
                expect_arity(NAME, function, args, 2)?;
                let numbers = numeric_items(NAME, function, &args[0])?;
                let q = number_arg(NAME, function, &args[1])?;
                if !(0.0..=1.0).contains(&q) {
                    return Err(ScriptError::InvalidArgument {
                        function: "stats.quantile".to_string(),
                        message: format!("quantile {q} is outside [0, 1]"),
                    });
                }
                Ok(quantile(numbers, q).map_or(Value::Null, Value::Float))
            }
            "min" => {
                expect_arity(NAME, function, args, 1)?;
                let numbers = numeric_items(NAME, function, &args[0])?;
                Ok(numbers
                    .iter()
                    .copied()
                    .fold(None, |acc: Option<f64>, n| {
                        Some(acc.map_or(n, |a| a.min(n)))
                    })
                    .map_or(Value::Null, Value::Float))
            }
            "max" => {
                expect_arity(NAME, function, args, 1)?;
                let numbers = numeric_items(NAME, function, &args[0])?;
                Ok(numbers
                    .iter()
                    .copied()
                    .fold(None, |acc: Option<f64>, n| {
                        Some(acc.map_or(n, |a| a.max(n)))
                    })
                    .map_or(Value::Null, Value::Float))
            }
            "sum" => {
                expect_arity(NAME, function, args, 1)?;
                let numbers = numeric_items(NAME, function, &args[0])?;
                Ok(Value::Float(numbers.iter().sum()))
            }
            "count" => {
                expect_arity(NAME, function, args, 1)?;
                match &args[0] {
                    Value::List(items) => Ok(Value::Int(
                        items.iter().filter(|v| !matches!(v, Value::Null)).count() as i64,
                    )),
                    other => Err(ScriptError::TypeMismatch {
                        context: "stats.count".to_string(),
                        expected: "a list",
                        found: other.type_name().to_string(),
                    }),
                }
            }
            _ => Err(unknown_function(NAME, function)),
        }
    }
}

fn mean(numbers: &[f64]) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

fn median(mut numbers: Vec<f64>) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    numbers.sort_by(|a, b| a.partial_cmp(b).expect("no NaN in cell data"));
    let mid = numbers.len() / 2;
    if numbers.len() % 2 == 1 {
        Some(numbers[mid])
    } else {
        Some((numbers[mid - 1] + numbers[mid]) / 2.0)
    }
}

/// Sample standard deviation (n − 1 denominator); needs at least two values.
fn stdev(numbers: &[f64]) -> Option<f64> {
    if numbers.len() < 2 {
        return None;
    }
    let m = mean(numbers)?;
    let variance =
        numbers.iter().map(|n| (n - m).powi(2)).sum::<f64>() / (numbers.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Linear-interpolation quantile over the sorted values.
fn quantile(mut numbers: Vec<f64>, q: f64) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    numbers.sort_by(|a, b| a.partial_cmp(b).expect("no NaN in cell data"));
    let position = q * (numbers.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        Some(numbers[lower])
    } else {
        let weight = position - lower as f64;
        Some(numbers[lower] * (1.0 - weight) + numbers[upper] * weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(numbers: &[i64]) -> Value {
        Value::List(numbers.iter().map(|&n| Value::Int(n)).collect())
    }

    fn call(function: &str, args: &[Value]) -> Result<Value, ScriptError> {
        StatsLibrary.call(function, args)
    }

    #[test]
    fn test_mean_skips_nulls() {
        let column = Value::List(vec![Value::Int(1), Value::Null, Value::Int(3)]);
        match call("mean", &[column]).unwrap() {
            Value::Float(f) => assert_eq!(f, 2.0),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_mean_of_all_nulls_is_null() {
        let column = Value::List(vec![Value::Null, Value::Null]);
        assert!(matches!(call("mean", &[column]).unwrap(), Value::Null));
    }

    #[test]
    fn test_median_even_and_odd() {
        match call("median", &[list(&[3, 1, 2])]).unwrap() {
            Value::Float(f) => assert_eq!(f, 2.0),
            other => panic!("unexpected: {other:?}"),
        }
        match call("median", &[list(&[4, 1, 2, 3])]).unwrap() {
            Value::Float(f) => assert_eq!(f, 2.5),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_stdev_needs_two_values() {
        assert!(matches!(call("stdev", &[list(&[5])]).unwrap(), Value::Null));
        match call("stdev", &[list(&[2, 4, 4, 4, 5, 5, 7, 9])]).unwrap() {
            Value::Float(f) => assert!((f - 2.138089935).abs() < 1e-6),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_quantile_interpolates() {
        match call("quantile", &[list(&[1, 2, 3, 4]), Value::Float(0.25)]).unwrap() {
            Value::Float(f) => assert_eq!(f, 1.75),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_quantile_out_of_range() {
        let err = call("quantile", &[list(&[1]), Value::Float(1.5)]).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidArgument { .. }));
    }

    #[test]
    fn test_min_max_sum_count() {
        let column = Value::List(vec![
            Value::Int(4),
            Value::Null,
            Value::Float(1.5),
            Value::Int(2),
        ]);
        assert!(matches!(call("min", &[column.clone()]).unwrap(), Value::Float(f) if f == 1.5));
        assert!(matches!(call("max", &[column.clone()]).unwrap(), Value::Float(f) if f == 4.0));
        assert!(matches!(call("sum", &[column.clone()]).unwrap(), Value::Float(f) if f == 7.5));
        assert!(matches!(call("count", &[column]).unwrap(), Value::Int(3)));
    }

    #[test]
    fn test_non_numeric_column_is_type_error() {
        let column = Value::List(vec![Value::Str("a".into())]);
        assert!(matches!(
            call("mean", &[column]).unwrap_err(),
            ScriptError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_unknown_function() {
        assert!(matches!(
            call("variance", &[list(&[1])]).unwrap_err(),
            ScriptError::UnknownFunction { .. }
        ));
    }

    #[test]
    fn test_wrong_arity() {
        assert!(matches!(
            call("mean", &[]).unwrap_err(),
            ScriptError::Arity { .. }
        ));
    }
}
