//! Dataset methods exposed to scripts.
//!
//! This is the transformation vocabulary the upstream planner writes
//! against: mutating cleanup steps (`fillna`, `dropna`, `rename`, `drop`,
//! `select`, `filter`, `dedupe`, `cast`, `set`, `sort_by`, `head`),
//! aggregate summaries (`mean`, `median`, `min`, `max`, `sum`) and the
//! read-only accessors (`columns`, `len`). Mutators operate on the shared
//! frame handle in place and return it, so both chained calls and bare
//! statement calls update the dataset binding.

use std::collections::HashSet;
use std::rc::Rc;

use crate::script::value::{cell_compare, cell_eq, FrameRef, Value};
use crate::script::ScriptError;
use crate::table::Cell;
use crate::workshop::{Library, StatsLibrary};

use super::budget::Budget;

pub(super) fn call(
    frame: &FrameRef,
    method: &str,
    args: &[Value],
    budget: &mut Budget,
    line: u32,
) -> Result<Value, ScriptError> {
    match method {
        "fillna" => {
            expect_args(method, args, 1)?;
            fillna(frame, &args[0], budget)?;
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "dropna" => {
            expect_args(method, args, 0)?;
            let mut table = frame.borrow_mut();
            budget.charge_fuel(table.n_rows() as u64)?;
            table.rows_mut().retain(|row| !row.iter().any(Cell::is_null));
            drop(table);
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "rename" => {
            expect_args(method, args, 2)?;
            let old = str_arg(method, &args[0])?;
            let new = str_arg(method, &args[1])?;
            let mut table = frame.borrow_mut();
            let index = column_index(&table, old)?;
            if table.column_index(new).is_some() {
                return Err(ScriptError::InvalidArgument {
                    function: "dataframe.rename".to_string(),
                    message: format!("column '{new}' already exists"),
                });
            }
            table.set_column_name(index, new.to_string());
            drop(table);
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "drop" => {
            if args.is_empty() {
                return Err(arity(method, "at least 1", args.len()));
            }
            let mut table = frame.borrow_mut();
            for arg in args {
                let name = str_arg(method, arg)?;
                let index = column_index(&table, name)?;
                budget.charge_fuel(table.n_rows() as u64)?;
                table.remove_column(index);
            }
            drop(table);
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "select" => {
            expect_args(method, args, 1)?;
            let names = match &args[0] {
                Value::List(items) => items,
                other => return Err(type_err(method, "a list of column names", other)),
            };
            let mut table = frame.borrow_mut();
            let mut indices = Vec::with_capacity(names.len());
            for name in names {
                let name = str_arg(method, name)?;
                indices.push(column_index(&table, name)?);
            }
            budget.charge_cells((table.n_rows() * indices.len()) as u64)?;
            budget.charge_fuel(table.n_rows() as u64)?;
            table.project(&indices);
            drop(table);
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "filter" => {
            filter(frame, args, budget)?;
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "dedupe" => {
            expect_args(method, args, 0)?;
            let mut table = frame.borrow_mut();
            budget.charge_fuel(table.n_rows() as u64)?;
            let mut seen: HashSet<String> = HashSet::with_capacity(table.n_rows());
            table.rows_mut().retain(|row| seen.insert(format!("{row:?}")));
            drop(table);
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "cast" => {
            expect_args(method, args, 2)?;
            let column = str_arg(method, &args[0])?;
            let target = str_arg(method, &args[1])?;
            cast(frame, column, target, budget)?;
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "set" => {
            expect_args(method, args, 2)?;
            let column = str_arg(method, &args[0])?;
            let values = match &args[1] {
                Value::List(items) => items,
                other => return Err(type_err(method, "a list of values", other)),
            };
            set_column(frame, column, values, budget)?;
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "sort_by" => {
            sort_by(frame, args, budget)?;
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "head" => {
            expect_args(method, args, 1)?;
            let n = match &args[0] {
                Value::Int(n) if *n >= 0 => *n as usize,
                other => return Err(type_err(method, "a non-negative integer", other)),
            };
            let mut table = frame.borrow_mut();
            table.rows_mut().truncate(n);
            drop(table);
            Ok(Value::Frame(Rc::clone(frame)))
        }
        "mean" | "median" | "min" | "max" | "sum" => {
            expect_args(method, args, 0)?;
            aggregate(frame, method, budget)
        }
        "columns" => {
            expect_args(method, args, 0)?;
            let table = frame.borrow();
            budget.charge_cells(table.n_cols() as u64)?;
            Ok(Value::List(
                table
                    .columns()
                    .iter()
                    .map(|c| Value::Str(c.clone()))
                    .collect(),
            ))
        }
        "len" => {
            expect_args(method, args, 0)?;
            Ok(Value::Int(frame.borrow().n_rows() as i64))
        }
        _ => Err(ScriptError::UnknownMethod {
            method: method.to_string(),
            target: "dataframe",
            line,
        }),
    }
}

// ── Individual operations ────────────────────────────────

/// Fills nulls with a scalar (every column) or with a per-column summary
/// record (e.g. the result of `dataframe.mean()`); record keys that match
/// no column are ignored.
fn fillna(frame: &FrameRef, fill: &Value, budget: &mut Budget) -> Result<(), ScriptError> {
    let mut table = frame.borrow_mut();
    budget.charge_fuel(table.n_rows() as u64)?;

    match fill {
        Value::Record(fields) => {
            let mut replacements: Vec<Option<Cell>> = vec![None; table.n_cols()];
            for (name, value) in fields {
                if let Some(index) = table.column_index(name) {
                    match value {
                        Value::Null => {}
                        other => {
                            replacements[index] =
                                Some(other.to_cell().ok_or_else(|| {
                                    type_err("fillna", "scalar replacement values", other)
                                })?)
                        }
                    }
                }
            }
            for row in table.rows_mut() {
                for (cell, replacement) in row.iter_mut().zip(&replacements) {
                    if cell.is_null() {
                        if let Some(replacement) = replacement {
                            *cell = replacement.clone();
                        }
                    }
                }
            }
        }
        scalar => {
            let replacement = scalar
                .to_cell()
                .ok_or_else(|| type_err("fillna", "a scalar or a summary record", scalar))?;
            if replacement.is_null() {
                return Ok(());
            }
            for row in table.rows_mut() {
                for cell in row.iter_mut() {
                    if cell.is_null() {
                        *cell = replacement.clone();
                    }
                }
            }
        }
    }
    Ok(())
}

const FILTER_OPS: &[&str] = &["==", "!=", "<", "<=", ">", ">=", "contains", "is_null", "not_null"];

/// Row filter: `filter(col, op, value)` or `filter(col, "is_null")` /
/// `filter(col, "not_null")`. Null cells never match a value comparison;
/// they are reachable only through the explicit null predicates.
fn filter(frame: &FrameRef, args: &[Value], budget: &mut Budget) -> Result<(), ScriptError> {
    if args.len() != 2 && args.len() != 3 {
        return Err(arity("filter", "2 or 3", args.len()));
    }
    let column = str_arg("filter", &args[0])?;
    let op = str_arg("filter", &args[1])?;
    if !FILTER_OPS.contains(&op) {
        return Err(ScriptError::InvalidArgument {
            function: "dataframe.filter".to_string(),
            message: format!("unknown operator '{op}' (expected one of {FILTER_OPS:?})"),
        });
    }

    let mut table = frame.borrow_mut();
    let index = column_index(&table, column)?;
    budget.charge_fuel(table.n_rows() as u64)?;

    match op {
        "is_null" | "not_null" => {
            if args.len() != 2 {
                return Err(arity("filter", "2", args.len()));
            }
            let keep_null = op == "is_null";
            table.rows_mut().retain(|row| row[index].is_null() == keep_null);
        }
        _ => {
            if args.len() != 3 {
                return Err(arity("filter", "3", args.len()));
            }
            let rhs = args[2]
                .to_cell()
                .ok_or_else(|| type_err("filter", "a scalar comparison value", &args[2]))?;
            table.rows_mut().retain(|row| {
                let cell = &row[index];
                if cell.is_null() {
                    return false;
                }
                match op {
                    "==" => cell_eq(cell, &rhs),
                    "!=" => !cell_eq(cell, &rhs),
                    "contains" => match (cell, &rhs) {
                        (Cell::Str(haystack), Cell::Str(needle)) => haystack.contains(needle),
                        _ => false,
                    },
                    ordering_op => match cell_compare(cell, &rhs) {
                        Some(ordering) => match ordering_op {
                            "<" => ordering.is_lt(),
                            "<=" => ordering.is_le(),
                            ">" => ordering.is_gt(),
                            ">=" => ordering.is_ge(),
                            _ => unreachable!("validated against FILTER_OPS"),
                        },
                        None => false,
                    },
                }
            });
        }
    }
    Ok(())
}

fn cast(
    frame: &FrameRef,
    column: &str,
    target: &str,
    budget: &mut Budget,
) -> Result<(), ScriptError> {
    let mut table = frame.borrow_mut();
    let index = column_index(&table, column)?;
    budget.charge_fuel(table.n_rows() as u64)?;

    let cast_cell = |cell: &Cell| -> Result<Cell, ScriptError> {
        let bad = |detail: String| ScriptError::InvalidArgument {
            function: "dataframe.cast".to_string(),
            message: format!("cannot cast {detail} to {target} in column '{column}'"),
        };
        match target {
            "int" => match cell {
                Cell::Null => Ok(Cell::Null),
                Cell::Bool(b) => Ok(Cell::Int(*b as i64)),
                Cell::Int(i) => Ok(Cell::Int(*i)),
                Cell::Float(f) if f.is_finite() && (i64::MIN as f64..=i64::MAX as f64).contains(f) => {
                    Ok(Cell::Int(f.trunc() as i64))
                }
                Cell::Float(f) => Err(bad(format!("{f}"))),
                Cell::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Cell::Int)
                    .map_err(|_| bad(format!("'{s}'"))),
            },
            "float" => match cell {
                Cell::Null => Ok(Cell::Null),
                Cell::Bool(b) => Ok(Cell::Float(*b as i64 as f64)),
                Cell::Int(i) => Ok(Cell::Float(*i as f64)),
                Cell::Float(f) => Ok(Cell::Float(*f)),
                Cell::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Cell::Float)
                    .map_err(|_| bad(format!("'{s}'"))),
            },
            "str" => match cell {
                Cell::Null => Ok(Cell::Null),
                Cell::Bool(b) => Ok(Cell::Str(b.to_string())),
                Cell::Int(i) => Ok(Cell::Str(i.to_string())),
                Cell::Float(f) => Ok(Cell::Str(f.to_string())),
                Cell::Str(s) => Ok(Cell::Str(s.clone())),
            },
            other => Err(ScriptError::InvalidArgument {
                function: "dataframe.cast".to_string(),
                message: format!("unknown target type '{other}' (expected int, float, or str)"),
            }),
        }
    };

    let mut cells = Vec::with_capacity(table.n_rows());
    for row in table.rows() {
        cells.push(cast_cell(&row[index])?);
    }
    table.replace_column(index, cells);
    Ok(())
}

/// Replaces an existing column or appends a new one.
fn set_column(
    frame: &FrameRef,
    column: &str,
    values: &[Value],
    budget: &mut Budget,
) -> Result<(), ScriptError> {
    let mut table = frame.borrow_mut();
    if values.len() != table.n_rows() {
        return Err(ScriptError::LengthMismatch {
            column: column.to_string(),
            got: values.len(),
            want: table.n_rows(),
        });
    }
    budget.charge_cells(values.len().max(1) as u64)?;

    let mut cells = Vec::with_capacity(values.len());
    for value in values {
        cells.push(
            value
                .to_cell()
                .ok_or_else(|| type_err("set", "scalar column values", value))?,
        );
    }

    match table.column_index(column) {
        Some(index) => table.replace_column(index, cells),
        None => table.append_column(column.to_string(), cells),
    }
    Ok(())
}

fn sort_by(frame: &FrameRef, args: &[Value], budget: &mut Budget) -> Result<(), ScriptError> {
    if args.is_empty() || args.len() > 2 {
        return Err(arity("sort_by", "1 or 2", args.len()));
    }
    let column = str_arg("sort_by", &args[0])?;
    let descending = match args.get(1) {
        None => false,
        Some(value) => match str_arg("sort_by", value)? {
            "asc" => false,
            "desc" => true,
            other => {
                return Err(ScriptError::InvalidArgument {
                    function: "dataframe.sort_by".to_string(),
                    message: format!("unknown order '{other}' (expected 'asc' or 'desc')"),
                })
            }
        },
    };

    let mut table = frame.borrow_mut();
    let index = column_index(&table, column)?;
    budget.charge_fuel(table.n_rows() as u64)?;

    // Mixed-type columns have no total order; fail instead of sorting
    // arbitrarily.
    let mut has_number = false;
    let mut has_string = false;
    for row in table.rows() {
        match &row[index] {
            Cell::Null => {}
            Cell::Int(_) | Cell::Float(_) => has_number = true,
            Cell::Str(_) => has_string = true,
            Cell::Bool(_) => {
                return Err(ScriptError::InvalidArgument {
                    function: "dataframe.sort_by".to_string(),
                    message: format!("column '{column}' contains booleans, which have no order"),
                })
            }
        }
    }
    if has_number && has_string {
        return Err(ScriptError::InvalidArgument {
            function: "dataframe.sort_by".to_string(),
            message: format!("column '{column}' mixes numbers and strings"),
        });
    }

    // Stable sort; nulls always sort last regardless of direction
    table.rows_mut().sort_by(|a, b| {
        let (x, y) = (&a[index], &b[index]);
        match (x.is_null(), y.is_null()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => {
                let ordering = cell_compare(x, y).unwrap_or(std::cmp::Ordering::Equal);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        }
    });
    Ok(())
}

/// Per-column aggregate over the numeric columns, delegated to the `stats`
/// library so both surfaces agree on null handling. Non-numeric columns are
/// skipped, like the upstream `numeric_only` aggregates.
fn aggregate(frame: &FrameRef, method: &str, budget: &mut Budget) -> Result<Value, ScriptError> {
    let table = frame.borrow();
    let mut fields = Vec::new();

    for (index, name) in table.columns().iter().enumerate() {
        let mut numeric = false;
        let mut tabular = true;
        for row in table.rows() {
            match &row[index] {
                Cell::Int(_) | Cell::Float(_) => numeric = true,
                Cell::Null => {}
                _ => {
                    tabular = false;
                    break;
                }
            }
        }
        if !numeric || !tabular {
            continue;
        }

        budget.charge_fuel(table.n_rows() as u64)?;
        budget.charge_cells(table.n_rows().max(1) as u64)?;
        let column: Vec<Value> = table
            .column_values(index)
            .iter()
            .map(Value::from_cell)
            .collect();
        let result = StatsLibrary.call(method, &[Value::List(column)])?;
        fields.push((name.clone(), result));
    }

    Ok(Value::Record(fields))
}

// ── Local helpers ────────────────────────────────────────

fn expect_args(method: &str, args: &[Value], expected: usize) -> Result<(), ScriptError> {
    if args.len() == expected {
        Ok(())
    } else {
        let expected = match expected {
            0 => "0",
            1 => "1",
            2 => "2",
            _ => "several",
        };
        Err(arity(method, expected, args.len()))
    }
}

fn arity(method: &str, expected: &'static str, found: usize) -> ScriptError {
    ScriptError::Arity {
        function: format!("dataframe.{method}"),
        expected,
        found,
    }
}

fn type_err(method: &str, expected: &'static str, found: &Value) -> ScriptError {
    ScriptError::TypeMismatch {
        context: format!("dataframe.{method}"),
        expected,
        found: found.type_name().to_string(),
    }
}

fn str_arg<'a>(method: &str, value: &'a Value) -> Result<&'a str, ScriptError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(type_err(method, "a column name string", other)),
    }
}

fn column_index(table: &crate::table::Table, name: &str) -> Result<usize, ScriptError> {
    table
        .column_index(name)
        .ok_or_else(|| ScriptError::UnknownColumn {
            name: name.to_string(),
        })
}
