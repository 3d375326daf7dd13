//! Runtime values of the transformation dialect.
//!
//! `Value` is thread-local to one workbench execution: frames are shared
//! within a script via `Rc<RefCell<_>>` so that method calls mutate the
//! dataset binding the way the upstream planner expects
//! (`dataframe.fillna(...)` updates `dataframe`), and the final table is
//! extracted by value before the namespace is discarded.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::table::{Cell, Table};

/// Shared handle to a table within one execution.
pub type FrameRef = Rc<RefCell<Table>>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// The dataset (or a derived frame), shared within the script.
    Frame(FrameRef),
    /// Ordered name→value mapping: aggregate summaries and `params`.
    Record(Vec<(String, Value)>),
    /// A preloaded workshop library, resolved by name at call time.
    Library(String),
}

impl Value {
    pub fn frame(table: Table) -> Value {
        Value::Frame(Rc::new(RefCell::new(table)))
    }

    pub fn from_cell(cell: &Cell) -> Value {
        match cell {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::Int(*i),
            Cell::Float(f) => Value::Float(*f),
            Cell::Str(s) => Value::Str(s.clone()),
        }
    }

    /// Converts a scalar value into a cell. Non-scalar values have no cell
    /// representation.
    pub fn to_cell(&self) -> Option<Cell> {
        match self {
            Value::Null => Some(Cell::Null),
            Value::Bool(b) => Some(Cell::Bool(*b)),
            Value::Int(i) => Some(Cell::Int(*i)),
            Value::Float(f) => Some(Cell::Float(*f)),
            Value::Str(s) => Some(Cell::Str(s.clone())),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Frame(_) => "dataframe",
            Value::Record(_) => "record",
            Value::Library(_) => "library",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Structural equality with numeric coercion (`1 == 1.0` is true,
    /// `null == null` is true).
    pub fn eq_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_))
            | (Value::Float(_), Value::Float(_)) => {
                // unwrap: both sides are numeric in these arms
                self.as_f64().unwrap() == other.as_f64().unwrap()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_value(y))
            }
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.eq_value(vb))
            }
            (Value::Frame(a), Value::Frame(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Library(a), Value::Library(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering for `<`/`<=`/`>`/`>=`: defined for number pairs and string
    /// pairs only.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }

    /// Approximate allocation size in cell units, used for the memory
    /// budget. Scalars count as one cell.
    pub fn cell_size(&self) -> u64 {
        match self {
            Value::List(items) => items.iter().map(Value::cell_size).sum::<u64>().max(1),
            Value::Frame(frame) => frame.borrow().cell_count() as u64,
            Value::Record(fields) => fields.iter().map(|(_, v)| v.cell_size()).sum::<u64>().max(1),
            _ => 1,
        }
    }
}

/// Comparison of two cells with the same semantics as [`Value::eq_value`] /
/// [`Value::compare`]; used by the frame filter/sort operations.
pub fn cell_compare(a: &Cell, b: &Cell) -> Option<Ordering> {
    match (a, b) {
        (Cell::Str(x), Cell::Str(y)) => Some(x.cmp(y)),
        _ => {
            let x = a.as_f64()?;
            let y = b.as_f64()?;
            x.partial_cmp(&y)
        }
    }
}

pub fn cell_eq(a: &Cell, b: &Cell) -> bool {
    match (a, b) {
        (Cell::Null, Cell::Null) => true,
        (Cell::Bool(x), Cell::Bool(y)) => x == y,
        (Cell::Str(x), Cell::Str(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}
