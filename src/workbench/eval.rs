//! Dialect interpreter.
//!
//! A straightforward tree-walker. The host charges the budget at every
//! node, resolves every name through the namespace, and dispatches method
//! calls to either a workshop library or the frame vocabulary — there is no
//! other call target, so the evaluation of untrusted code can only touch
//! what those two surfaces expose.

use crate::script::ast::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use crate::script::value::Value;
use crate::script::ScriptError;

use super::budget::Budget;
use super::frame;
use super::namespace::ExecutionNamespace;

pub(super) struct Interpreter<'a, 'ws> {
    namespace: &'a mut ExecutionNamespace<'ws>,
    budget: &'a mut Budget,
}

impl<'a, 'ws> Interpreter<'a, 'ws> {
    pub(super) fn new(
        namespace: &'a mut ExecutionNamespace<'ws>,
        budget: &'a mut Budget,
    ) -> Self {
        Self { namespace, budget }
    }

    pub(super) fn run(&mut self, program: &Program) -> Result<(), ScriptError> {
        for stmt in &program.statements {
            match stmt {
                Stmt::Assign { name, expr } => {
                    let value = self.eval(expr)?;
                    self.namespace.assign(name, value)?;
                }
                Stmt::Expr(expr) => {
                    self.eval(expr)?;
                }
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        self.budget.charge_fuel(1)?;
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::List(items) => {
                self.budget.charge_cells(items.len() as u64)?;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::List(values))
            }
            Expr::Name(name, pos) => {
                self.namespace
                    .get(name)
                    .ok_or_else(|| ScriptError::UnknownName {
                        name: name.clone(),
                        line: pos.line,
                    })
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                self.unary(*op, value)
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Index { recv, index } => {
                let recv = self.eval(recv)?;
                let index = self.eval(index)?;
                self.index(recv, index)
            }
            Expr::MethodCall {
                recv,
                method,
                args,
                pos,
            } => {
                let recv = self.eval(recv)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                match recv {
                    Value::Library(name) => {
                        let library = self
                            .namespace
                            .workshop()
                            .get(&name)
                            .expect("library values originate from the registry");
                        let result = library.call(method, &values)?;
                        self.budget.charge_cells(result.cell_size())?;
                        Ok(result)
                    }
                    Value::Frame(handle) => {
                        frame::call(&handle, method, &values, self.budget, pos.line)
                    }
                    other => Err(ScriptError::UnknownMethod {
                        method: method.clone(),
                        target: other.type_name(),
                        line: pos.line,
                    }),
                }
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, value: Value) -> Result<Value, ScriptError> {
        match op {
            UnaryOp::Neg => match value {
                Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(ScriptError::Overflow),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(ScriptError::TypeMismatch {
                    context: "unary '-'".to_string(),
                    expected: "a number",
                    found: other.type_name().to_string(),
                }),
            },
            UnaryOp::Not => match value {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(ScriptError::TypeMismatch {
                    context: "'not'".to_string(),
                    expected: "a bool",
                    found: other.type_name().to_string(),
                }),
            },
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, ScriptError> {
        // and/or short-circuit; everything else is strict
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let left = self.bool_operand(op, lhs)?;
            return match (op, left) {
                (BinaryOp::And, false) => Ok(Value::Bool(false)),
                (BinaryOp::Or, true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Bool(self.bool_operand(op, rhs)?)),
            };
        }

        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(left.eq_value(&right))),
            BinaryOp::Ne => Ok(Value::Bool(!left.eq_value(&right))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                match left.compare(&right) {
                    Some(ordering) => Ok(Value::Bool(match op {
                        BinaryOp::Lt => ordering.is_lt(),
                        BinaryOp::Le => ordering.is_le(),
                        BinaryOp::Gt => ordering.is_gt(),
                        BinaryOp::Ge => ordering.is_ge(),
                        _ => unreachable!(),
                    })),
                    None => Err(self.operand_error(op, &left, &right)),
                }
            }
            BinaryOp::Add => self.add(left, right),
            BinaryOp::Sub => self.arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
            BinaryOp::Mul => self.arithmetic(op, left, right, i64::checked_mul, |a, b| a * b),
            BinaryOp::Div => {
                let (a, b) = self.numeric_operands(op, &left, &right)?;
                if b == 0.0 {
                    return Err(ScriptError::DivisionByZero);
                }
                Ok(Value::Float(a / b))
            }
            BinaryOp::Mod => match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => {
                    if *b == 0 {
                        return Err(ScriptError::DivisionByZero);
                    }
                    a.checked_rem(*b).map(Value::Int).ok_or(ScriptError::Overflow)
                }
                _ => {
                    let (a, b) = self.numeric_operands(op, &left, &right)?;
                    if b == 0.0 {
                        return Err(ScriptError::DivisionByZero);
                    }
                    Ok(Value::Float(a % b))
                }
            },
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn bool_operand(&mut self, op: BinaryOp, expr: &Expr) -> Result<bool, ScriptError> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(ScriptError::TypeMismatch {
                context: format!("operator '{}'", op.symbol()),
                expected: "bool operands",
                found: other.type_name().to_string(),
            }),
        }
    }

    fn add(&mut self, left: Value, right: Value) -> Result<Value, ScriptError> {
        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_add(*b).map(Value::Int).ok_or(ScriptError::Overflow)
            }
            (Value::Str(a), Value::Str(b)) => {
                self.budget.charge_cells(1)?;
                Ok(Value::Str(format!("{a}{b}")))
            }
            (Value::List(a), Value::List(b)) => {
                self.budget.charge_cells((a.len() + b.len()) as u64)?;
                let mut items = a.clone();
                items.extend(b.iter().cloned());
                Ok(Value::List(items))
            }
            _ => {
                let (a, b) = self.numeric_operands(BinaryOp::Add, &left, &right)?;
                Ok(Value::Float(a + b))
            }
        }
    }

    fn arithmetic(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, ScriptError> {
        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => {
                int_op(*a, *b).map(Value::Int).ok_or(ScriptError::Overflow)
            }
            _ => {
                let (a, b) = self.numeric_operands(op, &left, &right)?;
                Ok(Value::Float(float_op(a, b)))
            }
        }
    }

    fn numeric_operands(
        &self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
    ) -> Result<(f64, f64), ScriptError> {
        match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(self.operand_error(op, left, right)),
        }
    }

    fn operand_error(&self, op: BinaryOp, left: &Value, right: &Value) -> ScriptError {
        ScriptError::TypeMismatch {
            context: format!("operator '{}'", op.symbol()),
            expected: "compatible operands",
            found: format!("{} and {}", left.type_name(), right.type_name()),
        }
    }

    fn index(&mut self, recv: Value, index: Value) -> Result<Value, ScriptError> {
        match (&recv, &index) {
            (Value::Frame(handle), Value::Str(name)) => {
                let table = handle.borrow();
                let column =
                    table
                        .column_index(name)
                        .ok_or_else(|| ScriptError::UnknownColumn {
                            name: name.clone(),
                        })?;
                self.budget.charge_cells(table.n_rows().max(1) as u64)?;
                Ok(Value::List(
                    table
                        .column_values(column)
                        .iter()
                        .map(Value::from_cell)
                        .collect(),
                ))
            }
            (Value::Record(fields), Value::Str(name)) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| ScriptError::UnknownKey { name: name.clone() }),
            (Value::List(items), Value::Int(i)) => {
                let len = items.len();
                let resolved = if *i < 0 { *i + len as i64 } else { *i };
                if resolved < 0 || resolved as usize >= len {
                    return Err(ScriptError::IndexOutOfBounds { index: *i, len });
                }
                Ok(items[resolved as usize].clone())
            }
            _ => Err(ScriptError::TypeMismatch {
                context: "indexing".to_string(),
                expected: "dataframe[str], record[str], or list[int]",
                found: format!("{}[{}]", recv.type_name(), index.type_name()),
            }),
        }
    }
}
