//! Workbench — the capability-restricted execution environment.
//!
//! Second defensive layer, and the one that actually holds: a fresh
//! namespace per execution containing exactly the dataset, the request
//! parameters, and the workshop handles. The dialect has no import
//! construct to disable — it never existed — and name resolution is owned
//! by the host, so there is no reachable back-reference from script values
//! to anything outside the allowlist.
//!
//! Execution is metered: fuel (per interpreter step and per row touched),
//! a wall-clock deadline checked on the same cadence, a cell budget for
//! allocations, and an output-size ceiling on the final dataset. Budget
//! breaches terminate evaluation at the next charge — the script cannot
//! decline to be charged — and the gateway adds an outer timeout as a
//! backstop.

mod budget;
mod eval;
mod frame;
mod namespace;

use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;

use crate::policy::PolicyDecision;
use crate::script::ast;
use crate::script::value::Value;
use crate::script::ScriptError;
use crate::table::{Cell, Table};
use crate::workshop::Workshop;

use budget::Budget;
use namespace::ExecutionNamespace;

/// The well-known name the dataset is bound to inside the namespace.
pub const DATASET_BINDING: &str = "dataframe";

/// The name the request parameters are bound to.
pub const PARAMS_BINDING: &str = "params";

/// Per-execution resource ceilings.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Wall-clock budget, enforced inside the interpreter and again by the
    /// gateway backstop.
    pub timeout: Duration,
    /// Operation budget: one unit per interpreter step or row touched.
    pub max_fuel: u64,
    /// Allocation budget in cells.
    pub max_cells: u64,
    /// Ceiling on the size of the returned dataset, in cells.
    pub max_output_cells: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2_000),
            max_fuel: 5_000_000,
            max_cells: 2_000_000,
            max_output_cells: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    PolicyRejected,
    RuntimeError,
    Timeout,
    ResourceExceeded,
}

/// Terminal outcome of one request. Returned once, never retried.
#[derive(Debug)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// The transformed dataset; present iff `status == Success`.
    pub output: Option<Table>,
    /// Human-reviewer diagnostics. Speaks only about the submitted script
    /// and its data, never about the host.
    pub diagnostics: String,
}

impl ExecutionResult {
    /// Result for code the scanner refused. The workbench is never invoked
    /// for these.
    pub fn policy_rejected(decision: &PolicyDecision) -> Self {
        Self {
            status: ExecutionStatus::PolicyRejected,
            output: None,
            diagnostics: format!("static policy scan rejected the code: {}", decision.summary()),
        }
    }
}

/// Executes approved code against the dataset under the given limits.
///
/// Callable only after a `PolicyDecision` allowed the source; the gateway
/// enforces that ordering. Every failure mode comes back as a first-class
/// [`ExecutionResult`] — this function does not panic on script input.
pub fn execute(
    source: &str,
    dataset: Table,
    params: Vec<(String, Cell)>,
    workshop: &Workshop,
    limits: &Limits,
) -> ExecutionResult {
    let program = match ast::parse(source) {
        Ok(program) => program,
        Err(error) => return failure(error, limits),
    };

    let mut namespace = ExecutionNamespace::new(workshop);
    namespace.install(DATASET_BINDING, Value::frame(dataset));
    namespace.install(
        PARAMS_BINDING,
        Value::Record(
            params
                .iter()
                .map(|(name, cell)| (name.clone(), Value::from_cell(cell)))
                .collect(),
        ),
    );

    let mut budget = Budget::new(limits.max_fuel, limits.max_cells, limits.timeout);
    if let Err(error) = eval::Interpreter::new(&mut namespace, &mut budget).run(&program) {
        return failure(error, limits);
    }

    // Extract the (possibly rebound) dataset; the rest of the namespace is
    // dropped here.
    match namespace.into_binding(DATASET_BINDING) {
        Some(Value::Frame(handle)) => {
            let table = match Rc::try_unwrap(handle) {
                Ok(cell) => cell.into_inner(),
                // An alias still holds the frame; clone it out
                Err(shared) => shared.borrow().clone(),
            };
            let cells = table.cell_count() as u64;
            if cells > limits.max_output_cells {
                return ExecutionResult {
                    status: ExecutionStatus::ResourceExceeded,
                    output: None,
                    diagnostics: format!(
                        "output dataset has {cells} cells, over the {}-cell output ceiling",
                        limits.max_output_cells
                    ),
                };
            }
            ExecutionResult {
                status: ExecutionStatus::Success,
                output: Some(table),
                diagnostics: String::new(),
            }
        }
        Some(other) => ExecutionResult {
            status: ExecutionStatus::RuntimeError,
            output: None,
            diagnostics: format!(
                "script left '{DATASET_BINDING}' bound to {}; it must remain a dataframe",
                other.type_name()
            ),
        },
        None => ExecutionResult {
            status: ExecutionStatus::RuntimeError,
            output: None,
            diagnostics: format!("script removed the '{DATASET_BINDING}' binding"),
        },
    }
}

fn failure(error: ScriptError, limits: &Limits) -> ExecutionResult {
    let (status, diagnostics) = match &error {
        ScriptError::DeadlineExceeded => (
            ExecutionStatus::Timeout,
            format!(
                "execution did not finish within the {} ms wall-clock budget",
                limits.timeout.as_millis()
            ),
        ),
        ScriptError::FuelExhausted => (
            ExecutionStatus::Timeout,
            format!(
                "execution exceeded the operation budget ({} steps)",
                limits.max_fuel
            ),
        ),
        ScriptError::CellBudget { .. } => (ExecutionStatus::ResourceExceeded, error.to_string()),
        _ => (ExecutionStatus::RuntimeError, error.to_string()),
    };
    ExecutionResult {
        status,
        output: None,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Table {
        Table::from_records(&json!([
            {"age": 1, "name": "ada"},
            {"age": null, "name": "bob"},
            {"age": 3, "name": "cy"},
        ]))
        .unwrap()
    }

    fn run(source: &str) -> ExecutionResult {
        execute(
            source,
            dataset(),
            Vec::new(),
            Workshop::global(),
            &Limits::default(),
        )
    }

    // ── The §8 scenario ───────────────────────────────────

    #[test]
    fn test_fillna_with_mean_scenario() {
        let result = run("dataframe.fillna(dataframe.mean())");
        assert_eq!(result.status, ExecutionStatus::Success, "{}", result.diagnostics);
        let output = result.output.unwrap();
        let age = output.column_index("age").unwrap();
        let cells = output.column_values(age);
        let values: Vec<f64> = cells.iter().map(|c| c.as_f64().unwrap()).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rename_preserves_cells() {
        let result = run(r#"dataframe.rename("age", "years")"#);
        assert_eq!(result.status, ExecutionStatus::Success);
        let output = result.output.unwrap();
        assert_eq!(output.columns(), &["years".to_string(), "name".to_string()]);
        assert_eq!(output.rows()[0][0], Cell::Int(1));
    }

    // ── Failure taxonomy ──────────────────────────────────

    #[test]
    fn test_runtime_error_is_a_result_not_a_panic() {
        let result = run(r#"dataframe.drop("ghost")"#);
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.output.is_none());
        assert!(result.diagnostics.contains("ghost"));
    }

    #[test]
    fn test_parse_error_is_runtime_error_with_position() {
        let result = run("x = ");
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.diagnostics.contains("line 1"));
    }

    #[test]
    fn test_wall_clock_timeout() {
        let limits = Limits {
            timeout: Duration::from_millis(0),
            ..Limits::default()
        };
        let result = execute(
            "dataframe.dropna()",
            dataset(),
            Vec::new(),
            Workshop::global(),
            &limits,
        );
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(result.diagnostics.contains("wall-clock"));
    }

    #[test]
    fn test_operation_budget_maps_to_timeout() {
        let limits = Limits {
            max_fuel: 3,
            ..Limits::default()
        };
        let result = execute(
            "x = 1 + 1 + 1 + 1 + 1",
            dataset(),
            Vec::new(),
            Workshop::global(),
            &limits,
        );
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(result.diagnostics.contains("operation budget"));
    }

    #[test]
    fn test_allocation_bomb_is_resource_exceeded() {
        // Doubles a list until the cell budget trips; must terminate with
        // a result, not crash or hang.
        let limits = Limits {
            max_cells: 10_000,
            ..Limits::default()
        };
        let source = r#"
            a = dataframe["age"]
            a = a + a; a = a + a; a = a + a; a = a + a; a = a + a
            a = a + a; a = a + a; a = a + a; a = a + a; a = a + a
            a = a + a; a = a + a; a = a + a; a = a + a; a = a + a
        "#;
        let result = execute(source, dataset(), Vec::new(), Workshop::global(), &limits);
        assert_eq!(result.status, ExecutionStatus::ResourceExceeded);
        assert!(result.diagnostics.contains("memory budget"));
    }

    #[test]
    fn test_output_ceiling() {
        let limits = Limits {
            max_output_cells: 2,
            ..Limits::default()
        };
        // The input dataset already has 6 cells; a no-op still may not
        // return more than the ceiling
        let result = execute("x = 1", dataset(), Vec::new(), Workshop::global(), &limits);
        assert_eq!(result.status, ExecutionStatus::ResourceExceeded);
        assert!(result.diagnostics.contains("output"));
    }

    #[test]
    fn test_rebinding_dataset_to_scalar_is_reported() {
        let result = run("dataframe = 42");
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.diagnostics.contains("must remain a dataframe"));
    }

    #[test]
    fn test_rebinding_dataset_to_derived_frame_is_fine() {
        let result = run("dataframe = dataframe");
        assert_eq!(result.status, ExecutionStatus::Success);
    }

    // ── Defense in depth: scanner-bypass payloads ─────────
    //
    // These payloads are what the policy scanner exists to catch. Feeding
    // them straight into the workbench proves the second layer fails
    // closed on its own.

    #[test]
    fn test_bypass_bare_call_does_not_resolve() {
        let result = run(r#"open("/etc/passwd")"#);
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
    }

    #[test]
    fn test_bypass_dunder_method_does_not_resolve() {
        let result = run("dataframe.__class__()");
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
    }

    #[test]
    fn test_bypass_capability_names_do_not_resolve() {
        for payload in ["x = os", "x = subprocess", "x = builtins", "x = eval"] {
            let result = run(payload);
            assert_eq!(
                result.status,
                ExecutionStatus::RuntimeError,
                "payload resolved: {payload}"
            );
            assert!(result.diagnostics.contains("unknown name"));
        }
    }

    #[test]
    fn test_diagnostics_do_not_leak_host_details() {
        for source in ["x = missing", "dataframe.cast(\"age\", \"date\")", "1 / 0"] {
            let diagnostics = run(source).diagnostics;
            assert!(!diagnostics.contains("src/"), "leaked: {diagnostics}");
            assert!(!diagnostics.contains(".rs"), "leaked: {diagnostics}");
            assert!(!diagnostics.contains("panicked"), "leaked: {diagnostics}");
        }
    }

    // ── Params and idempotence ────────────────────────────

    #[test]
    fn test_params_are_bound() {
        let result = execute(
            r#"dataframe.filter("age", ">=", params["min_age"])"#,
            dataset(),
            vec![("min_age".to_string(), Cell::Int(3))],
            Workshop::global(),
            &Limits::default(),
        );
        assert_eq!(result.status, ExecutionStatus::Success, "{}", result.diagnostics);
        assert_eq!(result.output.unwrap().n_rows(), 1);
    }

    #[test]
    fn test_idempotent_transformation_applied_twice() {
        let noop = r#"dataframe.filter("age", "not_null")"#;
        let first = run(noop);
        assert_eq!(first.status, ExecutionStatus::Success);
        let once = first.output.unwrap();

        let second = execute(
            noop,
            once.clone(),
            Vec::new(),
            Workshop::global(),
            &Limits::default(),
        );
        assert_eq!(second.status, ExecutionStatus::Success);
        assert_eq!(second.output.unwrap(), once);
    }

    // ── Concurrent isolation ──────────────────────────────

    #[test]
    fn test_concurrent_executions_are_independent() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    let table = Table::from_records(&json!([{"v": i}, {"v": null}])).unwrap();
                    let result = execute(
                        "dataframe.fillna(0)",
                        table,
                        Vec::new(),
                        Workshop::global(),
                        &Limits::default(),
                    );
                    (i, result)
                })
            })
            .collect();

        for handle in handles {
            let (i, result) = handle.join().unwrap();
            assert_eq!(result.status, ExecutionStatus::Success);
            let output = result.output.unwrap();
            // Each execution sees only its own dataset
            assert_eq!(output.rows()[0][0], Cell::Int(i));
            assert_eq!(output.rows()[1][0], Cell::Int(0));
        }
    }
}
