//! Execution budgets.
//!
//! Three ceilings guard a run: fuel (operation count — every interpreter
//! step and every row a frame op touches costs a unit), cells (memory —
//! every allocated value cell costs a unit), and a wall-clock deadline.
//! The host charges the budget on every step it executes on the script's
//! behalf, so the script has no way to run without being metered.

use std::time::{Duration, Instant};

use crate::script::ScriptError;

pub struct Budget {
    fuel: u64,
    cells: u64,
    cell_limit: u64,
    deadline: Instant,
}

impl Budget {
    pub fn new(max_fuel: u64, max_cells: u64, timeout: Duration) -> Self {
        Self {
            fuel: max_fuel,
            cells: max_cells,
            cell_limit: max_cells,
            deadline: Instant::now() + timeout,
        }
    }

    /// Charges `n` operation units and checks the wall clock.
    pub fn charge_fuel(&mut self, n: u64) -> Result<(), ScriptError> {
        if Instant::now() >= self.deadline {
            return Err(ScriptError::DeadlineExceeded);
        }
        match self.fuel.checked_sub(n) {
            Some(rest) => {
                self.fuel = rest;
                Ok(())
            }
            None => Err(ScriptError::FuelExhausted),
        }
    }

    /// Charges `n` cells of allocation.
    pub fn charge_cells(&mut self, n: u64) -> Result<(), ScriptError> {
        match self.cells.checked_sub(n) {
            Some(rest) => {
                self.cells = rest;
                Ok(())
            }
            None => Err(ScriptError::CellBudget {
                limit: self.cell_limit,
            }),
        }
    }
}
