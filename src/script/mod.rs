//! The transformation dialect.
//!
//! Submitted code is written in a small, closed expression/statement
//! language instead of a general-purpose one. The grammar has no import
//! construct, no bare function calls, and no attribute access outside
//! method-call position — the only way a script can reach a capability is
//! through a name the workbench chose to bind. That makes the capability
//! allowlist structural: there is nothing to subtract, because nothing
//! outside the namespace is expressible.
//!
//! Pipeline: [`lexer`] produces positioned tokens (shared with the policy
//! scanner), [`ast`] parses them into a [`Program`], and the workbench
//! evaluates the program against its namespace.
//!
//! [`Program`]: ast::Program

pub mod ast;
pub mod lexer;
pub mod value;

use thiserror::Error;

/// Everything that can go wrong while lexing, parsing, or evaluating a
/// script. Variants carry only script-level context (positions, names,
/// budget kinds) so the message is always safe to show a reviewer.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: u32,
        column: u32,
        message: String,
    },

    #[error("line {line}: unknown name '{name}'")]
    UnknownName { name: String, line: u32 },

    #[error("unknown column '{name}'")]
    UnknownColumn { name: String },

    #[error("line {line}: unknown method '{method}' on {target}")]
    UnknownMethod {
        method: String,
        target: &'static str,
        line: u32,
    },

    #[error("library '{library}' has no function '{function}'")]
    UnknownFunction { library: String, function: String },

    #[error("{context}: expected {expected}, got {found}")]
    TypeMismatch {
        context: String,
        expected: &'static str,
        found: String,
    },

    #[error("{function}: expected {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },

    #[error("{function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("unknown key '{name}'")]
    UnknownKey { name: String },

    #[error("list index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("column '{column}' replacement has {got} values, table has {want} rows")]
    LengthMismatch {
        column: String,
        got: usize,
        want: usize,
    },

    #[error("cannot rebind preloaded library '{name}'")]
    LibraryRebind { name: String },

    #[error("wall-clock budget exceeded")]
    DeadlineExceeded,

    #[error("operation budget exceeded")]
    FuelExhausted,

    #[error("memory budget exceeded ({limit} cells)")]
    CellBudget { limit: u64 },
}
