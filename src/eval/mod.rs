//! Compile-time evaluation of constant expressions.
//!
//! Constant folding needs to know the value of an expression before the
//! program runs. This module provides a small sandboxed interpreter for that:
//! it understands the expression vocabulary of [`crate::ast`], a closed table
//! of pure builtin functions ([`ModuleTable`]) and the top-level functions of
//! the module being optimized. Anything outside that sandbox (I/O, attribute
//! stores, unknown modules, method calls) is an [`EvalError`], which the
//! folding pass treats as "leave this node alone".
//!
//! # Key Components
//!
//! - [`Value`] - runtime values: numbers, strings and containers
//! - [`ModuleTable`] - the builtin namespace, passed in as configuration
//! - [`Environment`] - globals and callable functions prepared from a module
//! - [`Evaluator`] - evaluates one expression under [`EvalLimits`]
//! - [`to_node`] - converts a value back into a literal expression
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use midend::ast::{BinOp, Expr, Module};
//! use midend::eval::{to_node, EvalLimits, Environment, Evaluator, ModuleTable, Value, MAX_LEN};
//!
//! let module = Module::default();
//! let env = Environment::prepare(&module, Arc::new(ModuleTable::standard()), EvalLimits::default());
//!
//! let expr = Expr::binop(Expr::int(7), BinOp::FloorDiv, Expr::int(-2));
//! let value = Evaluator::new(&env, EvalLimits::default()).eval(&expr).unwrap();
//! assert_eq!(value, Value::Int(-4));
//! assert_eq!(to_node(&value, MAX_LEN).unwrap().to_string(), "-4");
//! ```

mod builtins;
mod convert;
mod env;
mod interp;
mod ops;
mod value;

use thiserror::Error;

pub use builtins::{BuiltinFn, Entry, ModuleTable};
pub use convert::{to_node, MAX_LEN};
pub use env::Environment;
pub use interp::Evaluator;
pub use ops::{binary, compare, unary};
pub use value::Value;

/// Why an expression could not be evaluated at compile time.
///
/// None of these are fatal: the folding pass logs them and keeps the original
/// subtree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// An operation was applied to values of the wrong kind.
    #[error("type error: {0}")]
    Type(String),

    /// A value was of the right kind but out of the operation's domain.
    #[error("value error: {0}")]
    Value(String),

    /// Division or modulo by zero.
    #[error("division by zero")]
    ZeroDivision,

    /// Integer arithmetic left the 64-bit range.
    #[error("integer overflow")]
    Overflow,

    /// Sequence index out of range.
    #[error("index out of range")]
    Index,

    /// Missing mapping key.
    #[error("key not found: {0}")]
    Key(String),

    /// A name is not bound in any visible scope.
    #[error("name `{0}` is not defined")]
    Name(String),

    /// The expression references a module the table does not provide.
    #[error("module `{0}` is not available at compile time")]
    UnknownModule(String),

    /// The construct is outside the evaluation sandbox.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A container grew past the evaluation cap.
    #[error("container of {0} elements exceeds the evaluation limit")]
    ContainerTooLarge(usize),

    /// The evaluation ran out of its step budget.
    #[error("evaluation step budget exhausted")]
    FuelExhausted,

    /// User function calls nested deeper than allowed.
    #[error("maximum recursion depth exceeded")]
    RecursionLimit,
}

/// Why a computed value could not be turned back into a literal node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The value has no literal spelling (iterators, `None`).
    #[error("value of kind `{0}` has no literal form")]
    Unsupported(&'static str),

    /// A container is at or above the size cap.
    #[error("container of {len} elements is not below the cap of {max}")]
    TooLarge {
        /// Number of elements in the offending container
        len: usize,
        /// The cap it was checked against
        max: usize,
    },

    /// Infinities and NaN have no literal spelling.
    #[error("non-finite float has no literal form")]
    NonFinite,
}

/// Result of an evaluation step.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Resource bounds for a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    /// Maximum number of expression and statement steps
    pub fuel: u64,
    /// Maximum nesting of user function calls
    pub max_depth: usize,
    /// Maximum length of a list, tuple, string or iterator
    pub max_items: usize,
    /// Maximum size of a set or mapping
    pub max_hashed: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        EvalLimits {
            fuel: 100_000,
            max_depth: 64,
            max_items: 65_536,
            max_hashed: 4_096,
        }
    }
}

impl EvalLimits {
    /// Fails if a sequence of `len` elements would exceed the cap.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ContainerTooLarge`] when `len > max_items`.
    pub fn check_items(&self, len: usize) -> EvalResult<()> {
        if len > self.max_items {
            Err(EvalError::ContainerTooLarge(len))
        } else {
            Ok(())
        }
    }

    /// Fails if a set or mapping of `len` entries would exceed the cap.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ContainerTooLarge`] when `len > max_hashed`.
    pub fn check_hashed(&self, len: usize) -> EvalResult<()> {
        if len > self.max_hashed {
            Err(EvalError::ContainerTooLarge(len))
        } else {
            Ok(())
        }
    }
}
