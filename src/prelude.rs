//! # midend Prelude
//!
//! The most commonly used types of the crate in one import.
//!
//! ```rust
//! use midend::prelude::*;
//!
//! let mut module = Module::new(vec![Stmt::function_def(
//!     "foo",
//!     &["a"],
//!     vec![Stmt::ret(Some(Expr::binop(Expr::name("a"), BinOp::Pow, Expr::int(2))))],
//! )]);
//! Optimizer::default().optimize(&mut module)?;
//! assert_eq!(module.to_string(), "def foo(a):\n    return __builtin__.pow2(a)\n");
//! # Ok::<(), midend::Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all midend operations
pub use crate::Error;

/// The result type used throughout midend
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// One-call optimization
pub use crate::compiler::{OptimizeResult, Optimizer, OptimizerConfig};

// ================================================================================================
// Syntax Tree
// ================================================================================================

/// Nodes, identities and annotations
pub use crate::ast::{
    Annotation, AstId, BinOp, BoolOp, CmpOp, Comprehension, Expr, ExprKind, FunctionDef,
    Literal, Metadata, Module, OmpDirective, Param, Stmt, StmtKind, UnaryOp,
};

// ================================================================================================
// Evaluation
// ================================================================================================

/// Sandboxed evaluation over the builtin module table
pub use crate::eval::{EvalLimits, Evaluator, ModuleTable, Value};

// ================================================================================================
// Analyses
// ================================================================================================

/// Analysis contracts and the built-in analyzer
pub use crate::analysis::{
    Analyses, AnalysisKind, AnalysisProvider, AnalysisResult, TreeAnalyzer,
};

// ================================================================================================
// Passes and Pipeline
// ================================================================================================

/// Pass infrastructure
pub use crate::compiler::{
    CompilerContext, DerivedStats, EventKind, EventLog, PassScheduler, TreePass,
};
