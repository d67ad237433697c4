// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![deny(unsafe_code)]

//! # midend
//!
//! The optimizing middle-end of an ahead-of-time compiler for a Python-like
//! language. `midend` takes a syntax tree produced by an external parser and
//! rewrites it into a semantically equivalent, cheaper tree before code
//! generation.
//!
//! ## Features
//!
//! - **Constant folding** - a sandboxed partial evaluator over a closed table of pure builtins
//! - **Forward substitution** - inlines single-use definitions driven by use-def chains and laziness
//! - **Dead code elimination** - drops unused bindings without ever dropping a side effect
//! - **Full loop unrolling** - expands loops over literal sequences under a node-count ceiling
//! - **Peephole lowering** - `x ** 2` to `pow2`, list comprehensions to generators, `range` to `xrange`
//!
//! ## Quick Start
//!
//! ```rust
//! use midend::prelude::*;
//!
//! // def foo():
//! //     return 1 + 3
//! let mut module = Module::new(vec![Stmt::function_def(
//!     "foo",
//!     &[],
//!     vec![Stmt::ret(Some(Expr::binop(Expr::int(1), BinOp::Add, Expr::int(3))))],
//! )]);
//!
//! let result = Optimizer::new(OptimizerConfig::default()).optimize(&mut module)?;
//! assert_eq!(module.to_string(), "def foo():\n    return 4\n");
//! println!("{}", result.summary());
//! # Ok::<(), midend::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ast`] - the mutable syntax tree, node identities and the metadata side table
//! - [`eval`] - values, the builtin module table and the sandboxed evaluator
//! - [`analysis`] - analysis contracts and the reference [`analysis::TreeAnalyzer`]
//! - [`compiler`] - the pass trait, passes, scheduler, events and the [`Optimizer`] facade
//! - [`Error`] and [`Result`] - error handling for fatal pipeline conditions

#[macro_use]
pub(crate) mod error;


/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use midend::prelude::*;
///
/// let module = Module::new(vec![Stmt::pass()]);
/// assert_eq!(module.to_string(), "pass\n");
/// ```
pub mod prelude;

/// The syntax tree and its out-of-band metadata.
///
/// # Key Types
///
/// - [`ast::Module`] - a whole program: top-level statements plus [`ast::Metadata`]
/// - [`ast::Stmt`] / [`ast::Expr`] - statement and expression nodes
/// - [`ast::AstId`] - the identity every analysis fact is keyed by
pub mod ast;

/// Compile-time evaluation: values, builtin modules and the sandboxed evaluator.
pub mod eval;

/// Static analyses consumed by the optimization passes.
///
/// Each analysis is a pure function of a tree snapshot producing an immutable
/// fact table. Passes declare the [`analysis::AnalysisKind`]s they need and
/// receive them precomputed through [`analysis::Analyses`].
pub mod analysis;

/// Pass infrastructure and the optimization passes themselves.
pub mod compiler;

/// Internal utilities (directed graphs).
pub mod utils;

/// `midend` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `midend` Error type
///
/// Only fatal pipeline conditions surface as [`Error`]. A constant that cannot
/// be folded is a normal outcome and never produces one.
///
/// # Examples
///
/// ```rust
/// use midend::{analysis::{Analyses, AnalysisKind}, Error};
///
/// let analyses = Analyses::new();
/// match analyses.use_def_chains() {
///     Err(Error::MissingAnalysis(kind)) => assert_eq!(kind, AnalysisKind::UseDefChains),
///     _ => unreachable!(),
/// }
/// ```
pub use error::Error;

/// One-call optimization entry point, see [`compiler::Optimizer`].
pub use compiler::{Optimizer, OptimizerConfig};
