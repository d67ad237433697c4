//! Syntax tree model for the optimizer.
//!
//! The tree is an owned, mutable structure: a [`Module`] exclusively owns its
//! statements, every statement its expressions and nested blocks. Passes
//! receive `&mut Module` and rewrite it in place.
//!
//! # Identity
//!
//! Every node carries an [`AstId`] allocated when the node is created.
//! Analyses key their facts by id, never by structure, so a rewrite that
//! builds a new node cannot pick up facts computed for an old one. Copying a
//! subtree with [`Expr::deep_copy`] or [`Stmt::deep_copy`] hands out fresh ids
//! and duplicates any [`Metadata`] annotations onto them.
//!
//! # Key Components
//!
//! - [`Module`] - top-level statements and the annotation side table
//! - [`Stmt`] / [`StmtKind`] - statements, including function definitions and loops
//! - [`Expr`] / [`ExprKind`] - expressions
//! - [`Metadata`] / [`Annotation`] - out-of-band hints such as parallelism directives
//!
//! # Examples
//!
//! ```rust
//! use midend::ast::{BinOp, Expr, Module, Stmt};
//!
//! // i = 0
//! // for j in [1, 2]:
//! //     i += j
//! let module = Module::new(vec![
//!     Stmt::assign_name("i", Expr::int(0)),
//!     Stmt::for_loop(
//!         "j",
//!         Expr::list(vec![Expr::int(1), Expr::int(2)]),
//!         vec![Stmt::aug_assign("i", BinOp::Add, Expr::name("j"))],
//!     ),
//! ]);
//! assert_eq!(module.to_string(), "i = 0\nfor j in [1, 2]:\n    i += j\n");
//! ```

mod display;
mod expr;
mod id;
mod metadata;
mod stmt;
mod visit;

pub(crate) use display::{complex_repr, float_repr, str_repr};
pub use expr::{
    BinOp, BoolOp, CmpOp, Comprehension, Expr, ExprKind, Literal, UnaryOp, BUILTIN_MODULE,
};
pub use id::AstId;
pub use metadata::{Annotation, Metadata, OmpDirective};
pub use stmt::{FunctionDef, Module, Param, Stmt, StmtKind};
pub use visit::{deep_copy_block, find_in_block_mut};
