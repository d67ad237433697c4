//! Built-in tree optimization passes.
//!
//! Each pass rewrites the [`Module`] in place, records what it did in the
//! [`EventLog`](crate::compiler::EventLog) and reports whether anything
//! changed.
//!
//! # Pipeline Phases
//!
//! The [`PassScheduler`](crate::compiler::PassScheduler) organizes passes into
//! phases. Within each phase, passes run iteratively until a fixpoint is
//! reached, and the normalization phase runs again after every other phase.
//!
//! ## Phase 1: Normalization
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`ConstantFoldingPass`] | Evaluates constant expressions and replaces them with literals |
//! | [`ForwardSubstitutionPass`] | Moves single-use and literal definitions into their uses |
//! | [`DeadCodeEliminationPass`] | Drops unread targets and expression statements without effect |
//!
//! ## Phase 2: Expansion
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`LoopUnrollingPass`] | Expands loops over list and tuple literals |
//!
//! ## Phase 3: Lowering
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`Pow2Pass`] | `x ** 2` to `__builtin__.pow2(x)` |
//! | [`ListCompToGenexpPass`] | Iterated list comprehensions to generator expressions |
//! | [`IterTransformationPass`] | Iterated `range` calls to `__builtin__.xrange` |
//!
//! # Analysis Integration
//!
//! Passes never compute analyses themselves. They declare what they read via
//! [`TreePass::requires`](crate::compiler::TreePass::requires) and receive it
//! from the scheduler, computed for the tree as it is on entry.

mod constants;
mod deadcode;
mod forward;
mod genexp;
mod iterators;
mod pow2;
mod unroll;

pub use constants::ConstantFoldingPass;
pub use deadcode::DeadCodeEliminationPass;
pub use forward::ForwardSubstitutionPass;
pub use genexp::ListCompToGenexpPass;
pub use iterators::IterTransformationPass;
pub use pow2::Pow2Pass;
pub use unroll::LoopUnrollingPass;

use crate::ast::{AstId, Expr, Module, Stmt, StmtKind};

/// Finds a statement by identity in a block and its nested blocks.
pub(crate) fn find_stmt(block: &[Stmt], id: AstId) -> Option<&Stmt> {
    for stmt in block {
        if stmt.id == id {
            return Some(stmt);
        }
        for nested in stmt.blocks() {
            if let Some(found) = find_stmt(nested, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Applies `rewrite` to every expression under `block`, children before
/// their parents. `rewrite` receives the name of the enclosing top-level
/// function and returns `true` if it changed the node.
pub(crate) fn rewrite_exprs(
    block: &mut [Stmt],
    function: Option<&str>,
    rewrite: &mut dyn FnMut(&mut Expr, Option<&str>) -> bool,
) -> bool {
    fn expr(
        node: &mut Expr,
        function: Option<&str>,
        rewrite: &mut dyn FnMut(&mut Expr, Option<&str>) -> bool,
    ) -> bool {
        let mut changed = false;
        for child in node.children_mut() {
            changed |= expr(child, function, rewrite);
        }
        rewrite(node, function) | changed
    }

    let mut changed = false;
    for stmt in block.iter_mut() {
        if let StmtKind::FunctionDef(def) = &mut stmt.kind {
            changed |= rewrite_exprs(&mut def.body, Some(&def.name), rewrite);
            continue;
        }
        for node in stmt.exprs_mut() {
            changed |= expr(node, function, rewrite);
        }
        for nested in stmt.blocks_mut() {
            changed |= rewrite_exprs(nested, function, rewrite);
        }
    }
    changed
}

/// Returns `true` if any top-level statement defines a function.
pub(crate) fn has_functions(module: &Module) -> bool {
    module.functions().next().is_some()
}
