//! Structural measurements over subtrees.

use crate::ast::{Expr, Stmt, StmtKind};

/// Node counting and loop-control predicates, evaluated on demand over the
/// current tree rather than precomputed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtreeMetrics;

impl SubtreeMetrics {
    /// Number of nodes in a block: every statement plus every expression node
    /// beneath it.
    #[must_use]
    pub fn node_count(&self, block: &[Stmt]) -> usize {
        block.iter().map(stmt_nodes).sum()
    }

    /// Returns `true` if the block contains a `break` belonging to the loop
    /// whose body it is.
    #[must_use]
    pub fn has_break(&self, block: &[Stmt]) -> bool {
        contains_own(block, &|kind| matches!(kind, StmtKind::Break))
    }

    /// Returns `true` if the block contains a `continue` belonging to the loop
    /// whose body it is.
    #[must_use]
    pub fn has_continue(&self, block: &[Stmt]) -> bool {
        contains_own(block, &|kind| matches!(kind, StmtKind::Continue))
    }
}

fn stmt_nodes(stmt: &Stmt) -> usize {
    let exprs: usize = stmt.exprs().into_iter().map(expr_nodes).sum();
    let nested: usize = stmt
        .blocks()
        .into_iter()
        .map(|block| block.iter().map(stmt_nodes).sum::<usize>())
        .sum();
    1 + exprs + nested
}

fn expr_nodes(expr: &Expr) -> usize {
    let mut count = 0;
    expr.walk(&mut |_| count += 1);
    count
}

/// Nested loops own the control statements of their bodies, nested
/// functions own everything. A nested loop's `else` block still belongs to
/// the enclosing loop.
fn contains_own(block: &[Stmt], hit: &dyn Fn(&StmtKind) -> bool) -> bool {
    block.iter().any(|stmt| match &stmt.kind {
        kind if hit(kind) => true,
        StmtKind::FunctionDef(_) => false,
        StmtKind::For { orelse, .. } | StmtKind::While { orelse, .. } => {
            contains_own(orelse, hit)
        }
        StmtKind::If { body, orelse, .. } => contains_own(body, hit) || contains_own(orelse, hit),
        _ => false,
    })
}
