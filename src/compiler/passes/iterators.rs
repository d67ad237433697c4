//! `range` to `xrange` lowering.
//!
//! A `range(...)` call that is a potential iterator never needs its list, so
//! it becomes a call to the lazy `__builtin__.xrange`. Only calls that really
//! resolve to the builtin are touched: a local or global named `range`
//! shadows it.

use std::collections::BTreeSet;

use crate::{
    analysis::{
        scope::{self, Callee, Resolver},
        Analyses, AnalysisKind, PotentialIterators,
    },
    ast::{Expr, ExprKind, Module, StmtKind},
    compiler::{pass::TreePass, passes::rewrite_exprs, CompilerContext, EventKind},
    Result,
};

/// Lowers iterated `range` calls to `xrange`.
#[derive(Debug, Default)]
pub struct IterTransformationPass;

impl IterTransformationPass {
    /// Creates a new iterator lowering pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn lower(
    expr: &mut Expr,
    function: Option<&str>,
    resolver: &Resolver<'_>,
    iterators: &PotentialIterators,
    ctx: &CompilerContext,
) -> bool {
    if !iterators.contains(expr.id) {
        return false;
    }
    let ExprKind::Call { func, .. } = &mut expr.kind else {
        return false;
    };
    if resolver.callee(func) != Callee::Builtin("range") {
        return false;
    }
    **func = Expr::builtin("xrange");
    ctx.events
        .record(EventKind::IteratorLowered)
        .at(function, expr.id)
        .message(format!("{expr}"));
    ctx.mark_changed(function);
    true
}

impl TreePass for IterTransformationPass {
    fn name(&self) -> &'static str {
        "iter-transformation"
    }

    fn description(&self) -> &'static str {
        "Lowers iterated range calls to xrange"
    }

    fn requires(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::PotentialIterators]
    }

    fn run(&self, module: &mut Module, analyses: &Analyses, ctx: &CompilerContext) -> Result<bool> {
        let iterators = analyses.potential_iterators()?;
        if iterators.is_empty() {
            return Ok(false);
        }

        let table = ctx.table.as_ref();
        let names: BTreeSet<String> = scope::function_names(module);
        let module_stored = scope::stored_names(&module.body);
        let top_level = Resolver::module(table, &names, &module_stored);

        let mut changed = false;
        for stmt in &mut module.body {
            if let StmtKind::FunctionDef(def) = &mut stmt.kind {
                let resolver = Resolver::function(table, &names, &module_stored, def);
                changed |= rewrite_exprs(&mut def.body, Some(&def.name), &mut |expr, function| {
                    lower(expr, function, &resolver, iterators, ctx)
                });
            } else {
                changed |= rewrite_exprs(std::slice::from_mut(stmt), None, &mut |expr, function| {
                    lower(expr, function, &top_level, iterators, ctx)
                });
            }
        }
        Ok(changed)
    }
}
