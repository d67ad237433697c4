//! List comprehension lowering.
//!
//! A list comprehension that is only ever iterated once where it is produced
//! does not need to materialize its list, so it becomes a generator
//! expression with the same element and clauses.

use crate::{
    analysis::{Analyses, AnalysisKind},
    ast::{ExprKind, Module},
    compiler::{pass::TreePass, passes::rewrite_exprs, CompilerContext, EventKind},
    Result,
};

/// Turns potential-iterator list comprehensions into generator expressions.
#[derive(Debug, Default)]
pub struct ListCompToGenexpPass;

impl ListCompToGenexpPass {
    /// Creates a new comprehension lowering pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TreePass for ListCompToGenexpPass {
    fn name(&self) -> &'static str {
        "listcomp-to-genexp"
    }

    fn description(&self) -> &'static str {
        "Lowers list comprehensions that are only iterated to generator expressions"
    }

    fn requires(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::PotentialIterators]
    }

    fn run(&self, module: &mut Module, analyses: &Analyses, ctx: &CompilerContext) -> Result<bool> {
        let iterators = analyses.potential_iterators()?;
        if iterators.is_empty() {
            return Ok(false);
        }

        Ok(rewrite_exprs(&mut module.body, None, &mut |expr, function| {
            if !iterators.contains(expr.id) || !matches!(expr.kind, ExprKind::ListComp { .. }) {
                return false;
            }
            expr.kind = match std::mem::replace(&mut expr.kind, ExprKind::Tuple(Vec::new())) {
                ExprKind::ListComp { elt, generators } => ExprKind::GeneratorExp { elt, generators },
                other => other,
            };
            ctx.events
                .record(EventKind::ComprehensionLowered)
                .at(function, expr.id)
                .message(format!("{expr}"));
            ctx.mark_changed(function);
            true
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{BinOp, Expr, Stmt},
        test::{apply, function_module, ret_function},
    };

    fn squares(iter: Expr) -> Expr {
        Expr::list_comp(
            Expr::binop(Expr::name("x"), BinOp::Mul, Expr::name("x")),
            "x",
            iter,
        )
    }

    #[test]
    fn test_consumed_comprehension_lowered() {
        let mut module = Module::new(vec![Stmt::function_def(
            "foo",
            &["n"],
            vec![Stmt::ret(Some(Expr::call_named("sum", vec![squares(Expr::name("n"))])))],
        )]);
        assert!(apply(&mut ListCompToGenexpPass::new(), &mut module).unwrap());
        assert_eq!(
            module.to_string(),
            "def foo(n):\n    return sum((x * x for x in n))\n"
        );
        assert!(!apply(&mut ListCompToGenexpPass::new(), &mut module).unwrap());
    }

    #[test]
    fn test_returned_comprehension_kept() {
        let mut module = ret_function(squares(Expr::name("n")));
        assert!(!apply(&mut ListCompToGenexpPass::new(), &mut module).unwrap());
    }

    #[test]
    fn test_stored_comprehension_kept() {
        // a = [x * x for x in n]; for y in a: print(y)
        let mut module = function_module(vec![
            Stmt::assign_name("a", squares(Expr::name("n"))),
            Stmt::for_loop(
                "y",
                Expr::name("a"),
                vec![Stmt::expr(Expr::call_named("print", vec![Expr::name("y")]))],
            ),
        ]);
        assert!(!apply(&mut ListCompToGenexpPass::new(), &mut module).unwrap());
    }
}
