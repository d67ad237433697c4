//! Dead code elimination pass.
//!
//! Inside functions, drops assignment targets whose variable is never read.
//! An assignment left without targets becomes `pass` when its value is pure,
//! and an expression statement otherwise, so the side effects survive.
//! Anywhere in the module, an expression statement whose value is pure is
//! replaced by `pass`.

use crate::{
    analysis::{Analyses, AnalysisKind, FunctionChains, PureExpressions},
    ast::{Expr, Module, Stmt, StmtKind},
    compiler::{pass::TreePass, CompilerContext, EventKind},
    Result,
};

/// Dead code elimination pass.
#[derive(Debug, Default)]
pub struct DeadCodeEliminationPass;

impl DeadCodeEliminationPass {
    /// Creates a new dead code elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

struct Eliminator<'a> {
    pure: &'a PureExpressions,
    ctx: &'a CompilerContext,
}

impl Eliminator<'_> {
    fn block(&self, block: &mut [Stmt], chains: Option<&FunctionChains>, function: Option<&str>) -> bool {
        let mut changed = false;
        for stmt in block.iter_mut() {
            changed |= self.stmt(stmt, chains, function);
        }
        changed
    }

    fn stmt(&self, stmt: &mut Stmt, chains: Option<&FunctionChains>, function: Option<&str>) -> bool {
        let mut changed = false;
        match &mut stmt.kind {
            StmtKind::FunctionDef(_) => return false,
            StmtKind::Assign { targets, value } => {
                let Some(chains) = chains else {
                    return false;
                };
                let before = targets.len();
                targets.retain(|target| {
                    let unused = target
                        .as_name()
                        .and_then(|name| chains.chain(name))
                        .is_some_and(|chain| !chain.is_used());
                    if unused {
                        self.ctx
                            .events
                            .record(EventKind::TargetRemoved)
                            .at(function, target.id)
                            .message(format!("{target} is never read"));
                    }
                    !unused
                });
                if targets.len() == before {
                    return false;
                }
                if targets.is_empty() {
                    let value = std::mem::replace(value, Expr::int(0));
                    stmt.kind = if self.pure.contains(value.id) {
                        StmtKind::Pass
                    } else {
                        StmtKind::Expr(value)
                    };
                }
                changed = true;
            }
            StmtKind::Expr(value) if self.pure.contains(value.id) && !value.is_yield() => {
                self.ctx
                    .events
                    .record(EventKind::StatementRemoved)
                    .at(function, stmt.id)
                    .message(format!("{value} has no effect"));
                stmt.kind = StmtKind::Pass;
                changed = true;
            }
            _ => {}
        }

        for nested in stmt.blocks_mut() {
            changed |= self.block(nested, chains, function);
        }
        if changed {
            self.ctx.mark_changed(function);
        }
        changed
    }
}

impl TreePass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn description(&self) -> &'static str {
        "Removes unread assignment targets and expression statements without effect"
    }

    fn requires(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::UseDefChains, AnalysisKind::PureExpressions]
    }

    fn run(&self, module: &mut Module, analyses: &Analyses, ctx: &CompilerContext) -> Result<bool> {
        let chains = analyses.use_def_chains()?;
        let eliminator = Eliminator {
            pure: analyses.pure_expressions()?,
            ctx,
        };

        let mut changed = false;
        for stmt in &mut module.body {
            let id = stmt.id;
            if let StmtKind::FunctionDef(def) = &mut stmt.kind {
                changed |= eliminator.block(&mut def.body, chains.function(id), Some(&def.name));
            } else {
                changed |= eliminator.stmt(stmt, None, None);
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::BinOp,
        test::{apply, apply_with_context, function_module},
    };

    fn eliminate(module: &mut Module) -> bool {
        apply(&mut DeadCodeEliminationPass::new(), module).unwrap()
    }

    #[test]
    fn test_unused_pure_assignment_removed() {
        let mut module = function_module(vec![
            Stmt::assign_name("a", Expr::list(vec![Expr::int(2), Expr::int(3)])),
            Stmt::ret(Some(Expr::int(1))),
        ]);
        assert!(eliminate(&mut module));
        assert_eq!(module.to_string(), "def foo():\n    pass\n    return 1\n");
        assert!(!eliminate(&mut module));
    }

    #[test]
    fn test_impure_value_kept_as_expression() {
        let mut module = function_module(vec![
            Stmt::assign_name("a", Expr::call_named("print", vec![Expr::int(1)])),
            Stmt::ret(Some(Expr::int(1))),
        ]);
        assert!(eliminate(&mut module));
        assert_eq!(
            module.to_string(),
            "def foo():\n    print(1)\n    return 1\n"
        );
    }

    #[test]
    fn test_used_and_non_name_targets_kept() {
        // a = b = [0]; a[0] = 1; return a
        let mut module = function_module(vec![
            Stmt::assign(
                vec![Expr::name("a"), Expr::name("b")],
                Expr::list(vec![Expr::int(0)]),
            ),
            Stmt::assign(
                vec![Expr::subscript(Expr::name("a"), Expr::int(0))],
                Expr::int(1),
            ),
            Stmt::ret(Some(Expr::name("a"))),
        ]);
        assert!(eliminate(&mut module));
        assert_eq!(
            module.to_string(),
            "def foo():\n    a = [0]\n    a[0] = 1\n    return a\n"
        );
    }

    #[test]
    fn test_pure_expression_statement_removed_everywhere() {
        let mut module = Module::new(vec![
            Stmt::expr(Expr::binop(Expr::int(1), BinOp::Add, Expr::int(2))),
            Stmt::function_def(
                "foo",
                &[],
                vec![Stmt::if_else(
                    Expr::bool(true),
                    vec![Stmt::expr(Expr::int(3))],
                    vec![],
                )],
            ),
        ]);
        let ctx = CompilerContext::default();
        assert!(apply_with_context(&mut DeadCodeEliminationPass::new(), &mut module, &ctx).unwrap());
        assert_eq!(
            module.to_string(),
            "pass\ndef foo():\n    if True:\n        pass\n"
        );
        assert_eq!(ctx.events.count_kind(EventKind::StatementRemoved), 2);
        assert!(ctx.is_changed("foo"));
    }

    #[test]
    fn test_yield_statement_kept() {
        let mut module = function_module(vec![Stmt::expr(Expr::yield_(Some(Expr::int(1))))]);
        assert!(!eliminate(&mut module));
    }
}
