//! Constant folding pass.
//!
//! Replaces every expression flagged by the constant expression analysis with
//! a literal for its value.
//!
//! # Algorithm
//!
//! 1. Prepare an [`Environment`] from the module: top-level functions become
//!    callable, side-effect-free top-level assignments bind globals
//! 2. Walk every expression top-down
//! 3. For a flagged node, evaluate it in isolation and convert the value back
//!    into a literal node
//! 4. If evaluation or conversion fails, keep the node and descend into its
//!    children, so smaller constant parts can still fold
//!
//! Failures are never fatal. Folded literals are never flagged again, which
//! makes a second run over the output a no-op.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::{
    analysis::{Analyses, AnalysisKind, ConstantExpressions},
    ast::{Expr, FunctionDef, Module, Stmt, StmtKind},
    compiler::{pass::TreePass, CompilerContext, EventKind},
    eval::{to_node, Environment, EvalLimits, Evaluator},
    Result,
};

/// Constant folding pass.
///
/// Evaluation settings are taken from the configuration when the pass is
/// initialized. Expressions the evaluator gives up on are counted and
/// reported as one note when the pass is finalized.
#[derive(Debug, Default)]
pub struct ConstantFoldingPass {
    /// Evaluator limits and container cap, set by `initialize`
    settings: Option<(EvalLimits, usize)>,
    given_up: AtomicUsize,
}

impl ConstantFoldingPass {
    /// Creates a new constant folding pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything one traversal needs, bundled to keep signatures short.
struct Folder<'a> {
    constants: &'a ConstantExpressions,
    env: &'a Environment,
    limits: EvalLimits,
    max_len: usize,
    given_up: &'a AtomicUsize,
    ctx: &'a CompilerContext,
}

impl Folder<'_> {
    fn block(&self, block: &mut [Stmt], function: Option<&str>) -> bool {
        let mut changed = false;
        for stmt in block.iter_mut() {
            if let StmtKind::FunctionDef(FunctionDef { name, body, .. }) = &mut stmt.kind {
                changed |= self.block(body, Some(name.as_str()));
                continue;
            }
            for expr in stmt.exprs_mut() {
                changed |= self.expr(expr, function);
            }
            for nested in stmt.blocks_mut() {
                changed |= self.block(nested, function);
            }
        }
        changed
    }

    fn expr(&self, expr: &mut Expr, function: Option<&str>) -> bool {
        if self.constants.contains(expr.id) {
            match self.fold(expr) {
                Ok(literal) => {
                    self.ctx
                        .events
                        .record(EventKind::ConstantFolded)
                        .at(function, expr.id)
                        .message(format!("{expr} -> {literal}"));
                    self.ctx.mark_changed(function);
                    *expr = literal;
                    return true;
                }
                Err(reason) => {
                    debug!("not folding `{expr}`: {reason}");
                    self.given_up.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let mut changed = false;
        for child in expr.children_mut() {
            changed |= self.expr(child, function);
        }
        changed
    }

    fn fold(&self, expr: &Expr) -> std::result::Result<Expr, String> {
        let value = Evaluator::new(self.env, self.limits)
            .eval(expr)
            .map_err(|e| e.to_string())?;
        to_node(&value, self.max_len).map_err(|e| e.to_string())
    }
}

impl TreePass for ConstantFoldingPass {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn description(&self) -> &'static str {
        "Evaluates constant expressions at compile time and replaces them with literals"
    }

    fn requires(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::ConstantExpressions]
    }

    fn initialize(&mut self, ctx: &CompilerContext) -> Result<()> {
        self.settings = Some((ctx.config.eval_limits, ctx.config.fold_max_len));
        self.given_up.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn finalize(&mut self, ctx: &CompilerContext) -> Result<()> {
        let given_up = self.given_up.swap(0, Ordering::Relaxed);
        if given_up > 0 {
            ctx.events
                .info(format!("{given_up} constant expressions left unfolded"));
        }
        self.settings = None;
        Ok(())
    }

    fn run(&self, module: &mut Module, analyses: &Analyses, ctx: &CompilerContext) -> Result<bool> {
        let constants = analyses.constant_expressions()?;
        if constants.is_empty() {
            return Ok(false);
        }

        let (limits, max_len) = self
            .settings
            .unwrap_or((ctx.config.eval_limits, ctx.config.fold_max_len));
        // the environment mirrors the module as it is now, so it cannot be
        // built ahead of the run
        let env = Environment::prepare(module, ctx.table.clone(), limits);
        let folder = Folder {
            constants,
            env: &env,
            limits,
            max_len,
            given_up: &self.given_up,
            ctx,
        };
        Ok(folder.block(&mut module.body, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{BinOp, Expr},
        compiler::OptimizerConfig,
        eval::ModuleTable,
        test::{apply, apply_with_context, ret_function},
    };

    #[test]
    fn test_fold_binop() {
        let mut module = ret_function(Expr::binop(Expr::int(1), BinOp::Add, Expr::int(3)));
        assert!(apply(&mut ConstantFoldingPass::new(), &mut module).unwrap());
        assert_eq!(module.to_string(), "def foo():\n    return 4\n");
    }

    #[test]
    fn test_fold_is_idempotent() {
        let mut module = ret_function(Expr::call_named(
            "sorted",
            vec![Expr::list(vec![Expr::int(3), Expr::int(1), Expr::int(2)])],
        ));
        assert!(apply(&mut ConstantFoldingPass::new(), &mut module).unwrap());
        let once = module.to_string();
        assert_eq!(once, "def foo():\n    return [1, 2, 3]\n");

        assert!(!apply(&mut ConstantFoldingPass::new(), &mut module).unwrap());
        assert_eq!(module.to_string(), once);
    }

    #[test]
    fn test_failed_fold_descends_into_children() {
        // 1 / 0 cannot fold, but its sibling 2 * 3 can
        let mut module = ret_function(Expr::tuple(vec![
            Expr::binop(Expr::int(1), BinOp::Div, Expr::int(0)),
            Expr::binop(Expr::int(2), BinOp::Mul, Expr::int(3)),
        ]));
        assert!(apply(&mut ConstantFoldingPass::new(), &mut module).unwrap());
        assert_eq!(module.to_string(), "def foo():\n    return (1 / 0, 6)\n");
    }

    #[test]
    fn test_oversized_container_stays_unfolded() {
        let mut module = ret_function(Expr::call_named("range", vec![Expr::int(256)]));
        let before = module.to_string();
        assert!(!apply(&mut ConstantFoldingPass::new(), &mut module).unwrap());
        assert_eq!(module.to_string(), before);

        let mut small = ret_function(Expr::call_named("range", vec![Expr::int(3)]));
        assert!(apply(&mut ConstantFoldingPass::new(), &mut small).unwrap());
        assert_eq!(small.to_string(), "def foo():\n    return [0, 1, 2]\n");
    }

    #[test]
    fn test_user_function_and_global() {
        // K = 10
        // def sq(x): return x * x
        // def foo(): return sq(K) + 1
        let mut module = Module::new(vec![
            Stmt::assign_name("K", Expr::int(10)),
            Stmt::function_def(
                "sq",
                &["x"],
                vec![Stmt::ret(Some(Expr::binop(
                    Expr::name("x"),
                    BinOp::Mul,
                    Expr::name("x"),
                )))],
            ),
            Stmt::function_def(
                "foo",
                &[],
                vec![Stmt::ret(Some(Expr::binop(
                    Expr::call_named("sq", vec![Expr::name("K")]),
                    BinOp::Add,
                    Expr::int(1),
                )))],
            ),
        ]);
        assert!(apply(&mut ConstantFoldingPass::new(), &mut module).unwrap());
        assert!(module.to_string().ends_with("def foo():\n    return 101\n"));
    }

    #[test]
    fn test_unfoldable_expressions_reported_on_finalize() {
        let mut module = ret_function(Expr::call_named("range", vec![Expr::int(300)]));
        let ctx = CompilerContext::default();
        apply_with_context(&mut ConstantFoldingPass::new(), &mut module, &ctx).unwrap();

        let notes: Vec<&str> = ctx
            .events
            .iter()
            .filter(|event| event.kind == EventKind::Info)
            .map(|event| event.message.as_str())
            .collect();
        assert_eq!(notes, vec!["1 constant expressions left unfolded"]);
    }

    #[test]
    fn test_container_cap_taken_from_config() {
        let mut module = ret_function(Expr::call_named("range", vec![Expr::int(3)]));
        let config = OptimizerConfig::default().with_fold_max_len(3);
        let ctx = CompilerContext::new(config, ModuleTable::standard().into());
        assert!(!apply_with_context(&mut ConstantFoldingPass::new(), &mut module, &ctx).unwrap());
        assert_eq!(ctx.events.count_kind(EventKind::Info), 1);
    }
}
