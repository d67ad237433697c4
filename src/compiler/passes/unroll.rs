//! Loop unrolling pass.
//!
//! Expands `for x in [a, b, ...]: body else: tail` into
//!
//! ```text
//! x = a
//! body
//! x = b
//! body
//! ...
//! tail
//! ```
//!
//! when the iterable is a list or tuple literal, the target is a plain name,
//! the body owns no `break` or `continue`, and the expansion stays within
//! [`OptimizerConfig::unroll_max_nodes`](crate::compiler::OptimizerConfig).
//! Elements must be pure and must not read anything the body stores, since
//! unrolling moves their evaluation from before the loop to each iteration.
//!
//! Loops carrying a parallelism directive or a no-transform marker are left
//! as written. A malformed directive aborts the pass.
//!
//! Inner loops are unrolled before the loops enclosing them.

use log::debug;

use crate::{
    analysis::{scope, Analyses, AnalysisKind, PureExpressions, SubtreeMetrics},
    ast::{deep_copy_block, ExprKind, Metadata, Module, Stmt, StmtKind},
    compiler::{pass::TreePass, CompilerContext, EventKind},
    Result,
};

/// Loop unrolling pass.
#[derive(Debug, Default)]
pub struct LoopUnrollingPass;

impl LoopUnrollingPass {
    /// Creates a new loop unrolling pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

struct Unroller<'a> {
    metrics: &'a SubtreeMetrics,
    pure: &'a PureExpressions,
    max_nodes: usize,
    ctx: &'a CompilerContext,
}

impl Unroller<'_> {
    fn block(
        &self,
        block: &mut Vec<Stmt>,
        metadata: &mut Metadata,
        function: Option<&str>,
    ) -> Result<bool> {
        let mut changed = false;
        let mut index = 0;
        while index < block.len() {
            let stmt = &mut block[index];
            if let StmtKind::FunctionDef(def) = &mut stmt.kind {
                changed |= self.block(&mut def.body, metadata, Some(&def.name))?;
                index += 1;
                continue;
            }
            for nested in stmt.blocks_mut() {
                changed |= self.block(nested, metadata, function)?;
            }

            match self.expand(stmt, metadata, function)? {
                Some(expanded) => {
                    let len = expanded.len();
                    block.splice(index..=index, expanded);
                    index += len;
                    changed = true;
                }
                None => index += 1,
            }
        }
        Ok(changed)
    }

    /// Returns the replacement statements, or `None` to keep the loop.
    fn expand(
        &self,
        stmt: &mut Stmt,
        metadata: &mut Metadata,
        function: Option<&str>,
    ) -> Result<Option<Vec<Stmt>>> {
        let StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } = &mut stmt.kind
        else {
            return Ok(None);
        };
        if metadata.blocks_transform(stmt.id)? {
            debug!("loop {} is annotated, not unrolling", stmt.id);
            return Ok(None);
        }
        let Some(name) = target.as_name().map(str::to_string) else {
            return Ok(None);
        };
        let (ExprKind::List(elts) | ExprKind::Tuple(elts)) = &mut iter.kind else {
            return Ok(None);
        };
        if self.metrics.has_break(body) || self.metrics.has_continue(body) {
            return Ok(None);
        }

        let mut stored = scope::stored_names(body);
        stored.insert(name.clone());
        let movable = elts.iter().all(|elt| {
            self.pure.contains(elt.id) && elt.free_names().iter().all(|n| !stored.contains(n))
        });
        if !movable {
            return Ok(None);
        }

        let size = self.metrics.node_count(body).saturating_mul(elts.len());
        if size > self.max_nodes {
            debug!("loop {} would grow to {size} nodes, not unrolling", stmt.id);
            self.ctx
                .events
                .record(EventKind::UnrollRejected)
                .at(function, stmt.id)
                .message(format!("{size} nodes exceed the limit of {}", self.max_nodes));
            return Ok(None);
        }

        let elts = std::mem::take(elts);
        let body = std::mem::take(body);
        let count = elts.len();
        let mut expanded = Vec::with_capacity(count * (body.len() + 1) + orelse.len());
        for elt in elts {
            expanded.push(Stmt::assign_name(name.clone(), elt));
            expanded.extend(deep_copy_block(&body, metadata));
        }
        expanded.append(orelse);
        if expanded.is_empty() {
            expanded.push(Stmt::pass());
        }

        self.ctx
            .events
            .record(EventKind::LoopUnrolled)
            .at(function, stmt.id)
            .message(format!("for {name} over {count} element(s)"));
        self.ctx.mark_changed(function);
        Ok(Some(expanded))
    }
}

fn contains_for(block: &[Stmt]) -> bool {
    block.iter().any(|stmt| {
        matches!(stmt.kind, StmtKind::For { .. }) || stmt.blocks().iter().any(|b| contains_for(b))
    })
}

impl TreePass for LoopUnrollingPass {
    fn name(&self) -> &'static str {
        "loop-unrolling"
    }

    fn description(&self) -> &'static str {
        "Expands loops over literal sequences into straight-line code"
    }

    fn requires(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::SubtreeMetrics, AnalysisKind::PureExpressions]
    }

    fn should_run(&self, module: &Module, ctx: &CompilerContext) -> bool {
        ctx.config.enable_loop_unrolling && contains_for(&module.body)
    }

    fn run(&self, module: &mut Module, analyses: &Analyses, ctx: &CompilerContext) -> Result<bool> {
        let unroller = Unroller {
            metrics: analyses.subtree_metrics()?,
            pure: analyses.pure_expressions()?,
            max_nodes: ctx.config.unroll_max_nodes,
            ctx,
        };
        unroller.block(&mut module.body, &mut module.metadata, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{Annotation, BinOp, Expr, OmpDirective},
        test::{apply, apply_with_context, function_module},
        Error,
    };

    fn unroll(module: &mut Module) -> bool {
        apply(&mut LoopUnrollingPass::new(), module).unwrap()
    }

    fn sum_loop(elts: Vec<Expr>) -> Stmt {
        Stmt::for_loop(
            "j",
            Expr::list(elts),
            vec![Stmt::aug_assign("i", BinOp::Add, Expr::name("j"))],
        )
    }

    #[test]
    fn test_unroll_literal_list() {
        let mut module = function_module(vec![
            Stmt::assign_name("i", Expr::int(0)),
            sum_loop(vec![Expr::int(1), Expr::int(2)]),
        ]);
        assert!(unroll(&mut module));
        assert_eq!(
            module.to_string(),
            "def foo():\n    i = 0\n    j = 1\n    i += j\n    j = 2\n    i += j\n"
        );
        assert!(!unroll(&mut module));
    }

    #[test]
    fn test_nested_loops_unrolled_inside_out() {
        let mut module = function_module(vec![Stmt::for_loop(
            "a",
            Expr::tuple(vec![Expr::int(1), Expr::int(2)]),
            vec![sum_loop(vec![Expr::int(3)])],
        )]);
        assert!(unroll(&mut module));
        assert_eq!(
            module.to_string(),
            "def foo():\n    a = 1\n    j = 3\n    i += j\n    a = 2\n    j = 3\n    i += j\n"
        );
    }

    #[test]
    fn test_else_block_runs_once() {
        let mut module = function_module(vec![Stmt::new(StmtKind::For {
            target: Expr::name("x"),
            iter: Expr::list(vec![]),
            body: vec![Stmt::expr(Expr::call_named("print", vec![Expr::name("x")]))],
            orelse: vec![Stmt::ret(Some(Expr::int(0)))],
        })]);
        assert!(unroll(&mut module));
        assert_eq!(module.to_string(), "def foo():\n    return 0\n");
    }

    #[test]
    fn test_break_and_non_literal_kept() {
        let mut module = Module::new(vec![Stmt::function_def(
            "foo",
            &["xs"],
            vec![
                Stmt::for_loop("x", Expr::list(vec![Expr::int(1)]), vec![Stmt::break_()]),
                Stmt::for_loop("y", Expr::name("xs"), vec![Stmt::pass()]),
            ],
        )]);
        assert!(!unroll(&mut module));
    }

    #[test]
    fn test_element_reading_stored_name_kept() {
        // for j in [i, 1]: i += j
        let mut module = function_module(vec![sum_loop(vec![Expr::name("i"), Expr::int(1)])]);
        assert!(!unroll(&mut module));
    }

    #[test]
    fn test_size_limit() {
        // 100 body nodes over 10 elements
        let big = Stmt::expr(Expr::list((0..98).map(Expr::int).collect()));
        let mut module = function_module(vec![Stmt::for_loop(
            "x",
            Expr::list((0..10).map(Expr::int).collect()),
            vec![big],
        )]);
        let ctx = CompilerContext::default();
        assert!(!apply_with_context(&mut LoopUnrollingPass::new(), &mut module, &ctx).unwrap());
        assert_eq!(ctx.events.count_kind(EventKind::UnrollRejected), 1);

        // 64 body nodes over 8 elements is exactly at the limit
        let fits = Stmt::expr(Expr::list((0..62).map(Expr::int).collect()));
        let mut module = function_module(vec![Stmt::for_loop(
            "x",
            Expr::list((0..8).map(Expr::int).collect()),
            vec![fits],
        )]);
        assert!(unroll(&mut module));
    }

    #[test]
    fn test_annotated_loop_kept() {
        let mut module = function_module(vec![sum_loop(vec![Expr::int(1)])]);
        let loop_id = module.body[0].as_function().unwrap().body[0].id;
        module.metadata.add(loop_id, Annotation::NoTransform);
        assert!(!unroll(&mut module));

        let mut module = function_module(vec![sum_loop(vec![Expr::int(1)])]);
        let loop_id = module.body[0].as_function().unwrap().body[0].id;
        module
            .metadata
            .add(loop_id, Annotation::Omp(OmpDirective::new("omp parallel for")));
        assert!(!unroll(&mut module));
    }

    #[test]
    fn test_malformed_directive_is_fatal() {
        let mut module = function_module(vec![sum_loop(vec![Expr::int(1)])]);
        let loop_id = module.body[0].as_function().unwrap().body[0].id;
        module
            .metadata
            .add(loop_id, Annotation::Omp(OmpDirective::new("parallel")));
        let result = apply(&mut LoopUnrollingPass::new(), &mut module);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }
}
