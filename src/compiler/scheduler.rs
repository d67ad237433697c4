//! Pass scheduler for orchestrating tree pass execution.
//!
//! The `PassScheduler` runs the optimization passes in a phased pipeline.
//! Every phase runs to fixpoint with normalization after each change, and
//! the analyses a pass declares are recomputed whenever an earlier pass
//! changed the tree.

use std::sync::Arc;

use log::{trace, warn};

use crate::{
    analysis::{Analyses, AnalysisKind, AnalysisProvider, TreeAnalyzer},
    ast::Module,
    compiler::{
        config::OptimizerConfig,
        context::CompilerContext,
        events::EventKind,
        pass::TreePass,
        passes::{
            ConstantFoldingPass, DeadCodeEliminationPass, ForwardSubstitutionPass,
            IterTransformationPass, ListCompToGenexpPass, LoopUnrollingPass, Pow2Pass,
        },
    },
    Error, Result,
};

/// Computes analyses on demand and keeps them until the tree changes.
struct AnalysisCache {
    provider: Arc<dyn AnalysisProvider>,
    results: Analyses,
}

impl AnalysisCache {
    /// Returns a bundle holding exactly `kinds`, computing any that are stale.
    fn prepare(&mut self, kinds: &[AnalysisKind], module: &Module) -> Result<Analyses> {
        let mut bundle = Analyses::new();
        for &kind in kinds {
            let result = match self.results.shared(kind) {
                Some(result) => result,
                None => {
                    let result = self.provider.compute(kind, module)?;
                    if result.kind() != kind {
                        return Err(Error::AnalysisMismatch {
                            expected: kind,
                            found: result.kind(),
                        });
                    }
                    let result = Arc::new(result);
                    self.results.insert_shared(Arc::clone(&result));
                    result
                }
            };
            bundle.insert_shared(result);
        }
        Ok(bundle)
    }

    fn invalidate(&mut self) {
        self.results.clear();
    }
}

/// Pipeline stage a pass belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Folding, substitution and dead code elimination. Re-run after every
    /// change made by another phase.
    Normalize,
    /// Rewrites that grow the tree, followed by normalization.
    Expand,
    /// Peephole lowerings, followed by normalization.
    Lower,
}

/// Runs tree passes in three phases until the module stops changing.
///
/// One pipeline round is normalize, then expand, then lower. Expand and
/// lower each alternate with normalization until they have nothing left to
/// do. Rounds repeat until `stable_iterations` consecutive rounds change
/// nothing or `max_iterations` is reached.
///
/// Analyses come from the scheduler's [`AnalysisProvider`] and are reused
/// until some pass reports a change.
pub struct PassScheduler {
    max_iterations: usize,
    stable_iterations: usize,
    /// Bound on each inner fixpoint loop.
    max_phase_iterations: usize,
    cache: AnalysisCache,
    normalize: Vec<Box<dyn TreePass>>,
    expand: Vec<Box<dyn TreePass>>,
    lower: Vec<Box<dyn TreePass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(5, 2, 15)
    }
}

impl PassScheduler {
    /// An empty scheduler backed by a default [`TreeAnalyzer`].
    ///
    /// `max_iterations` bounds whole pipeline rounds, `stable_iterations` is
    /// the number of unchanged rounds that counts as converged and
    /// `max_phase_iterations` bounds each inner fixpoint loop.
    #[must_use]
    pub fn new(
        max_iterations: usize,
        stable_iterations: usize,
        max_phase_iterations: usize,
    ) -> Self {
        Self {
            max_iterations,
            stable_iterations,
            max_phase_iterations,
            cache: AnalysisCache {
                provider: Arc::new(TreeAnalyzer::default()),
                results: Analyses::new(),
            },
            normalize: Vec::new(),
            expand: Vec::new(),
            lower: Vec::new(),
        }
    }

    /// The pipeline [`Optimizer`](crate::Optimizer) runs: every pass the
    /// configuration enables, with analyses from `provider`.
    #[must_use]
    pub fn standard(config: &OptimizerConfig, provider: Arc<dyn AnalysisProvider>) -> Self {
        let mut scheduler = Self::new(
            config.max_iterations,
            config.stable_iterations,
            config.max_phase_iterations,
        )
        .with_provider(provider);

        if config.enable_constant_folding {
            scheduler.add(Phase::Normalize, Box::new(ConstantFoldingPass::new()));
        }
        if config.enable_forward_substitution {
            scheduler.add(Phase::Normalize, Box::new(ForwardSubstitutionPass::new()));
        }
        if config.enable_dead_code_elimination {
            scheduler.add(Phase::Normalize, Box::new(DeadCodeEliminationPass::new()));
        }
        if config.enable_loop_unrolling {
            scheduler.add(Phase::Expand, Box::new(LoopUnrollingPass::new()));
        }
        if config.enable_lowering {
            scheduler
                .add(Phase::Lower, Box::new(Pow2Pass::new()))
                .add(Phase::Lower, Box::new(ListCompToGenexpPass::new()))
                .add(Phase::Lower, Box::new(IterTransformationPass::new()));
        }
        scheduler
    }

    /// Swaps the analysis provider. Cached results are discarded.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn AnalysisProvider>) -> Self {
        self.cache = AnalysisCache {
            provider,
            results: Analyses::new(),
        };
        self
    }

    /// Appends `pass` to `phase`. Passes of one phase run in the order added.
    pub fn add(&mut self, phase: Phase, pass: Box<dyn TreePass>) -> &mut Self {
        match phase {
            Phase::Normalize => self.normalize.push(pass),
            Phase::Expand => self.expand.push(pass),
            Phase::Lower => self.lower.push(pass),
        }
        self
    }

    /// Pass names in pipeline order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.normalize
            .iter()
            .chain(&self.expand)
            .chain(&self.lower)
            .map(|pass| pass.name())
            .collect()
    }

    /// Runs `pass` once on its own, with the same initialize, analyses and
    /// finalize sequence it would get inside the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass or one of its analyses fails.
    pub fn apply_pass(
        &mut self,
        pass: &mut dyn TreePass,
        module: &mut Module,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        pass.initialize(ctx)?;
        let changed = Sweep::new(&mut self.cache, module, ctx, 1).step(pass)?;
        pass.finalize(ctx)?;
        Ok(changed)
    }

    /// Runs the pipeline over `module` and returns the number of rounds.
    ///
    /// Hitting `max_iterations` without converging is not an error. It is
    /// logged and recorded as a warning event.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass or an analysis.
    pub fn run_pipeline(&mut self, module: &mut Module, ctx: &CompilerContext) -> Result<usize> {
        let mut sweep = Sweep::new(&mut self.cache, module, ctx, self.max_phase_iterations);
        let mut rounds = 0;
        let mut quiet = 0;

        while rounds < self.max_iterations {
            rounds += 1;
            let mut changed = sweep.settle(&mut self.normalize)?;
            changed |= sweep.phase(&mut self.expand, &mut self.normalize)?;
            changed |= sweep.phase(&mut self.lower, &mut self.normalize)?;

            quiet = if changed { 0 } else { quiet + 1 };
            if quiet >= self.stable_iterations {
                return Ok(rounds);
            }
        }

        if self.max_iterations > 0 {
            warn!("pass pipeline stopped after {rounds} iterations without reaching a fixpoint");
            ctx.events.warn(format!(
                "iteration limit of {} reached before a fixpoint",
                self.max_iterations
            ));
        }
        Ok(rounds)
    }
}

/// Borrows needed to run passes over one module.
struct Sweep<'a> {
    cache: &'a mut AnalysisCache,
    module: &'a mut Module,
    ctx: &'a CompilerContext,
    limit: usize,
}

impl<'a> Sweep<'a> {
    fn new(
        cache: &'a mut AnalysisCache,
        module: &'a mut Module,
        ctx: &'a CompilerContext,
        limit: usize,
    ) -> Self {
        Self {
            cache,
            module,
            ctx,
            limit,
        }
    }

    /// One pass, given exactly the analyses it declares.
    fn step(&mut self, pass: &dyn TreePass) -> Result<bool> {
        if !pass.should_run(self.module, self.ctx) {
            return Ok(false);
        }

        let outcome = match self.cache.prepare(pass.requires(), self.module) {
            Ok(analyses) => {
                trace!("running pass {}", pass.name());
                pass.run(self.module, &analyses, self.ctx)
            }
            Err(err) => Err(err),
        };
        let changed = match outcome {
            Ok(changed) => changed,
            Err(err) => {
                self.ctx
                    .events
                    .error(format!("{} failed: {err}", pass.name()));
                return Err(err);
            }
        };
        if !changed {
            return Ok(false);
        }

        self.cache.invalidate();
        self.ctx
            .events
            .record(EventKind::PassCompleted)
            .pass(pass.name())
            .message(format!("{} changed the tree", pass.name()));
        Ok(true)
    }

    /// Every pass of a list once, in order.
    fn once(&mut self, passes: &mut [Box<dyn TreePass>]) -> Result<bool> {
        for pass in passes.iter_mut() {
            pass.initialize(self.ctx)?;
        }
        let mut changed = false;
        for pass in passes.iter() {
            changed |= self.step(pass.as_ref())?;
        }
        for pass in passes.iter_mut() {
            pass.finalize(self.ctx)?;
        }
        Ok(changed)
    }

    /// Repeats `passes` until a sweep changes nothing.
    fn settle(&mut self, passes: &mut [Box<dyn TreePass>]) -> Result<bool> {
        let mut changed = false;
        for _ in 0..self.limit {
            if !self.once(passes)? {
                break;
            }
            changed = true;
        }
        Ok(changed)
    }

    /// Alternates `passes` with normalization until `passes` change nothing.
    fn phase(
        &mut self,
        passes: &mut [Box<dyn TreePass>],
        normalize: &mut [Box<dyn TreePass>],
    ) -> Result<bool> {
        if passes.is_empty() {
            return Ok(false);
        }
        let mut changed = false;
        for _ in 0..self.limit {
            if !self.once(passes)? {
                break;
            }
            changed = true;
            self.settle(normalize)?;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use crate::{
        analysis::{Analyses, AnalysisKind, AnalysisProvider, AnalysisResult, SubtreeMetrics},
        ast::{Module, Stmt},
        compiler::{context::CompilerContext, pass::TreePass, EventKind, PassScheduler, Phase},
        Error, Result,
    };

    struct TestPass {
        name: &'static str,
        changes_to_make: AtomicUsize,
    }

    impl TestPass {
        fn new(name: &'static str, changes: usize) -> Self {
            Self {
                name,
                changes_to_make: AtomicUsize::new(changes),
            }
        }
    }

    impl TreePass for TestPass {
        fn name(&self) -> &'static str {
            self.name
        }

        fn requires(&self) -> &'static [AnalysisKind] {
            &[AnalysisKind::SubtreeMetrics]
        }

        fn run(
            &self,
            _module: &mut Module,
            analyses: &Analyses,
            ctx: &CompilerContext,
        ) -> Result<bool> {
            analyses.subtree_metrics()?;
            let remaining = self.changes_to_make.load(Ordering::Relaxed);
            if remaining == 0 {
                return Ok(false);
            }
            self.changes_to_make.store(remaining - 1, Ordering::Relaxed);
            ctx.events
                .record(EventKind::ConstantFolded)
                .function("test")
                .message("test");
            Ok(true)
        }
    }

    /// Counts how often each analysis is computed.
    #[derive(Default)]
    struct CountingProvider {
        computed: AtomicUsize,
    }

    impl AnalysisProvider for CountingProvider {
        fn compute(&self, _kind: AnalysisKind, _module: &Module) -> Result<AnalysisResult> {
            self.computed.fetch_add(1, Ordering::Relaxed);
            Ok(AnalysisResult::SubtreeMetrics(SubtreeMetrics))
        }
    }

    struct WrongKindProvider;

    impl AnalysisProvider for WrongKindProvider {
        fn compute(&self, _kind: AnalysisKind, module: &Module) -> Result<AnalysisResult> {
            Ok(AnalysisResult::Literals(crate::analysis::Literals::compute(
                module,
            )))
        }
    }

    #[test]
    fn test_scheduler_iteration_limits() {
        let scheduler = PassScheduler::new(10, 3, 5);
        assert_eq!(scheduler.max_iterations, 10);
        assert_eq!(scheduler.stable_iterations, 3);
        assert_eq!(scheduler.max_phase_iterations, 5);
    }

    #[test]
    fn test_default_scheduler() {
        let scheduler = PassScheduler::default();
        assert_eq!(scheduler.max_iterations, 5);
        assert_eq!(scheduler.stable_iterations, 2);
        assert_eq!(scheduler.max_phase_iterations, 15);
    }

    #[test]
    fn test_pass_names() {
        let mut scheduler = PassScheduler::default();
        scheduler
            .add(Phase::Lower, Box::new(TestPass::new("lowering", 0)))
            .add(Phase::Normalize, Box::new(TestPass::new("folding", 0)));
        assert_eq!(scheduler.pass_names(), vec!["folding", "lowering"]);
    }

    #[test]
    fn test_pipeline_runs_until_stable() {
        let provider = Arc::new(CountingProvider::default());
        let mut scheduler = PassScheduler::new(5, 2, 15).with_provider(provider.clone());
        scheduler.add(Phase::Normalize, Box::new(TestPass::new("pass1", 3)));

        let mut module = Module::new(vec![Stmt::pass()]);
        let ctx = CompilerContext::default();
        let iterations = scheduler.run_pipeline(&mut module, &ctx).unwrap();

        // one changing iteration, then two stable ones
        assert_eq!(iterations, 3);
        assert_eq!(ctx.events.count_kind(EventKind::ConstantFolded), 3);
        // recomputed after each of the three changes, plus the initial computation
        assert_eq!(provider.computed.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_wrong_kind_from_provider_is_fatal() {
        let mut scheduler = PassScheduler::default().with_provider(Arc::new(WrongKindProvider));
        let mut pass = TestPass::new("pass1", 1);
        let mut module = Module::new(vec![Stmt::pass()]);
        let ctx = CompilerContext::default();

        match scheduler.apply_pass(&mut pass, &mut module, &ctx) {
            Err(Error::AnalysisMismatch { expected, found }) => {
                assert_eq!(expected, AnalysisKind::SubtreeMetrics);
                assert_eq!(found, AnalysisKind::Literals);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(ctx.events.count_kind(EventKind::Error), 1);
        assert!(ctx
            .events
            .iter()
            .any(|event| event.message.starts_with("pass1 failed: analysis provider returned")));
    }
}
