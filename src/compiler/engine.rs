//! Main optimizer entry point.
//!
//! The [`Optimizer`] builds the standard pass pipeline for a configuration,
//! runs it over a module and packages what happened into an
//! [`OptimizeResult`].

use std::{sync::Arc, time::Duration};

use log::{debug, info};

use crate::{
    analysis::{AnalysisProvider, TreeAnalyzer},
    ast::Module,
    compiler::{
        config::OptimizerConfig,
        context::CompilerContext,
        events::{DerivedStats, EventLog},
        scheduler::PassScheduler,
    },
    eval::ModuleTable,
    Result,
};

/// Result of one optimizer run.
///
/// Statistics are derived from the event log on demand.
///
/// # Example
///
/// ```rust
/// use midend::prelude::*;
///
/// let mut module = Module::new(vec![Stmt::function_def(
///     "foo",
///     &[],
///     vec![Stmt::ret(Some(Expr::binop(Expr::int(2), BinOp::Mul, Expr::int(21))))],
/// )]);
/// let result = Optimizer::default().optimize(&mut module)?;
///
/// assert_eq!(result.stats().constants_folded, 1);
/// assert_eq!(result.changed_functions, vec!["foo".to_string()]);
/// println!("{}", result.summary());
/// # Ok::<(), midend::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct OptimizeResult {
    /// All events from the run.
    pub events: EventLog,
    /// Number of pipeline iterations.
    pub iterations: usize,
    /// Total processing time.
    pub total_time: Duration,
    /// Functions a pass rewrote, sorted. Top-level code is listed as
    /// [`MODULE_SCOPE`](crate::compiler::MODULE_SCOPE).
    pub changed_functions: Vec<String>,
}

impl OptimizeResult {
    /// Computes statistics derived from the event log.
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        DerivedStats::from_log(&self.events)
            .with_time(self.total_time)
            .with_iterations(self.iterations)
    }

    /// Generates a human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        self.stats().summary()
    }

    /// Returns `true` if any pass changed the module.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        !self.changed_functions.is_empty()
    }
}

/// The optimizer.
///
/// Holds a configuration, the builtin module table and optionally a custom
/// analysis provider. Each call to [`Optimizer::optimize`] builds a fresh
/// pipeline, so one optimizer can be reused for many modules.
#[derive(Clone)]
pub struct Optimizer {
    config: OptimizerConfig,
    table: Arc<ModuleTable>,
    provider: Option<Arc<dyn AnalysisProvider>>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field("config", &self.config)
            .field("custom_provider", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}

impl Optimizer {
    /// Creates an optimizer using the standard builtin table and the built-in
    /// [`TreeAnalyzer`].
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            table: Arc::new(ModuleTable::standard()),
            provider: None,
        }
    }

    /// Replaces the builtin module table.
    #[must_use]
    pub fn with_table(mut self, table: Arc<ModuleTable>) -> Self {
        self.table = table;
        self
    }

    /// Uses `provider` instead of the built-in analyzer.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn AnalysisProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimizes `module` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if a pass requests an analysis the provider cannot
    /// produce, if the provider returns the wrong kind of result, or if the
    /// module carries malformed metadata. The module may be partially
    /// rewritten when an error is returned.
    pub fn optimize(&self, module: &mut Module) -> Result<OptimizeResult> {
        let provider = self
            .provider
            .clone()
            .unwrap_or_else(|| Arc::new(TreeAnalyzer::new(self.table.clone())));
        let mut scheduler = PassScheduler::standard(&self.config, provider);
        debug!("optimizer pipeline: {}", scheduler.pass_names().join(", "));

        let ctx = CompilerContext::new(self.config.clone(), self.table.clone());
        let iterations = scheduler.run_pipeline(module, &ctx)?;

        let mut changed_functions: Vec<String> =
            ctx.changed_functions.iter().map(|name| name.key().clone()).collect();
        changed_functions.sort();

        let result = OptimizeResult {
            events: ctx.events.clone(),
            iterations,
            total_time: ctx.elapsed(),
            changed_functions,
        };
        info!("optimization complete: {}", result.summary());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{AnalysisKind, AnalysisResult},
        ast::{BinOp, Expr, Stmt},
        compiler::EventKind,
        test::function_module,
        Error,
    };

    struct EmptyProvider;

    impl AnalysisProvider for EmptyProvider {
        fn compute(&self, kind: AnalysisKind, _module: &Module) -> Result<AnalysisResult> {
            Err(Error::MissingAnalysis(kind))
        }
    }

    #[test]
    fn test_optimize_folds_and_reports() {
        let mut module = function_module(vec![Stmt::ret(Some(Expr::binop(
            Expr::int(1),
            BinOp::Add,
            Expr::int(3),
        )))]);
        let result = Optimizer::default().optimize(&mut module).unwrap();
        assert_eq!(module.to_string(), "def foo():\n    return 4\n");
        assert!(result.is_changed());
        assert!(result.events.has(EventKind::ConstantFolded));
        assert!(result.iterations >= 2);
    }

    #[test]
    fn test_optimize_nothing_to_do() {
        let mut module = function_module(vec![Stmt::ret(Some(Expr::int(4)))]);
        let result = Optimizer::default().optimize(&mut module).unwrap();
        assert!(!result.is_changed());
        assert_eq!(result.stats().constants_folded, 0);
    }

    #[test]
    fn test_disabled_passes_do_nothing() {
        let config = OptimizerConfig::default()
            .with_constant_folding(false)
            .with_forward_substitution(false)
            .with_dead_code_elimination(false)
            .with_loop_unrolling(false)
            .with_lowering(false);
        let mut module = function_module(vec![Stmt::ret(Some(Expr::binop(
            Expr::int(1),
            BinOp::Add,
            Expr::int(3),
        )))]);
        let before = module.to_string();
        let result = Optimizer::new(config).optimize(&mut module).unwrap();
        assert_eq!(module.to_string(), before);
        assert!(result.events.is_empty());
    }

    #[test]
    fn test_missing_analysis_is_fatal() {
        let mut module = function_module(vec![Stmt::ret(Some(Expr::int(4)))]);
        let optimizer = Optimizer::default().with_provider(Arc::new(EmptyProvider));
        let err = optimizer.optimize(&mut module).unwrap_err();
        assert!(matches!(err, Error::MissingAnalysis(AnalysisKind::ConstantExpressions)));
    }
}
