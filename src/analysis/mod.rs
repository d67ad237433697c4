//! Static analyses consumed by the optimization passes.
//!
//! Every analysis is a pure function of an immutable tree snapshot. The
//! scheduler computes the kinds a pass declares, hands them over in an
//! [`Analyses`] bundle and throws them away as soon as any pass changes the
//! tree. Nothing in here mutates the tree or a previously computed result.
//!
//! # Architecture
//!
//! - [`ConstantExpressions`] - closed, pure and evaluable subtrees
//! - [`UseDefChains`] - per-function reaching-definition graphs
//! - [`Laziness`] - how often a definition's value is consumed
//! - [`PureExpressions`] - subtrees without observable side effects
//! - [`Literals`] - variables bound only to immutable literals
//! - [`SubtreeMetrics`] - node counts and loop-control predicates
//! - [`PotentialIterators`] - values iterated exactly once where produced
//!
//! An embedding compiler that already has some of these facts can implement
//! [`AnalysisProvider`] and feed them in instead of [`TreeAnalyzer`].
//!
//! # Usage
//!
//! ```rust
//! use midend::analysis::{AnalysisKind, AnalysisProvider, TreeAnalyzer};
//! use midend::ast::{BinOp, Expr, Module, Stmt};
//!
//! let sum = Expr::binop(Expr::int(1), BinOp::Add, Expr::int(3));
//! let id = sum.id;
//! let module = Module::new(vec![Stmt::function_def("foo", &[], vec![Stmt::ret(Some(sum))])]);
//!
//! let analyzer = TreeAnalyzer::default();
//! let facts = analyzer.compute(AnalysisKind::ConstantExpressions, &module)?;
//! assert_eq!(facts.kind(), AnalysisKind::ConstantExpressions);
//! # Ok::<(), midend::Error>(())
//! ```

mod constants;
mod iterators;
mod laziness;
mod literals;
mod metrics;
mod purity;
pub(crate) mod scope;
mod usedef;

use std::{collections::BTreeMap, sync::Arc};

use strum::{Display, EnumIter};

use crate::{ast::Module, eval::ModuleTable, Error, Result};

pub use constants::ConstantExpressions;
pub use iterators::PotentialIterators;
pub use laziness::{Laziness, Lazy};
pub use literals::Literals;
pub use metrics::SubtreeMetrics;
pub use purity::PureExpressions;
pub use usedef::{Action, FunctionChains, Occurrence, UseDefChain, UseDefChains};

/// Identifies one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum AnalysisKind {
    /// [`ConstantExpressions`]
    ConstantExpressions,
    /// [`UseDefChains`]
    UseDefChains,
    /// [`Laziness`]
    Laziness,
    /// [`PureExpressions`]
    PureExpressions,
    /// [`Literals`]
    Literals,
    /// [`SubtreeMetrics`]
    SubtreeMetrics,
    /// [`PotentialIterators`]
    PotentialIterators,
}

/// A computed fact table of any kind.
#[derive(Debug, Clone)]
pub enum AnalysisResult {
    /// Constant expression set
    ConstantExpressions(ConstantExpressions),
    /// Use-def chains
    UseDefChains(UseDefChains),
    /// Laziness metric
    Laziness(Laziness),
    /// Pure expression set
    PureExpressions(PureExpressions),
    /// Literal-bound variables
    Literals(Literals),
    /// Structural metrics
    SubtreeMetrics(SubtreeMetrics),
    /// Potential iterator set
    PotentialIterators(PotentialIterators),
}

impl AnalysisResult {
    /// The kind of fact table this is.
    #[must_use]
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisResult::ConstantExpressions(_) => AnalysisKind::ConstantExpressions,
            AnalysisResult::UseDefChains(_) => AnalysisKind::UseDefChains,
            AnalysisResult::Laziness(_) => AnalysisKind::Laziness,
            AnalysisResult::PureExpressions(_) => AnalysisKind::PureExpressions,
            AnalysisResult::Literals(_) => AnalysisKind::Literals,
            AnalysisResult::SubtreeMetrics(_) => AnalysisKind::SubtreeMetrics,
            AnalysisResult::PotentialIterators(_) => AnalysisKind::PotentialIterators,
        }
    }
}

/// Computes analyses for a module.
///
/// Implementations must be deterministic for a given tree and must never
/// return a result of a different kind than requested; the scheduler rejects
/// such a result with [`Error::AnalysisMismatch`].
pub trait AnalysisProvider: Send + Sync {
    /// Computes the fact table of `kind` for `module`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be analyzed.
    fn compute(&self, kind: AnalysisKind, module: &Module) -> Result<AnalysisResult>;
}

/// The reference analyzer, computing every kind directly from the tree.
#[derive(Debug, Clone)]
pub struct TreeAnalyzer {
    table: Arc<ModuleTable>,
}

impl TreeAnalyzer {
    /// Creates an analyzer resolving builtins against `table`.
    #[must_use]
    pub fn new(table: Arc<ModuleTable>) -> Self {
        TreeAnalyzer { table }
    }
}

impl Default for TreeAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(ModuleTable::standard()))
    }
}

impl AnalysisProvider for TreeAnalyzer {
    fn compute(&self, kind: AnalysisKind, module: &Module) -> Result<AnalysisResult> {
        let table = self.table.as_ref();
        Ok(match kind {
            AnalysisKind::ConstantExpressions => {
                AnalysisResult::ConstantExpressions(ConstantExpressions::compute(module, table))
            }
            AnalysisKind::UseDefChains => {
                AnalysisResult::UseDefChains(UseDefChains::compute(module)?)
            }
            AnalysisKind::Laziness => AnalysisResult::Laziness(Laziness::compute(module, table)),
            AnalysisKind::PureExpressions => {
                AnalysisResult::PureExpressions(PureExpressions::compute(module, table))
            }
            AnalysisKind::Literals => AnalysisResult::Literals(Literals::compute(module)),
            AnalysisKind::SubtreeMetrics => AnalysisResult::SubtreeMetrics(SubtreeMetrics),
            AnalysisKind::PotentialIterators => {
                AnalysisResult::PotentialIterators(PotentialIterators::compute(module, table))
            }
        })
    }
}

/// The fact tables handed to one pass invocation.
///
/// Results are shared behind [`Arc`] so the scheduler can keep its cache and
/// hand out subsets without copying. Asking for a kind that is not present is
/// a pipeline bug and fails with [`Error::MissingAnalysis`].
#[derive(Debug, Clone, Default)]
pub struct Analyses {
    results: BTreeMap<AnalysisKind, Arc<AnalysisResult>>,
}

macro_rules! typed_accessor {
    ($(#[$doc:meta])* $fn_name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        ///
        /// # Errors
        ///
        /// Returns [`Error::MissingAnalysis`] if the kind was not computed.
        pub fn $fn_name(&self) -> Result<&$ty> {
            match self.results.get(&AnalysisKind::$variant).map(Arc::as_ref) {
                Some(AnalysisResult::$variant(facts)) => Ok(facts),
                Some(other) => Err(Error::AnalysisMismatch {
                    expected: AnalysisKind::$variant,
                    found: other.kind(),
                }),
                None => Err(Error::MissingAnalysis(AnalysisKind::$variant)),
            }
        }
    };
}

impl Analyses {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a result under its own kind, replacing any previous one.
    pub fn insert(&mut self, result: AnalysisResult) {
        self.results.insert(result.kind(), Arc::new(result));
    }

    /// Adds an already shared result.
    pub(crate) fn insert_shared(&mut self, result: Arc<AnalysisResult>) {
        self.results.insert(result.kind(), result);
    }

    /// Returns `true` if `kind` is present.
    #[must_use]
    pub fn contains(&self, kind: AnalysisKind) -> bool {
        self.results.contains_key(&kind)
    }

    /// The shared result for `kind`, if present.
    pub(crate) fn shared(&self, kind: AnalysisKind) -> Option<Arc<AnalysisResult>> {
        self.results.get(&kind).cloned()
    }

    /// Drops every result.
    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Number of results present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if no result is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    typed_accessor!(
        /// The constant expression set.
        constant_expressions,
        ConstantExpressions,
        ConstantExpressions
    );
    typed_accessor!(
        /// The use-def chains.
        use_def_chains,
        UseDefChains,
        UseDefChains
    );
    typed_accessor!(
        /// The laziness metric.
        laziness,
        Laziness,
        Laziness
    );
    typed_accessor!(
        /// The pure expression set.
        pure_expressions,
        PureExpressions,
        PureExpressions
    );
    typed_accessor!(
        /// The literal-bound variables.
        literals,
        Literals,
        Literals
    );
    typed_accessor!(
        /// The structural metrics.
        subtree_metrics,
        SubtreeMetrics,
        SubtreeMetrics
    );
    typed_accessor!(
        /// The potential iterator set.
        potential_iterators,
        PotentialIterators,
        PotentialIterators
    );
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::ast::Stmt;

    #[test]
    fn test_missing_analysis_names_kind() {
        let analyses = Analyses::new();
        match analyses.laziness() {
            Err(Error::MissingAnalysis(kind)) => assert_eq!(kind, AnalysisKind::Laziness),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_analyzer_computes_every_kind() {
        let module = Module::new(vec![Stmt::function_def("f", &[], vec![Stmt::pass()])]);
        let analyzer = TreeAnalyzer::default();
        let mut analyses = Analyses::new();
        for kind in AnalysisKind::iter() {
            let result = analyzer.compute(kind, &module).unwrap();
            assert_eq!(result.kind(), kind);
            analyses.insert(result);
        }
        assert_eq!(analyses.len(), AnalysisKind::iter().count());
        assert!(analyses.use_def_chains().is_ok());
        assert!(analyses.subtree_metrics().is_ok());

        analyses.clear();
        assert!(analyses.is_empty());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(AnalysisKind::UseDefChains.to_string(), "UseDefChains");
    }
}
