//! Configuration for the optimizer.
//!
//! [`OptimizerConfig`] controls the scheduler's iteration limits, which passes
//! take part in the pipeline, and the resource bounds of constant folding and
//! loop unrolling.

use crate::eval::{EvalLimits, MAX_LEN};

/// Default node-count ceiling for fully unrolling one loop.
pub const UNROLL_MAX_NODES: usize = 512;

/// Configuration for the optimization pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Maximum iterations of the whole pipeline (default: 5).
    pub max_iterations: usize,

    /// Number of unchanged pipeline iterations before stopping (default: 2).
    pub stable_iterations: usize,

    /// Maximum iterations of one phase before moving on (default: 15).
    pub max_phase_iterations: usize,

    /// Enable constant folding.
    pub enable_constant_folding: bool,

    /// Enable forward substitution.
    pub enable_forward_substitution: bool,

    /// Enable dead code elimination.
    pub enable_dead_code_elimination: bool,

    /// Enable full loop unrolling.
    pub enable_loop_unrolling: bool,

    /// Enable the lowering phase: `pow2`, generator expressions and `xrange`.
    pub enable_lowering: bool,

    /// Folded containers must hold fewer elements than this (default: 256).
    pub fold_max_len: usize,

    /// Largest `body_nodes * elements` product a loop may unroll to (default: 512).
    pub unroll_max_nodes: usize,

    /// Resource bounds for each compile-time evaluation.
    pub eval_limits: EvalLimits,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            stable_iterations: 2,
            max_phase_iterations: 15,
            enable_constant_folding: true,
            enable_forward_substitution: true,
            enable_dead_code_elimination: true,
            enable_loop_unrolling: true,
            enable_lowering: true,
            fold_max_len: MAX_LEN,
            unroll_max_nodes: UNROLL_MAX_NODES,
            eval_limits: EvalLimits::default(),
        }
    }
}

impl OptimizerConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a "fast" configuration for quick processing.
    ///
    /// This configuration uses:
    /// - Fewer iterations (2 max, stop after 1 stable)
    /// - A tenth of the default evaluator fuel
    /// - No loop unrolling
    #[must_use]
    pub fn fast() -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: 2,
            stable_iterations: 1,
            max_phase_iterations: 5,
            enable_loop_unrolling: false,
            eval_limits: EvalLimits {
                fuel: defaults.eval_limits.fuel / 10,
                ..defaults.eval_limits
            },
            ..defaults
        }
    }

    /// Creates an "aggressive" configuration for maximum simplification.
    ///
    /// This configuration uses:
    /// - More iterations (20 max, stop after 3 stable)
    /// - Ten times the default evaluator fuel and a deeper call limit
    ///
    /// The fold cap and the unroll ceiling keep their defaults.
    #[must_use]
    pub fn aggressive() -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: 20,
            stable_iterations: 3,
            max_phase_iterations: 30,
            eval_limits: EvalLimits {
                fuel: defaults.eval_limits.fuel * 10,
                max_depth: defaults.eval_limits.max_depth * 2,
                ..defaults.eval_limits
            },
            ..defaults
        }
    }

    /// Sets the maximum number of pipeline iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Sets all three scheduler limits at once.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum iterations of the whole pipeline.
    /// * `stable_iterations` - Stop early after this many unchanged iterations.
    /// * `max_phase_iterations` - Maximum iterations of one phase.
    #[must_use]
    pub fn with_iteration_limits(
        mut self,
        max_iterations: usize,
        stable_iterations: usize,
        max_phase_iterations: usize,
    ) -> Self {
        self.max_iterations = max_iterations;
        self.stable_iterations = stable_iterations;
        self.max_phase_iterations = max_phase_iterations;
        self
    }

    /// Enables or disables constant folding.
    #[must_use]
    pub fn with_constant_folding(mut self, enable: bool) -> Self {
        self.enable_constant_folding = enable;
        self
    }

    /// Enables or disables forward substitution.
    #[must_use]
    pub fn with_forward_substitution(mut self, enable: bool) -> Self {
        self.enable_forward_substitution = enable;
        self
    }

    /// Enables or disables dead code elimination.
    #[must_use]
    pub fn with_dead_code_elimination(mut self, enable: bool) -> Self {
        self.enable_dead_code_elimination = enable;
        self
    }

    /// Enables or disables loop unrolling.
    #[must_use]
    pub fn with_loop_unrolling(mut self, enable: bool) -> Self {
        self.enable_loop_unrolling = enable;
        self
    }

    /// Enables or disables the lowering phase.
    #[must_use]
    pub fn with_lowering(mut self, enable: bool) -> Self {
        self.enable_lowering = enable;
        self
    }

    /// Sets the folded container size cap.
    #[must_use]
    pub fn with_fold_max_len(mut self, max_len: usize) -> Self {
        self.fold_max_len = max_len;
        self
    }

    /// Sets the loop unrolling node ceiling.
    #[must_use]
    pub fn with_unroll_max_nodes(mut self, max_nodes: usize) -> Self {
        self.unroll_max_nodes = max_nodes;
        self
    }

    /// Sets the evaluator resource bounds.
    #[must_use]
    pub fn with_eval_limits(mut self, limits: EvalLimits) -> Self {
        self.eval_limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizerConfig::default();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.fold_max_len, 256);
        assert_eq!(config.unroll_max_nodes, 512);
        assert!(config.enable_loop_unrolling);
    }

    #[test]
    fn test_presets() {
        let fast = OptimizerConfig::fast();
        assert!(!fast.enable_loop_unrolling);
        assert!(fast.eval_limits.fuel < EvalLimits::default().fuel);

        let aggressive = OptimizerConfig::aggressive();
        assert!(aggressive.max_iterations > OptimizerConfig::default().max_iterations);
        assert_eq!(aggressive.unroll_max_nodes, UNROLL_MAX_NODES);
    }

    #[test]
    fn test_builders() {
        let config = OptimizerConfig::new()
            .with_iteration_limits(3, 1, 4)
            .with_lowering(false)
            .with_fold_max_len(8);
        assert_eq!(config.max_phase_iterations, 4);
        assert!(!config.enable_lowering);
        assert_eq!(config.fold_max_len, 8);
    }
}
