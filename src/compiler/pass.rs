//! The pass trait.

use crate::{
    analysis::{Analyses, AnalysisKind},
    ast::Module,
    compiler::context::CompilerContext,
    Result,
};

/// An optimization pass over the whole syntax tree.
///
/// Passes must be thread-safe (Send + Sync) so a pipeline can be built once
/// and shared, but the scheduler runs them strictly one after another: a pass
/// owns the tree exclusively for the duration of [`TreePass::run`].
///
/// # Analyses
///
/// A pass lists the analyses it reads in [`TreePass::requires`]. Right before
/// every invocation the scheduler makes sure those are computed for the
/// current tree and hands them over in an [`Analyses`] bundle. Facts are never
/// updated while a pass rewrites; a pass that needs fresh facts after a
/// rewrite reports a change and is invoked again.
pub trait TreePass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Analyses this pass reads.
    fn requires(&self) -> &'static [AnalysisKind] {
        &[]
    }

    /// Should this pass run at all on this module?
    ///
    /// Called before analyses are computed, so a pass that is disabled or has
    /// nothing to do costs nothing.
    fn should_run(&self, _module: &Module, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Runs the pass over the module.
    ///
    /// Returns `true` if the tree was changed, `false` otherwise.
    /// Events should be recorded directly to `ctx.events`.
    ///
    /// # Arguments
    ///
    /// * `module` - The tree to transform.
    /// * `analyses` - The analyses listed in [`TreePass::requires`], computed
    ///   for the tree as it is on entry.
    /// * `ctx` - The shared compiler context.
    ///
    /// # Errors
    ///
    /// Returns an error if a required analysis is missing or the tree carries
    /// malformed metadata.
    fn run(&self, module: &mut Module, analyses: &Analyses, ctx: &CompilerContext)
        -> Result<bool>;

    /// Called once before the pass runs in a phase.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Called once after the pass completes in a phase.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn finalize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
