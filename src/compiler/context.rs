//! Shared state of one optimization run.
//!
//! The [`CompilerContext`] is handed to every pass by shared reference. It
//! carries the configuration, the builtin module table, the event log and
//! the set of functions any pass has changed. The tree itself is not part of
//! the context: it flows through the passes as `&mut Module`.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashSet;

use crate::{
    compiler::{config::OptimizerConfig, events::EventLog},
    eval::ModuleTable,
};

/// Marker used in [`CompilerContext::changed_functions`] for module-level code.
pub const MODULE_SCOPE: &str = "<module>";

/// Shared state for the pass pipeline.
pub struct CompilerContext {
    /// Accumulated events from all passes.
    pub events: EventLog,

    /// Pipeline configuration.
    pub config: OptimizerConfig,

    /// The builtin namespace folding and analyses resolve against.
    pub table: Arc<ModuleTable>,

    /// Functions changed by at least one pass, [`MODULE_SCOPE`] for the top level.
    pub changed_functions: DashSet<String>,

    start_time: Instant,
}

impl CompilerContext {
    /// Creates a context for one run.
    #[must_use]
    pub fn new(config: OptimizerConfig, table: Arc<ModuleTable>) -> Self {
        Self {
            events: EventLog::new(),
            config,
            table,
            changed_functions: DashSet::new(),
            start_time: Instant::now(),
        }
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Records that a function was rewritten. `None` is the module level.
    pub fn mark_changed(&self, function: Option<&str>) {
        self.changed_functions
            .insert(function.unwrap_or(MODULE_SCOPE).to_string());
    }

    /// Returns `true` if a pass rewrote the function.
    #[must_use]
    pub fn is_changed(&self, function: &str) -> bool {
        self.changed_functions.contains(function)
    }
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new(
            OptimizerConfig::default(),
            Arc::new(ModuleTable::standard()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_tracking() {
        let ctx = CompilerContext::default();
        ctx.mark_changed(Some("foo"));
        ctx.mark_changed(None);
        ctx.mark_changed(Some("foo"));
        assert!(ctx.is_changed("foo"));
        assert!(ctx.is_changed(MODULE_SCOPE));
        assert!(!ctx.is_changed("bar"));
        assert_eq!(ctx.changed_functions.len(), 2);
    }
}
