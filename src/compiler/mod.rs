//! Pass infrastructure and the optimizer pipeline.
//!
//! This module sits between the analyses and the caller:
//!
//! - [`crate::analysis`] - facts about the tree, computed on demand
//! - [`compiler`](self) - passes that rewrite the tree, the scheduler that
//!   runs them, and the [`Optimizer`] facade
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Optimizer Pipeline                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext             Shared state of one run             │
//! │    ├─ OptimizerConfig         (limits, enabled passes)           │
//! │    ├─ ModuleTable             (builtin modules)                  │
//! │    └─ EventLog                (what every pass did)              │
//! │                                                                  │
//! │  PassScheduler               3-phase fixpoint execution          │
//! │    ├─ Phase 1: Normalize      (folding, substitution, DCE)       │
//! │    ├─ Phase 2: Expand         (loop unrolling)                   │
//! │    └─ Phase 3: Lower          (pow2, genexp, xrange)             │
//! │    Each phase: run → normalize → repeat until stable             │
//! │                                                                  │
//! │  TreePass trait              Interface for all passes            │
//! │    ├─ requires()              Analyses the pass reads            │
//! │    └─ run()                   Whole-module transformation        │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod context;
mod engine;
mod events;
mod pass;
mod passes;
mod scheduler;

pub use config::{OptimizerConfig, UNROLL_MAX_NODES};
pub use context::{CompilerContext, MODULE_SCOPE};
pub use engine::{OptimizeResult, Optimizer};
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog};
pub use pass::TreePass;
pub use passes::{
    ConstantFoldingPass, DeadCodeEliminationPass, ForwardSubstitutionPass,
    IterTransformationPass, ListCompToGenexpPass, LoopUnrollingPass, Pow2Pass,
};
pub use scheduler::{PassScheduler, Phase};
