//! Event logging for the optimization pipeline.
//!
//! Every rewrite a pass performs is recorded as an [`Event`]: which function
//! it happened in, which node it touched and a short message. Statistics are
//! derived from the log afterwards rather than counted separately.
//!
//! # Architecture
//!
//! - [`Event`] - a single recorded event
//! - [`EventLog`] - append-only collection with query and summary helpers
//! - [`EventBuilder`] - fluent API for creating events
//! - [`DerivedStats`] - counters computed from a log
//!
//! # Example
//!
//! ```rust
//! use midend::ast::AstId;
//! use midend::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::ConstantFolded)
//!     .function("foo")
//!     .node(AstId::from_raw(7))
//!     .message("1 + 3 -> 4");
//! log.info("starting normalize phase");
//!
//! assert_eq!(log.count_kind(EventKind::ConstantFolded), 1);
//! assert_eq!(log.summary(), "1 constants folded");
//! ```

use std::{fmt, time::Duration};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::AstId;

/// What an [`Event`] reports.
///
/// Rewrites come first, then pipeline bookkeeping, then free-form
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A constant expression was replaced by its value.
    ConstantFolded,
    /// A single-use definition was moved to its use site.
    VariableSubstituted,
    /// An unused assignment target was dropped.
    TargetRemoved,
    /// A statement was replaced by `pass` or by its bare value.
    StatementRemoved,
    /// A loop was fully unrolled.
    LoopUnrolled,
    /// `x ** 2` was rewritten to `pow2(x)`.
    PowerLowered,
    /// A list comprehension became a generator expression.
    ComprehensionLowered,
    /// `range` became `xrange`.
    IteratorLowered,

    /// A loop was left alone because it would grow past the unroll ceiling.
    UnrollRejected,
    /// A pass finished with the tree changed.
    PassCompleted,

    /// Free-form note.
    Info,
    /// Free-form note about a recoverable oddity.
    Warning,
    /// Free-form note about a failure.
    Error,
}

impl EventKind {
    /// Plural label used in summaries.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ConstantFolded => "constants folded",
            Self::VariableSubstituted => "variables substituted",
            Self::TargetRemoved => "targets removed",
            Self::StatementRemoved => "statements removed",
            Self::LoopUnrolled => "loops unrolled",
            Self::PowerLowered => "powers lowered",
            Self::ComprehensionLowered => "comprehensions lowered",
            Self::IteratorLowered => "iterators lowered",
            Self::UnrollRejected => "unrolls rejected",
            Self::PassCompleted => "passes completed",
            Self::Info => "notes",
            Self::Warning => "warnings",
            Self::Error => "errors",
        }
    }

    /// `true` for kinds that stand for a change to the tree.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::ConstantFolded
                | Self::VariableSubstituted
                | Self::TargetRemoved
                | Self::StatementRemoved
                | Self::LoopUnrolled
                | Self::PowerLowered
                | Self::ComprehensionLowered
                | Self::IteratorLowered
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// One entry of an [`EventLog`].
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Enclosing top-level function, `None` for module-level code.
    pub function: Option<String>,
    /// The node that was rewritten or inspected.
    pub node: Option<AstId>,
    /// Free text, usually the rewritten node as source.
    pub message: String,
    /// Name of the pass that recorded the event.
    pub pass: Option<String>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(function) = &self.function {
            write!(f, " {function}:")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Fluent event under construction, returned by [`EventLog::record`].
///
/// Nothing has to be called to finish it: the event lands in the log when
/// the builder goes out of scope.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    event: Event,
    message: Option<String>,
}

impl EventBuilder<'_> {
    /// Function and node in one call, as passes know both.
    pub fn at(mut self, function: Option<&str>, node: AstId) -> Self {
        self.event.function = function.map(str::to_string);
        self.event.node = Some(node);
        self
    }

    /// Enclosing function.
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.event.function = Some(function.into());
        self
    }

    /// Affected node.
    pub fn node(mut self, node: AstId) -> Self {
        self.event.node = Some(node);
        self
    }

    /// Replaces the default message, which is the kind's label.
    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.message = Some(text.into());
        self
    }

    /// Recording pass.
    pub fn pass(mut self, name: impl Into<String>) -> Self {
        self.event.pass = Some(name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let mut event = Event {
            kind: self.event.kind,
            function: self.event.function.take(),
            node: self.event.node.take(),
            message: String::new(),
            pass: self.event.pass.take(),
        };
        event.message = self
            .message
            .take()
            .unwrap_or_else(|| event.kind.description().to_string());
        self.log.events.push(event);
    }
}

/// Append-only record of one optimizer run.
///
/// Appending goes through `&self`, so the log can sit in a shared
/// [`CompilerContext`](crate::compiler::CompilerContext) while passes and
/// analyses hold other borrows of it.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let copy = Self::new();
        for event in self.iter() {
            copy.events.push(event.clone());
        }
        copy
    }
}

impl EventLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` before the first event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Begins an event of `kind`; see [`EventBuilder`].
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Event {
                kind,
                function: None,
                node: None,
                message: String::new(),
                pass: None,
            },
            message: None,
        }
    }

    /// Appends a free-form note.
    pub fn info(&self, message: impl Into<String>) {
        self.record(EventKind::Info).message(message);
    }

    /// Appends a warning.
    pub fn warn(&self, message: impl Into<String>) {
        self.record(EventKind::Warning).message(message);
    }

    /// Appends an error note. Fatal conditions are returned as
    /// [`Error`](crate::Error) instead.
    pub fn error(&self, message: impl Into<String>) {
        self.record(EventKind::Error).message(message);
    }

    /// Events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, event)| event)
    }

    /// `true` if at least one event of `kind` was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|event| event.kind == kind)
    }

    /// Number of events of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.iter().filter(|event| event.kind == kind).count()
    }

    /// Events recorded inside `function`.
    pub fn filter_function<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a Event> {
        self.iter()
            .filter(move |event| event.function.as_deref() == Some(function))
    }

    fn tally(&self) -> FxHashMap<EventKind, usize> {
        let mut tally = FxHashMap::default();
        for event in self.iter() {
            *tally.entry(event.kind).or_default() += 1;
        }
        tally
    }

    /// Distinct functions that saw at least one rewrite.
    #[must_use]
    pub fn functions_affected(&self) -> usize {
        self.iter()
            .filter(|event| event.kind.is_transformation())
            .filter_map(|event| event.function.as_deref())
            .collect::<FxHashSet<_>>()
            .len()
    }

    /// Rewrite counts as `"<n> <label>"`, sorted and comma-joined.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }
        let mut parts: Vec<String> = self
            .tally()
            .into_iter()
            .filter(|(kind, _)| kind.is_transformation())
            .map(|(kind, n)| format!("{n} {kind}"))
            .collect();
        if parts.is_empty() {
            return format!("{} events", self.len());
        }
        parts.sort();
        parts.join(", ")
    }
}

/// Counters computed from an [`EventLog`] after a run.
#[derive(Debug, Clone, Default)]
pub struct DerivedStats {
    /// Functions with at least one rewrite.
    pub functions_transformed: usize,
    /// Folded constant expressions.
    pub constants_folded: usize,
    /// Forward-substituted variables.
    pub variables_substituted: usize,
    /// Dropped assignment targets.
    pub targets_removed: usize,
    /// Statements turned into `pass` or a bare value.
    pub statements_removed: usize,
    /// Fully unrolled loops.
    pub loops_unrolled: usize,
    /// Loops kept because of the unroll ceiling.
    pub unrolls_rejected: usize,
    /// Peephole lowerings of any kind.
    pub lowerings: usize,
    /// Warning notes.
    pub warnings: usize,
    /// Error notes.
    pub errors: usize,
    /// Scheduler iterations.
    pub iterations: usize,
    /// Wall-clock time of the run.
    pub total_time: Duration,
}

impl DerivedStats {
    /// Counts every kind in `log`. Time and iterations stay zero.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let tally = log.tally();
        let n = |kind| tally.get(&kind).copied().unwrap_or_default();

        Self {
            functions_transformed: log.functions_affected(),
            constants_folded: n(EventKind::ConstantFolded),
            variables_substituted: n(EventKind::VariableSubstituted),
            targets_removed: n(EventKind::TargetRemoved),
            statements_removed: n(EventKind::StatementRemoved),
            loops_unrolled: n(EventKind::LoopUnrolled),
            unrolls_rejected: n(EventKind::UnrollRejected),
            lowerings: n(EventKind::PowerLowered)
                + n(EventKind::ComprehensionLowered)
                + n(EventKind::IteratorLowered),
            warnings: n(EventKind::Warning),
            errors: n(EventKind::Error),
            ..Self::default()
        }
    }

    /// Attaches the run time.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Attaches the scheduler iteration count.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// One-line report of the non-zero counters.
    #[must_use]
    pub fn summary(&self) -> String {
        let counters = [
            (self.functions_transformed, "functions"),
            (self.constants_folded, "constants folded"),
            (self.variables_substituted, "substituted"),
            (self.targets_removed, "targets removed"),
            (self.statements_removed, "statements removed"),
            (self.loops_unrolled, "loops unrolled"),
            (self.lowerings, "lowered"),
            (self.errors, "errors"),
            (self.warnings, "warnings"),
        ];
        let parts: Vec<String> = counters
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, label)| format!("{count} {label}"))
            .collect();

        let counts = if parts.is_empty() {
            "no transformations".to_string()
        } else {
            parts.join(", ")
        };
        if self.total_time.is_zero() {
            counts
        } else {
            format!(
                "{counts} in {:?} ({} iterations)",
                self.total_time, self.iterations
            )
        }
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(!log.has(EventKind::ConstantFolded));
        assert_eq!(log.summary(), "no events");
    }

    #[test]
    fn test_builder_records_on_drop() {
        let log = EventLog::new();
        log.record(EventKind::LoopUnrolled)
            .at(Some("f"), AstId::from_raw(3))
            .pass("loop-unrolling");
        let event = log.iter().next().unwrap();
        assert_eq!(event.message, "loops unrolled");
        assert_eq!(event.function.as_deref(), Some("f"));
        assert_eq!(event.pass.as_deref(), Some("loop-unrolling"));
        assert_eq!(log.filter_function("f").count(), 1);
    }

    #[test]
    fn test_summary_only_counts_transformations() {
        let log = EventLog::new();
        log.record(EventKind::ConstantFolded).function("f");
        log.record(EventKind::ConstantFolded).function("g");
        log.record(EventKind::UnrollRejected).function("g");
        log.warn("careful");
        assert_eq!(log.summary(), "2 constants folded");
        assert_eq!(log.count_kind(EventKind::Warning), 1);

        let stats = DerivedStats::from_log(&log).with_iterations(2);
        assert_eq!(stats.functions_transformed, 2);
        assert_eq!(stats.unrolls_rejected, 1);
        assert_eq!(stats.to_string(), "2 functions, 2 constants folded, 1 warnings");
    }

    #[test]
    fn test_clone_copies_events() {
        let log = EventLog::new();
        log.info("one");
        let copy = log.clone();
        log.info("two");
        assert_eq!(copy.len(), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(copy.iter().next().unwrap().to_string(), "[notes] one");
    }
}
