//! Out-of-band annotations keyed by node identity.
//!
//! Upstream stages attach hints to nodes without changing the node vocabulary:
//! explicit parallelism directives, "do not transform" markers, free-form
//! comments. The optimizer reads them, copies them along when it duplicates a
//! node, and never mutates them otherwise.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ast::AstId, Result};

/// An OpenMP-style directive, e.g. `omp parallel for reduction(+:s)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmpDirective {
    /// Pragma text, starting with the `omp` keyword
    pub text: String,
}

impl OmpDirective {
    /// Creates a directive from its pragma text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        OmpDirective { text: text.into() }
    }

    /// Checks that the pragma is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the text does not start with the
    /// `omp` keyword followed by at least one construct name.
    pub fn validate(&self) -> Result<()> {
        let mut words = self.text.split_whitespace();
        match (words.next(), words.next()) {
            (Some("omp"), Some(_)) => Ok(()),
            _ => Err(malformed_error!(
                "invalid parallelism directive `{}`",
                self.text
            )),
        }
    }
}

/// A single annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Annotation {
    /// Explicit parallelism directive attached to a loop
    Omp(OmpDirective),
    /// The node must be left exactly as written
    NoTransform,
    /// Free-form note, ignored by the optimizer
    Comment(String),
}

impl Annotation {
    /// Returns `true` if this annotation forbids structural rewrites of the
    /// node it is attached to.
    #[must_use]
    pub fn blocks_transform(&self) -> bool {
        matches!(self, Annotation::Omp(_) | Annotation::NoTransform)
    }
}

/// Side table from node identity to its annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    entries: BTreeMap<AstId, Vec<Annotation>>,
}

impl Metadata {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an annotation to a node.
    pub fn add(&mut self, node: AstId, annotation: Annotation) {
        self.entries.entry(node).or_default().push(annotation);
    }

    /// Annotations attached to a node, empty if none.
    #[must_use]
    pub fn get(&self, node: AstId) -> &[Annotation] {
        self.entries.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if the node carries at least one annotation.
    #[must_use]
    pub fn has_annotations(&self, node: AstId) -> bool {
        self.entries.contains_key(&node)
    }

    /// Duplicates the annotations of `from` onto `to`.
    ///
    /// Used whenever a node is copied, so hints survive duplication.
    pub fn copy_annotations(&mut self, from: AstId, to: AstId) {
        if let Some(annotations) = self.entries.get(&from).cloned() {
            self.entries.entry(to).or_default().extend(annotations);
        }
    }

    /// Returns `true` if the node must not be structurally transformed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if an attached directive is malformed.
    pub fn blocks_transform(&self, node: AstId) -> Result<bool> {
        let mut blocked = false;
        for annotation in self.get(node) {
            if let Annotation::Omp(directive) = annotation {
                directive.validate()?;
            }
            blocked |= annotation.blocks_transform();
        }
        Ok(blocked)
    }

    /// Number of annotated nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no node is annotated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
