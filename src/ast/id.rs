//! Node identities.
//!
//! Every expression, statement and parameter carries an [`AstId`]. Analyses key
//! their fact tables by id rather than by structural equality, so two equal
//! subtrees at different positions stay distinguishable and a freshly created
//! node never inherits facts computed for the node it replaced.

use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Next identity to hand out. Zero is never allocated.
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// A process-unique identifier for a syntax tree node.
///
/// Ids are allocated from a global counter, so nodes built by independent
/// builders, parsers or deep copies can never collide.
///
/// # Examples
///
/// ```rust
/// use midend::ast::AstId;
///
/// let a = AstId::fresh();
/// let b = AstId::fresh();
/// assert_ne!(a, b);
/// assert!(b.index() > a.index());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AstId(u32);

impl AstId {
    /// Allocates a new, never before used identity.
    #[must_use]
    pub fn fresh() -> Self {
        AstId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value of this identity.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Reconstructs an identity from a raw value and reserves it.
    ///
    /// Used when a tree is loaded from an external representation: the global
    /// counter is advanced past `raw` so later [`AstId::fresh`] calls cannot
    /// hand out the same value again.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        NEXT_ID.fetch_max(raw.saturating_add(1), Ordering::Relaxed);
        AstId(raw)
    }
}

impl fmt::Debug for AstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for AstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Serialize for AstId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for AstId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(AstId::from_raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids_are_unique() {
        let ids: Vec<AstId> = (0..100).map(|_| AstId::fresh()).collect();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_from_raw_reserves() {
        let high = AstId::fresh().index() + 1000;
        let loaded = AstId::from_raw(high);
        assert_eq!(loaded.index(), high);
        assert!(AstId::fresh().index() > high);
    }

    #[test]
    fn test_display() {
        let id = AstId::from_raw(7);
        assert_eq!(format!("{id}"), "#7");
        assert_eq!(format!("{id:?}"), "#7");
    }
}
