//! Internal utilities shared by the analyses.

pub mod graph;
