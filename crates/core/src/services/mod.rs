//! Services built on top of indexed snapshots.

pub mod diff;

pub use diff::{anchors, find_matches, propagate, Anchor, PropagateReport, Relation};
