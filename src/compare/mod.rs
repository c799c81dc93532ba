//! Leaf comparators for pipeline artifacts.
//!
//! Each comparator reads its own artifact kind and folds the outcome into a
//! [`MatchReport`]. None of them knows about stages; routing lives in the
//! verify command.

use std::ops::AddAssign;

use serde::Serialize;

mod dot;
pub mod graph;
pub mod partition;
pub mod scored;
mod tolerance;
pub mod tree;

pub use self::tolerance::{DEFAULT_TOLERANCE, Tolerance};

/// Counts produced by one artifact comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub matched: usize,
    pub mismatched: usize,
    pub missing_in_candidate: usize,
    pub missing_in_reference: usize,
    pub extra_in_candidate: usize,
}

impl MatchReport {
    pub fn ok(&self) -> bool {
        self.mismatched == 0 && self.missing_in_candidate == 0
    }

    pub fn merge(&mut self, other: &MatchReport) {
        self.matched += other.matched;
        self.mismatched += other.mismatched;
        self.missing_in_candidate += other.missing_in_candidate;
        self.missing_in_reference += other.missing_in_reference;
        self.extra_in_candidate += other.extra_in_candidate;
    }
}

impl AddAssign<&MatchReport> for MatchReport {
    fn add_assign(&mut self, other: &MatchReport) {
        self.merge(other);
    }
}
