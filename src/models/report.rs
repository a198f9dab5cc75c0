use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub missing: BTreeSet<String>,
    pub destination_conflicts: BTreeMap<PathBuf, Vec<PathBuf>>,
    pub sources_missing_on_disk: Vec<PathBuf>,
    pub destinations_already_exist: Vec<PathBuf>,
}

impl ValidationReport {
    pub fn has_issues(&self) -> bool {
        !self.missing.is_empty()
            || !self.destination_conflicts.is_empty()
            || !self.sources_missing_on_disk.is_empty()
            || !self.destinations_already_exist.is_empty()
    }

    /// Conflicts and unmapped files make the mapping unusable; the rest is advisory.
    pub fn is_blocking(&self) -> bool {
        !self.missing.is_empty() || !self.destination_conflicts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    MissingSource,
    NoOp,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSource => write!(f, "source no longer exists"),
            Self::NoOp => write!(f, "already in place"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub moved: usize,
    pub skipped: usize,
    pub errors: usize,
    pub skipped_entries: Vec<SkippedMove>,
    pub failures: Vec<MoveFailure>,
}

impl MoveOutcome {
    pub fn record_moved(&mut self) {
        self.moved += 1;
    }

    pub fn record_skipped(&mut self, source: PathBuf, destination: PathBuf, reason: SkipReason) {
        self.skipped += 1;
        self.skipped_entries.push(SkippedMove {
            source,
            destination,
            reason,
        });
    }

    pub fn record_failure(&mut self, source: PathBuf, destination: PathBuf, reason: String) {
        self.errors += 1;
        self.failures.push(MoveFailure {
            source,
            destination,
            reason,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub directory: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupOutcome {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_issues_do_not_block() {
        let mut report = ValidationReport::default();
        assert!(!report.has_issues());

        report
            .destinations_already_exist
            .push(PathBuf::from("/x/a.txt"));
        assert!(report.has_issues());
        assert!(!report.is_blocking());

        report.destination_conflicts.insert(
            PathBuf::from("/x/b.txt"),
            vec![PathBuf::from("/b1.txt"), PathBuf::from("/b2.txt")],
        );
        assert!(report.is_blocking());
    }

    #[test]
    fn outcome_tallies_follow_records() {
        let mut outcome = MoveOutcome::default();
        outcome.record_moved();
        outcome.record_skipped(PathBuf::from("a"), PathBuf::from("a"), SkipReason::NoOp);
        outcome.record_failure(PathBuf::from("b"), PathBuf::from("c"), "denied".to_string());

        assert_eq!((outcome.moved, outcome.skipped, outcome.errors), (1, 1, 1));
        assert_eq!(outcome.failures[0].reason, "denied");
        assert_eq!(outcome.skipped_entries[0].reason, SkipReason::NoOp);
    }
}
