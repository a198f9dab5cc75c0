use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::mapping::{ResolvedMapping, ResolvedMove};
use crate::models::report::{MoveOutcome, SkipReason};
use crate::safety::validate_root;
use crate::scope_path::{is_path_within, normalize_lexical};

#[cfg(unix)]
const EXDEV: i32 = 18;

fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(EXDEV)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

fn rename_or_copy(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            debug!(source = %source.display(), "Rename crossed devices, copying instead");
            fs::copy(source, destination)?;
            fs::remove_file(source)
        }
        Err(err) => Err(err),
    }
}

enum Step {
    Moved,
    Skipped(SkipReason),
}

enum StepError {
    /// Something already sits at the destination.
    Occupied,
    Failed(String),
}

impl StepError {
    fn into_reason(self) -> String {
        match self {
            StepError::Occupied => "destination already exists".to_string(),
            StepError::Failed(reason) => reason,
        }
    }
}

fn move_one(root: &Path, entry: &ResolvedMove) -> Result<Step, StepError> {
    let source = &entry.source;
    let destination = &entry.destination;

    if !source.exists() {
        return Ok(Step::Skipped(SkipReason::MissingSource));
    }
    if normalize_lexical(source) == normalize_lexical(destination) {
        return Ok(Step::Skipped(SkipReason::NoOp));
    }
    if !is_path_within(destination, root) {
        return Err(StepError::Failed(
            "destination is outside the target directory".to_string(),
        ));
    }
    if destination.exists() {
        return Err(StepError::Occupied);
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            StepError::Failed(format!("could not create {}: {e}", parent.display()))
        })?;
    }
    rename_or_copy(source, destination).map_err(|e| StepError::Failed(e.to_string()))?;
    Ok(Step::Moved)
}

fn record(outcome: &mut MoveOutcome, entry: &ResolvedMove, result: Result<Step, StepError>) {
    match result {
        Ok(Step::Moved) => {
            debug!(
                source = %entry.source.display(),
                destination = %entry.destination.display(),
                "Moved file"
            );
            outcome.record_moved();
        }
        Ok(Step::Skipped(reason)) => {
            debug!(source = %entry.source.display(), reason = %reason, "Skipped move");
            outcome.record_skipped(entry.source.clone(), entry.destination.clone(), reason);
        }
        Err(err) => {
            let reason = err.into_reason();
            warn!(
                source = %entry.source.display(),
                destination = %entry.destination.display(),
                reason = %reason,
                "Move failed"
            );
            outcome.record_failure(entry.source.clone(), entry.destination.clone(), reason);
        }
    }
}

/// Applies every move in order. Per-file failures are recorded in the
/// outcome and do not stop the batch.
///
/// A move whose destination is still occupied by another entry's source is
/// deferred and retried once that source has moved away. Existing files are
/// never overwritten.
pub fn apply_moves(resolved: &ResolvedMapping) -> Result<MoveOutcome, AppError> {
    if resolved.is_empty() {
        return Err(AppError::InvalidInput("no moves to apply".to_string()));
    }
    validate_root(&resolved.root)?;

    let sources: HashSet<PathBuf> = resolved
        .entries
        .iter()
        .map(|e| normalize_lexical(&e.source))
        .collect();

    let mut outcome = MoveOutcome::default();
    let mut deferred: Vec<&ResolvedMove> = Vec::new();
    for entry in &resolved.entries {
        match move_one(&resolved.root, entry) {
            Err(StepError::Occupied) if sources.contains(&normalize_lexical(&entry.destination)) => {
                debug!(destination = %entry.destination.display(), "Destination not vacated yet, deferring");
                deferred.push(entry);
            }
            result => record(&mut outcome, entry, result),
        }
    }

    while !deferred.is_empty() {
        let before = deferred.len();
        let mut blocked = Vec::new();
        for entry in deferred {
            match move_one(&resolved.root, entry) {
                Err(StepError::Occupied) => blocked.push(entry),
                result => record(&mut outcome, entry, result),
            }
        }
        if blocked.len() == before {
            for entry in blocked {
                record(&mut outcome, entry, Err(StepError::Occupied));
            }
            break;
        }
        deferred = blocked;
    }

    info!(
        moved = outcome.moved,
        skipped = outcome.skipped,
        errors = outcome.errors,
        "Applied moves"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_file(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap().write_all(content).unwrap();
    }

    fn mapping(root: &Path, pairs: &[(&str, &str)]) -> ResolvedMapping {
        ResolvedMapping::new(
            root,
            pairs
                .iter()
                .map(|(s, d)| (root.join(s), root.join(d)))
                .collect::<Vec<(PathBuf, PathBuf)>>(),
        )
    }

    #[test]
    fn test_moves_and_skips_missing_source() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path();
        write_file(&root.join("a.txt"), b"a");
        write_file(&root.join("b.txt"), b"b");

        let resolved = mapping(
            root,
            &[
                ("a.txt", "x/a.txt"),
                ("b.txt", "y/b.txt"),
                ("c.txt", "z/c.txt"),
            ],
        );
        let outcome = apply_moves(&resolved).unwrap();

        assert_eq!((outcome.moved, outcome.skipped, outcome.errors), (2, 1, 0));
        assert_eq!(fs::read_to_string(root.join("x/a.txt")).unwrap(), "a");
        assert!(root.join("y/b.txt").exists());
        assert!(!root.join("a.txt").exists());
        assert!(!root.join("z").exists());
        assert_eq!(outcome.skipped_entries[0].reason, SkipReason::MissingSource);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path();
        write_file(&root.join("a.txt"), b"a");
        let resolved = mapping(root, &[("a.txt", "docs/a.txt")]);

        let first = apply_moves(&resolved).unwrap();
        assert_eq!(first.moved, 1);

        let second = apply_moves(&resolved).unwrap();
        assert_eq!((second.moved, second.skipped, second.errors), (0, 1, 0));
        assert_eq!(fs::read_to_string(root.join("docs/a.txt")).unwrap(), "a");
    }

    #[test]
    fn test_identity_move_is_skipped() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path();
        write_file(&root.join("docs/a.txt"), b"a");

        let resolved = ResolvedMapping::new(
            root,
            vec![(root.join("docs/a.txt"), root.join("docs/./a.txt"))],
        );
        let outcome = apply_moves(&resolved).unwrap();
        assert_eq!(outcome.skipped_entries[0].reason, SkipReason::NoOp);
        assert!(root.join("docs/a.txt").exists());
    }

    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path();
        write_file(&root.join("a.txt"), b"new");
        write_file(&root.join("docs/a.txt"), b"old");

        let outcome = apply_moves(&mapping(root, &[("a.txt", "docs/a.txt")])).unwrap();
        assert_eq!(outcome.errors, 1);
        assert_eq!(fs::read_to_string(root.join("docs/a.txt")).unwrap(), "old");
        assert!(root.join("a.txt").exists());
    }

    #[test]
    fn test_destination_outside_root_is_refused() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path().join("root");
        write_file(&root.join("a.txt"), b"a");

        let resolved = ResolvedMapping::new(
            &root,
            vec![(root.join("a.txt"), root.join("../escaped/a.txt"))],
        );
        let outcome = apply_moves(&resolved).unwrap();
        assert_eq!(outcome.errors, 1);
        assert!(!base.path().join("escaped").exists());
    }

    #[test]
    fn test_empty_mapping_is_rejected() {
        let base = tempfile::tempdir().unwrap();
        let resolved = ResolvedMapping::new(base.path(), Vec::new());
        assert!(matches!(
            apply_moves(&resolved),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_identity_move_is_skipped_on_every_run() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path();
        write_file(&root.join("docs/a.txt"), b"a");
        let resolved = mapping(root, &[("docs/a.txt", "docs/a.txt")]);

        for _ in 0..2 {
            let outcome = apply_moves(&resolved).unwrap();
            assert_eq!((outcome.moved, outcome.skipped, outcome.errors), (0, 1, 0));
            assert_eq!(outcome.skipped_entries[0].reason, SkipReason::NoOp);
        }
        assert_eq!(fs::read_to_string(root.join("docs/a.txt")).unwrap(), "a");
    }

    #[test]
    fn test_chained_moves_wait_for_destination_to_clear() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path();
        write_file(&root.join("a.txt"), b"a");
        write_file(&root.join("b.txt"), b"b");

        let resolved = mapping(root, &[("a.txt", "b.txt"), ("b.txt", "old/b.txt")]);
        let outcome = apply_moves(&resolved).unwrap();

        assert_eq!((outcome.moved, outcome.skipped, outcome.errors), (2, 0, 0));
        assert_eq!(fs::read_to_string(root.join("b.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(root.join("old/b.txt")).unwrap(), "b");
        assert!(!root.join("a.txt").exists());
    }

    #[test]
    fn test_swapped_files_are_left_untouched() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path();
        write_file(&root.join("a.txt"), b"a");
        write_file(&root.join("b.txt"), b"b");

        let resolved = mapping(root, &[("a.txt", "b.txt"), ("b.txt", "a.txt")]);
        let outcome = apply_moves(&resolved).unwrap();

        assert_eq!((outcome.moved, outcome.errors), (0, 2));
        assert_eq!(outcome.failures[0].reason, "destination already exists");
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(root.join("b.txt")).unwrap(), "b");
    }
}
