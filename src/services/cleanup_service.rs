use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::models::mapping::ResolvedMapping;
use crate::models::report::{CleanupFailure, CleanupOutcome};
use crate::scope_path::{is_path_within, normalize_lexical};

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

fn try_remove(dir: &Path, outcome: &mut CleanupOutcome) -> bool {
    match fs::remove_dir(dir) {
        Ok(()) => {
            debug!(directory = %dir.display(), "Removed empty directory");
            outcome.removed.push(dir.to_path_buf());
            true
        }
        Err(err) => {
            warn!(directory = %dir.display(), error = %err, "Could not remove directory");
            outcome.failures.push(CleanupFailure {
                directory: dir.to_path_buf(),
                reason: err.to_string(),
            });
            false
        }
    }
}

/// Removes directories vacated by the moves, deepest first, then walks up
/// through ancestors while they are empty. The root itself is never removed.
pub fn cleanup_after_moves(root: &Path, resolved: &ResolvedMapping) -> CleanupOutcome {
    let root = normalize_lexical(root);
    let candidates: BTreeSet<PathBuf> = resolved
        .sources()
        .filter_map(Path::parent)
        .map(normalize_lexical)
        .filter(|dir| *dir != root && is_path_within(dir, &root))
        .collect();

    let mut ordered: Vec<PathBuf> = candidates.into_iter().collect();
    ordered.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));

    let mut outcome = CleanupOutcome::default();
    for candidate in ordered {
        let mut current = candidate;
        while current != root && current.is_dir() && is_empty_dir(&current) {
            if !try_remove(&current, &mut outcome) {
                break;
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }
    }
    outcome
}

/// Removes every empty directory below `root`, deepest first.
pub fn cleanup_tree(root: &Path) -> CleanupOutcome {
    let mut outcome = CleanupOutcome::default();
    let dirs = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir());
    for entry in dirs {
        if is_empty_dir(entry.path()) {
            try_remove(entry.path(), &mut outcome);
        }
    }
    outcome
}
