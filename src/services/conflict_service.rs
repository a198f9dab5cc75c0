use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::debug;

use crate::error::AppError;
use crate::models::mapping::ResolvedMapping;
use crate::models::report::ValidationReport;
use crate::scope_path::normalize_lexical;

/// Checks a resolved mapping against itself and the filesystem. Conflicting
/// sources are listed in mapping order. Nothing is modified on disk.
pub fn analyze(resolved: &ResolvedMapping, missing: &BTreeSet<String>) -> ValidationReport {
    let mut by_destination: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let mut report = ValidationReport {
        missing: missing.clone(),
        ..ValidationReport::default()
    };

    for entry in &resolved.entries {
        let source = normalize_lexical(&entry.source);
        let destination = normalize_lexical(&entry.destination);
        by_destination
            .entry(destination.clone())
            .or_default()
            .push(entry.source.clone());

        if !entry.source.exists() {
            report.sources_missing_on_disk.push(entry.source.clone());
        }
        if destination != source && entry.destination.exists() {
            report
                .destinations_already_exist
                .push(entry.destination.clone());
        }
    }

    report.destination_conflicts = by_destination
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .collect();

    debug!(
        conflicts = report.destination_conflicts.len(),
        missing_sources = report.sources_missing_on_disk.len(),
        existing_destinations = report.destinations_already_exist.len(),
        "Analyzed resolved mapping"
    );
    report
}

/// Rejects a mapping that would send two files to the same path.
pub fn ensure_no_conflicts(report: &ValidationReport) -> Result<(), AppError> {
    if report.destination_conflicts.is_empty() {
        return Ok(());
    }
    let detail = report
        .destination_conflicts
        .iter()
        .map(|(destination, sources)| {
            let sources = sources
                .iter()
                .map(|s| s.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} <- [{sources}]", destination.display())
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::Conflict(detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    #[test]
    fn two_sources_to_one_destination_conflict() {
        let resolved = ResolvedMapping::new(
            "/x",
            vec![
                (PathBuf::from("/x/a.txt"), PathBuf::from("/x/a.txt")),
                (PathBuf::from("/x/b.txt"), PathBuf::from("/x/a.txt")),
            ],
        );
        let report = analyze(&resolved, &BTreeSet::new());

        assert_eq!(report.destination_conflicts.len(), 1);
        assert_eq!(
            report.destination_conflicts.get(Path::new("/x/a.txt")).unwrap(),
            &vec![PathBuf::from("/x/a.txt"), PathBuf::from("/x/b.txt")]
        );
        assert!(report.is_blocking());
        assert!(matches!(ensure_no_conflicts(&report), Err(AppError::Conflict(_))));
    }

    #[test]
    fn dot_segments_do_not_hide_conflicts() {
        let resolved = ResolvedMapping::new(
            "/x",
            vec![
                (PathBuf::from("/x/a.txt"), PathBuf::from("/x/docs/./a.txt")),
                (PathBuf::from("/x/b/a.txt"), PathBuf::from("/x/docs/sub/../a.txt")),
            ],
        );
        let report = analyze(&resolved, &BTreeSet::new());
        assert!(report
            .destination_conflicts
            .contains_key(Path::new("/x/docs/a.txt")));
    }

    #[test]
    fn reports_filesystem_state() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/a.txt"), "old").unwrap();

        let resolved = ResolvedMapping::new(
            root,
            vec![
                (root.join("a.txt"), root.join("docs/a.txt")),
                (root.join("gone.txt"), root.join("docs/gone.txt")),
                (root.join("docs/a.txt"), root.join("docs/a.txt")),
            ],
        );
        let report = analyze(&resolved, &BTreeSet::new());

        assert_eq!(report.sources_missing_on_disk, vec![root.join("gone.txt")]);
        assert_eq!(report.destinations_already_exist, vec![root.join("docs/a.txt")]);
        assert!(report.has_issues());
        // a.txt and docs/a.txt both land on docs/a.txt
        assert!(report.is_blocking());
    }

    #[test]
    fn missing_files_make_the_report_blocking() {
        let resolved = ResolvedMapping::new("/x", Vec::new());
        let missing: BTreeSet<String> = ["c.txt".to_string()].into_iter().collect();
        let report = analyze(&resolved, &missing);
        assert!(report.is_blocking());
        assert!(ensure_no_conflicts(&report).is_ok());
    }
}
