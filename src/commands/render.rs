use std::path::Path;

use colored::Colorize;

use crate::models::mapping::FileMapping;
use crate::models::report::{CleanupOutcome, MoveOutcome, ValidationReport};
use crate::models::tree::PathTree;

const INDENT: &str = "    ";

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Indented tree; every directory shows the number of files beneath it.
pub fn render_tree(tree: &PathTree) -> String {
    let mut lines = Vec::new();
    tree.walk(|depth, node| {
        let indent = INDENT.repeat(depth);
        lines.push(format!(
            "{indent}{} {}",
            format!("{}/", node.name).blue().bold(),
            format!("({})", node.file_count()).dimmed()
        ));
        for file in &node.files {
            lines.push(format!("{indent}{INDENT}{file}"));
        }
    });
    lines.join("\n")
}

/// Layout of the mapped files as they sit today.
pub fn render_current(root_name: &str, mapping: &FileMapping) -> String {
    let tree = PathTree::from_paths(root_name, mapping.entries.keys().map(String::as_str));
    format!("{}\n{}", "Current structure:".bold(), render_tree(&tree))
}

pub fn render_proposal(root_name: &str, mapping: &FileMapping) -> String {
    let tree = PathTree::from_paths(root_name, mapping.to_relative_paths().into_values());
    format!("{}\n{}", "Proposed structure:".bold(), render_tree(&tree))
}

pub fn render_report(report: &ValidationReport, root: &Path) -> String {
    let mut lines = Vec::new();

    if !report.missing.is_empty() {
        lines.push(format!(
            "{} {} files missing from the proposal:",
            "error:".red().bold(),
            report.missing.len()
        ));
        lines.extend(report.missing.iter().map(|p| format!("{INDENT}{p}")));
    }
    for (destination, sources) in &report.destination_conflicts {
        lines.push(format!(
            "{} {} sources map to {}",
            "conflict:".red().bold(),
            sources.len(),
            display_relative(destination, root).yellow()
        ));
        lines.extend(
            sources
                .iter()
                .map(|s| format!("{INDENT}{}", display_relative(s, root))),
        );
    }
    for source in &report.sources_missing_on_disk {
        lines.push(format!(
            "{} source no longer exists: {}",
            "warning:".yellow().bold(),
            display_relative(source, root)
        ));
    }
    for destination in &report.destinations_already_exist {
        lines.push(format!(
            "{} destination already exists: {}",
            "warning:".yellow().bold(),
            display_relative(destination, root)
        ));
    }
    lines.join("\n")
}

pub fn render_warnings(warnings: &[String]) -> String {
    warnings
        .iter()
        .map(|w| format!("{} {w}", "warning:".yellow().bold()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_move_summary(
    outcome: &MoveOutcome,
    cleanup: Option<&CleanupOutcome>,
    root: &Path,
) -> String {
    let mut lines = vec![format!(
        "Moved {}, skipped {}, failed {}",
        outcome.moved.to_string().green(),
        outcome.skipped.to_string().yellow(),
        if outcome.errors > 0 {
            outcome.errors.to_string().red()
        } else {
            outcome.errors.to_string().normal()
        }
    )];
    for failure in &outcome.failures {
        lines.push(format!(
            "{INDENT}{} {} -> {}: {}",
            "failed".red(),
            display_relative(&failure.source, root),
            display_relative(&failure.destination, root),
            failure.reason
        ));
    }
    if let Some(cleanup) = cleanup {
        lines.push(format!(
            "Removed {} empty directories",
            cleanup.removed_count().to_string().green()
        ));
        for failure in &cleanup.failures {
            lines.push(format!(
                "{INDENT}{} {}: {}",
                "kept".yellow(),
                display_relative(&failure.directory, root),
                failure.reason
            ));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mapping::MappingTarget;
    use std::path::PathBuf;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn tree_lists_directories_with_counts() {
        plain();
        let tree = PathTree::from_paths("root", ["images/photo.jpg", "text/notes.txt", "a.md"]);
        let rendered = render_tree(&tree);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "root/ (3)");
        assert_eq!(lines[1], "    a.md");
        assert_eq!(lines[2], "    images/ (1)");
        assert_eq!(lines[3], "        photo.jpg");
    }

    #[test]
    fn proposal_uses_destination_paths() {
        plain();
        let mut mapping = FileMapping::new(MappingTarget::Directory);
        mapping.insert("inbox/a.pdf".to_string(), "docs".to_string());
        let rendered = render_proposal("root", &mapping);
        assert!(rendered.contains("docs/ (1)"));
        assert!(!rendered.contains("inbox"));
    }

    #[test]
    fn current_tree_uses_original_paths() {
        plain();
        let mut mapping = FileMapping::new(MappingTarget::Directory);
        mapping.insert("inbox/a.pdf".to_string(), "docs".to_string());
        let rendered = render_current("root", &mapping);
        assert!(rendered.starts_with("Current structure:"));
        assert!(rendered.contains("inbox/ (1)"));
        assert!(!rendered.contains("docs"));
    }

    #[test]
    fn report_lists_conflicting_sources_relative_to_root() {
        plain();
        let mut report = ValidationReport::default();
        report.destination_conflicts.insert(
            PathBuf::from("/x/a.txt"),
            vec![PathBuf::from("/x/a.txt"), PathBuf::from("/x/b.txt")],
        );
        let rendered = render_report(&report, Path::new("/x"));
        assert!(rendered.contains("conflict: 2 sources map to a.txt"));
        assert!(rendered.contains("    b.txt"));
    }

    #[test]
    fn summary_reports_counts() {
        plain();
        let mut outcome = MoveOutcome::default();
        outcome.record_moved();
        outcome.record_moved();
        let cleanup = CleanupOutcome {
            removed: vec![PathBuf::from("/x/old")],
            failures: Vec::new(),
        };
        let rendered = render_move_summary(&outcome, Some(&cleanup), Path::new("/x"));
        assert!(rendered.starts_with("Moved 2, skipped 0, failed 0"));
        assert!(rendered.contains("Removed 1 empty directories"));
    }
}
