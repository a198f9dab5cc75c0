use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::file_descriptor::FileDescriptor;
use crate::scope_path::{normalize_relative, relative_depth};

/// What the values of a [`FileMapping`] denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingTarget {
    /// Values are full relative paths of the file after the move.
    FullPath,
    /// Values are relative destination directories; the file keeps its name.
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapping {
    pub target: MappingTarget,
    pub entries: BTreeMap<String, String>,
}

impl FileMapping {
    pub fn new(target: MappingTarget) -> Self {
        Self {
            target,
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, original: &str) -> bool {
        self.entries.contains_key(original)
    }

    pub fn insert(&mut self, original: String, destination: String) {
        self.entries.insert(original, destination);
    }

    /// Merges `other` into `self`; entries from `other` win on key collision.
    pub fn merge(&mut self, other: FileMapping) {
        self.entries.extend(other.entries);
    }

    pub fn missing_paths(&self, descriptors: &[FileDescriptor]) -> BTreeSet<String> {
        descriptors
            .iter()
            .filter(|d| !self.entries.contains_key(&d.path))
            .map(|d| d.path.clone())
            .collect()
    }

    /// Keys that do not belong to any descriptor.
    pub fn unknown_keys(&self, descriptors: &[FileDescriptor]) -> Vec<String> {
        let known: BTreeSet<&str> = descriptors.iter().map(|d| d.path.as_str()).collect();
        self.entries
            .keys()
            .filter(|k| !known.contains(k.as_str()))
            .cloned()
            .collect()
    }

    pub fn retain_known(&mut self, descriptors: &[FileDescriptor]) -> Vec<String> {
        let unknown = self.unknown_keys(descriptors);
        for key in &unknown {
            self.entries.remove(key);
        }
        unknown
    }

    /// Relative path of the file after the move.
    pub fn destination_for(&self, original: &str) -> Option<String> {
        let value = self.entries.get(original)?;
        Some(match self.target {
            MappingTarget::FullPath => value.clone(),
            MappingTarget::Directory => {
                let file_name = original.rsplit('/').next().unwrap_or(original);
                if value.is_empty() {
                    file_name.to_string()
                } else {
                    format!("{value}/{file_name}")
                }
            }
        })
    }

    /// Destination directories referenced by the mapping, in sorted order.
    pub fn destination_directories(&self) -> Vec<String> {
        let dirs: BTreeSet<String> = self
            .entries
            .keys()
            .filter_map(|k| self.destination_for(k))
            .filter_map(|dest| dest.rfind('/').map(|idx| dest[..idx].to_string()))
            .collect();
        dirs.into_iter().collect()
    }

    /// Flattens the mapping to `{original: new relative file path}`.
    pub fn to_relative_paths(&self) -> BTreeMap<String, String> {
        self.entries
            .keys()
            .filter_map(|k| self.destination_for(k).map(|dest| (k.clone(), dest)))
            .collect()
    }

    pub fn resolve(&self, root: &Path) -> ResolvedMapping {
        let entries = self
            .entries
            .keys()
            .filter_map(|original| {
                let dest = self.destination_for(original)?;
                Some(ResolvedMove {
                    source: join_relative(root, original),
                    destination: join_relative(root, dest.trim_start_matches('/')),
                })
            })
            .collect();
        ResolvedMapping {
            root: root.to_path_buf(),
            entries,
        }
    }
}

fn join_relative(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}

/// Ordered set of candidate destination directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryProposal {
    pub directories: Vec<String>,
}

impl DirectoryProposal {
    /// Normalizes and de-duplicates `raw`, dropping entries that are empty,
    /// escape the root, or nest deeper than `max_depth`. Returns the rejects.
    pub fn from_raw(raw: Vec<String>, max_depth: usize) -> (Self, Vec<String>) {
        let mut seen = BTreeSet::new();
        let mut directories = Vec::new();
        let mut rejected = Vec::new();
        for candidate in raw {
            match normalize_relative(&candidate) {
                Some(dir) if relative_depth(&dir) <= max_depth => {
                    if seen.insert(dir.clone()) {
                        directories.push(dir);
                    }
                }
                _ => rejected.push(candidate),
            }
        }
        (Self { directories }, rejected)
    }

    pub fn contains(&self, directory: &str) -> bool {
        self.directories.iter().any(|d| d == directory)
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Absolute source/destination pairs in mapping key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub root: PathBuf,
    pub entries: Vec<ResolvedMove>,
}

impl ResolvedMapping {
    pub fn new(root: impl Into<PathBuf>, pairs: Vec<(PathBuf, PathBuf)>) -> Self {
        Self {
            root: root.into(),
            entries: pairs
                .into_iter()
                .map(|(source, destination)| ResolvedMove {
                    source,
                    destination,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|m| m.source.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors(paths: &[&str]) -> Vec<FileDescriptor> {
        paths.iter().map(|p| FileDescriptor::new(*p)).collect()
    }

    #[test]
    fn missing_paths_reports_unmapped_descriptors() {
        let mut mapping = FileMapping::new(MappingTarget::FullPath);
        mapping.insert("a.txt".to_string(), "docs/a.txt".to_string());

        let missing = mapping.missing_paths(&descriptors(&["a.txt", "b.txt", "c/d.txt"]));
        assert_eq!(
            missing.into_iter().collect::<Vec<_>>(),
            vec!["b.txt".to_string(), "c/d.txt".to_string()]
        );
    }

    #[test]
    fn merge_prefers_incoming_entries() {
        let mut base = FileMapping::new(MappingTarget::Directory);
        base.insert("a.txt".to_string(), "old".to_string());
        let mut repair = FileMapping::new(MappingTarget::Directory);
        repair.insert("a.txt".to_string(), "new".to_string());
        repair.insert("b.txt".to_string(), "new".to_string());

        base.merge(repair);
        assert_eq!(base.entries.get("a.txt").unwrap(), "new");
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn directory_target_appends_file_name() {
        let mut mapping = FileMapping::new(MappingTarget::Directory);
        mapping.insert("inbox/photo.jpg".to_string(), "images/2024".to_string());
        mapping.insert("notes.txt".to_string(), String::new());

        assert_eq!(
            mapping.destination_for("inbox/photo.jpg").unwrap(),
            "images/2024/photo.jpg"
        );
        assert_eq!(mapping.destination_for("notes.txt").unwrap(), "notes.txt");
        assert_eq!(mapping.destination_directories(), vec!["images/2024".to_string()]);
    }

    #[test]
    fn retain_known_drops_invented_keys() {
        let mut mapping = FileMapping::new(MappingTarget::FullPath);
        mapping.insert("a.txt".to_string(), "x/a.txt".to_string());
        mapping.insert("ghost.txt".to_string(), "x/ghost.txt".to_string());

        let dropped = mapping.retain_known(&descriptors(&["a.txt"]));
        assert_eq!(dropped, vec!["ghost.txt".to_string()]);
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn resolve_joins_against_root() {
        let mut mapping = FileMapping::new(MappingTarget::FullPath);
        mapping.insert("a/b.txt".to_string(), "/text/b.txt".to_string());

        let resolved = mapping.resolve(Path::new("/root"));
        assert_eq!(resolved.entries[0].source, PathBuf::from("/root/a/b.txt"));
        assert_eq!(resolved.entries[0].destination, PathBuf::from("/root/text/b.txt"));
    }

    #[test]
    fn directory_proposal_filters_and_dedupes() {
        let raw = vec![
            "/docs/".to_string(),
            "docs".to_string(),
            "a/b/c/d/e".to_string(),
            "../escape".to_string(),
            "images".to_string(),
        ];
        let (proposal, rejected) = DirectoryProposal::from_raw(raw, 4);
        assert_eq!(
            proposal.directories,
            vec!["docs".to_string(), "images".to_string()]
        );
        assert_eq!(rejected.len(), 2);
        assert!(proposal.contains("images"));
    }
}
