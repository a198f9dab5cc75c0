use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::AppError;
use crate::models::file_descriptor::{FileDescriptor, MAX_CONTENT_SAMPLE_CHARS};

/// Bytes read from the head of a file when sampling its content.
const SAMPLE_READ_BYTES: u64 = 4096;

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

pub fn compact_snippet(raw: &str) -> Option<String> {
    let compact = raw
        .split_whitespace()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if compact.is_empty() {
        return None;
    }
    Some(compact)
}

/// Reads the head of `path` and returns a whitespace-compacted excerpt of at
/// most `max_chars` characters. Binary files (NUL bytes or invalid UTF-8)
/// yield `None`.
pub fn read_text_excerpt(path: &Path, max_chars: usize) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut buf = Vec::new();
    file.take(SAMPLE_READ_BYTES).read_to_end(&mut buf).ok()?;
    if buf.contains(&0) {
        return None;
    }
    let text = match std::str::from_utf8(&buf) {
        Ok(text) => text,
        // The read may have split a multi-byte character at the end.
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&buf[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };
    let compact = compact_snippet(text)?;
    Some(compact.chars().take(max_chars).collect())
}

pub fn sample_content(path: &Path) -> Option<String> {
    read_text_excerpt(path, MAX_CONTENT_SAMPLE_CHARS)
}

pub fn descriptor_from_path(root: &Path, path: &Path) -> Option<FileDescriptor> {
    let metadata = path.metadata().ok()?;
    let relative = path.strip_prefix(root).ok()?;
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/");
    if relative.is_empty() {
        return None;
    }

    let mut descriptor = FileDescriptor::new(relative);
    descriptor.size_bytes = metadata.len();
    descriptor.last_modified = metadata
        .modified()
        .ok()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());
    descriptor.content_sample = sample_content(path);
    Some(descriptor)
}

/// Walks `root` and returns one descriptor per regular file, sorted by path.
/// Hidden files and directories are skipped.
pub fn collect_descriptors(
    root: &Path,
    max_depth: Option<usize>,
) -> Result<Vec<FileDescriptor>, AppError> {
    if !root.is_dir() {
        return Err(AppError::InvalidInput(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let mut walker = WalkDir::new(root).follow_links(false);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth + 1);
    }

    let mut descriptors = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match descriptor_from_path(root, entry.path()) {
            Some(descriptor) => descriptors.push(descriptor),
            None => warn!(path = %entry.path().display(), "Skipping file without metadata"),
        }
    }

    descriptors.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), files = descriptors.len(), "Collected file descriptors");
    Ok(descriptors)
}

/// Relative directories under `root` (excluding the root itself), sorted.
pub fn list_directories(root: &Path) -> Result<Vec<String>, AppError> {
    if !root.is_dir() {
        return Err(AppError::InvalidInput(format!(
            "not a directory: {}",
            root.display()
        )));
    }
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            dirs.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn collects_relative_paths_sorted_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("b/nested/z.txt"), "zzz").unwrap();
        fs::write(dir.path().join("a.md"), "# Title\n\nbody").unwrap();
        fs::write(dir.path().join(".hidden"), "secret").unwrap();
        fs::write(dir.path().join(".git/config"), "x").unwrap();

        let descriptors = collect_descriptors(dir.path(), None).unwrap();
        let paths: Vec<&str> = descriptors.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b/nested/z.txt"]);
        assert_eq!(descriptors[0].content_sample.as_deref(), Some("# Title body"));
        assert_eq!(descriptors[0].size_bytes, 13);
        assert!(descriptors[0].last_modified.is_some());
    }

    #[test]
    fn max_depth_limits_traversal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("top.txt"), "1").unwrap();
        fs::write(dir.path().join("a/mid.txt"), "2").unwrap();
        fs::write(dir.path().join("a/b/deep.txt"), "3").unwrap();

        let descriptors = collect_descriptors(dir.path(), Some(1)).unwrap();
        let paths: Vec<&str> = descriptors.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["a/mid.txt", "top.txt"]);
    }

    #[test]
    fn binary_files_have_no_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        fs::write(&path, [0u8, 159, 146, 150]).unwrap();
        assert_eq!(sample_content(&path), None);
    }

    #[test]
    fn sample_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.txt");
        fs::write(&path, "word\n".repeat(400)).unwrap();
        assert_eq!(
            sample_content(&path).unwrap().chars().count(),
            MAX_CONTENT_SAMPLE_CHARS
        );
        assert_eq!(read_text_excerpt(&path, 1024).unwrap().chars().count(), 1024);
    }

    #[test]
    fn list_directories_returns_relative_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/old")).unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("docs/a.txt"), "a").unwrap();

        let dirs = list_directories(dir.path()).unwrap();
        assert_eq!(dirs, vec!["docs", "docs/old", "images"]);
    }
}
