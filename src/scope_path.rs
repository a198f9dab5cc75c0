use std::path::{Component, Path, PathBuf};

pub fn normalize(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

/// Resolves `.` and `..` segments and redundant separators without touching
/// the filesystem. Comparison stays case-sensitive.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => true,
                    _ => false,
                };
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Normalizes a model-supplied relative path to `a/b/c` form, tolerating
/// surrounding whitespace and backslash separators. Returns `None` for empty paths
/// and paths that climb out of the root.
pub fn normalize_relative(path: &str) -> Option<String> {
    clean_relative(&normalize(path.trim()))
}

/// Resolves `.`/`..` and empty segments of a `/`-separated relative path.
/// Segment text is kept byte for byte.
pub fn clean_relative(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() || segments.iter().all(|s| s.trim().is_empty()) {
        return None;
    }
    Some(segments.join("/"))
}

pub fn relative_depth(relative: &str) -> usize {
    relative.split('/').filter(|s| !s.is_empty()).count()
}

pub fn is_within_scope(path: &str, root: &str) -> bool {
    let path = normalize(path);
    let root = normalize(root);

    if path == root {
        return true;
    }

    if root == "/" {
        return path.starts_with('/');
    }

    if cfg!(windows) {
        let path_lower = path.to_ascii_lowercase();
        let root_lower = root.to_ascii_lowercase();
        return path_lower.starts_with(&(root_lower + "/"));
    }

    path.starts_with(&(root + "/"))
}

pub fn is_path_within(path: &Path, root: &Path) -> bool {
    let path = normalize_lexical(path);
    let root = normalize_lexical(root);
    is_within_scope(&path.to_string_lossy(), &root.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_trailing_slashes() {
        assert_eq!(normalize("/foo/bar/"), "/foo/bar");
        assert_eq!(normalize("/foo/bar///"), "/foo/bar");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn normalize_converts_backslashes() {
        assert_eq!(normalize("C:\\Users\\test"), "C:/Users/test");
    }

    #[test]
    fn lexical_normalization_resolves_dot_segments() {
        assert_eq!(
            normalize_lexical(Path::new("/x/./y/../a.txt")),
            PathBuf::from("/x/a.txt")
        );
        assert_eq!(
            normalize_lexical(Path::new("/x//a.txt")),
            PathBuf::from("/x/a.txt")
        );
        assert_eq!(normalize_lexical(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_lexical(Path::new("../a")), PathBuf::from("../a"));
    }

    #[test]
    fn normalize_relative_rejects_escapes() {
        assert_eq!(normalize_relative("./docs//a.txt"), Some("docs/a.txt".to_string()));
        assert_eq!(normalize_relative("/images/"), Some("images".to_string()));
        assert_eq!(normalize_relative("a/../b.txt"), Some("b.txt".to_string()));
        assert_eq!(normalize_relative("../outside.txt"), None);
        assert_eq!(normalize_relative("  "), None);
        assert_eq!(normalize_relative("/"), None);
    }

    #[test]
    fn clean_relative_keeps_segment_text() {
        assert_eq!(clean_relative("docs/report.txt "), Some("docs/report.txt ".to_string()));
        assert_eq!(clean_relative("a\\b.txt"), Some("a\\b.txt".to_string()));
        assert_eq!(clean_relative("./x/../y"), Some("y".to_string()));
        assert_eq!(clean_relative("../y"), None);
        assert_eq!(clean_relative(" "), None);
    }

    #[test]
    fn within_scope_exact_match() {
        assert!(is_within_scope("/foo/bar", "/foo/bar"));
        assert!(is_within_scope("/foo/bar/", "/foo/bar"));
    }

    #[test]
    fn within_scope_child_path() {
        assert!(is_within_scope("/foo/bar/baz", "/foo/bar"));
        assert!(!is_within_scope("/foo/barbaz", "/foo/bar"));
    }

    #[test]
    fn within_scope_root() {
        assert!(is_within_scope("/anything", "/"));
        assert!(!is_within_scope("/anything", "/other"));
    }

    #[test]
    fn path_within_resolves_parent_segments() {
        assert!(is_path_within(Path::new("/root/a/../b"), Path::new("/root")));
        assert!(!is_path_within(Path::new("/root/../etc"), Path::new("/root")));
    }
}
