use std::path::Path;

use crate::error::AppError;

const PROTECTED_ROOTS: &[&str] = &[
    "/",
    "/Applications",
    "/bin",
    "/sbin",
    "/usr",
    "/System",
    "/Library",
    "/etc",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
];

pub fn is_protected_path(path: &str) -> bool {
    let normalized = normalize_path_for_match(path);
    PROTECTED_ROOTS.iter().any(|root| {
        let root_normalized = normalize_path_for_match(root);
        if root_normalized == "/" {
            return normalized == "/";
        }
        if is_windows_style_path(&root_normalized) {
            let normalized_lower = normalized.to_ascii_lowercase();
            let root_lower = root_normalized.to_ascii_lowercase();
            normalized_lower == root_lower
                || normalized_lower.starts_with(&format!("{root_lower}/"))
        } else {
            normalized == root_normalized || normalized.starts_with(&format!("{root_normalized}/"))
        }
    })
}

fn normalize_path_for_match(path: &str) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

fn is_windows_style_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}

pub fn validate_not_protected(path: &str) -> Result<(), AppError> {
    if is_protected_path(path) {
        return Err(AppError::InvalidInput(format!(
            "operation on protected path not allowed: {path}"
        )));
    }
    Ok(())
}

/// The organization root must be an existing, unprotected directory.
pub fn validate_root(root: &Path) -> Result<(), AppError> {
    let display = root.to_string_lossy();
    if display.is_empty() {
        return Err(AppError::InvalidInput("target directory is empty".to_string()));
    }
    if !root.is_dir() {
        return Err(AppError::InvalidInput(format!(
            "target is not a directory: {display}"
        )));
    }
    validate_not_protected(&display)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_paths() {
        assert!(is_protected_path("/"));
        assert!(is_protected_path("/bin"));
        assert!(is_protected_path("/Applications"));
        assert!(is_protected_path("/usr/local/bin"));
        assert!(is_protected_path("C:\\Program Files (x86)\\Common Files"));
        assert!(is_protected_path("c:\\program files\\Common Files"));
        assert!(is_protected_path("C:/WINDOWS/System32"));
        assert!(!is_protected_path("/Users/test"));
        assert!(!is_protected_path("C:/Users/test"));
        assert!(!is_protected_path("/tmp"));
    }

    #[test]
    fn test_validate_not_protected() {
        assert!(validate_not_protected("/Users/test").is_ok());
        assert!(validate_not_protected("/bin").is_err());
        assert!(validate_not_protected("/System/Library").is_err());
    }

    #[test]
    fn test_validate_root_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_root(dir.path()).is_ok());

        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(validate_root(&file).is_err());
        assert!(validate_root(&dir.path().join("missing")).is_err());
    }
}
