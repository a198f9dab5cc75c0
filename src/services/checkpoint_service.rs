use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AppError;
use crate::models::mapping::{FileMapping, MappingTarget};
use crate::scope_path::{clean_relative, normalize_lexical};

/// Saves the mapping as `{original: new relative file path}`.
pub fn write_checkpoint(path: &Path, mapping: &FileMapping) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&mapping.to_relative_paths())?)?;
    info!(path = %path.display(), entries = mapping.len(), "Wrote proposed structure");
    Ok(())
}

pub fn read_checkpoint(path: &Path) -> Result<FileMapping, AppError> {
    let raw = fs::read_to_string(path)?;
    let entries: BTreeMap<String, String> = serde_json::from_str(&raw)?;

    let mut mapping = FileMapping::new(MappingTarget::FullPath);
    for (original, destination) in entries {
        let (Some(key), Some(value)) = (clean_relative(&original), clean_relative(&destination))
        else {
            return Err(AppError::InvalidInput(format!(
                "checkpoint entry escapes the root: '{original}' -> '{destination}'"
            )));
        };
        mapping.insert(key, value);
    }
    info!(path = %path.display(), entries = mapping.len(), "Loaded proposed structure");
    Ok(mapping)
}

/// Root-relative `/`-joined path of `path` when it lies under `root`.
/// Relative paths are taken from the current directory.
pub fn relative_to_root(root: &Path, path: &Path) -> Option<String> {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    let absolute = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| normalize_lexical(&absolute)),
        _ => normalize_lexical(&absolute),
    };
    let relative = absolute.strip_prefix(root).ok()?;
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    (!joined.is_empty()).then_some(joined)
}
