use serde::{Deserialize, Serialize};

pub const MAX_CONTENT_SAMPLE_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub path: String,
    pub last_modified: Option<String>,
    pub content_sample: Option<String>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub extension: Option<String>,
    /// Model-written summary from the optional summarize pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_summary: Option<String>,
}

impl FileDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let extension = std::path::Path::new(&path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        Self {
            path,
            last_modified: None,
            content_sample: None,
            size_bytes: 0,
            extension,
            content_summary: None,
        }
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn parent_relative(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }
}
