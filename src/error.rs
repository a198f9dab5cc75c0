#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Model connection error: {0}")]
    Connection(String),

    #[error("Malformed model response: {0}")]
    Malformed(String),

    #[error("{} files missing from proposed structure", .0.len())]
    IncompleteMapping(Vec<String>),

    #[error("Destination conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    General(String),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::IncompleteMapping(_) => 2,
            _ => 1,
        }
    }

    pub fn guidance(&self) -> &'static [&'static str] {
        match self {
            Self::Connection(_) => &[
                "Check your API key",
                "Verify the port number if using a local model",
                "Ensure the model server is running",
                "Check your internet connection",
            ],
            Self::Malformed(_) => &[
                "Try a more capable model",
                "Use --format compact to shrink the prompt",
            ],
            Self::IncompleteMapping(_) => &[
                "Re-run to get a fresh proposal",
                "Use --leave-unmapped to keep unmapped files in place",
            ],
            _ => &[],
        }
    }
}
