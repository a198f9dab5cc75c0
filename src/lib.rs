pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod safety;
pub mod scope_path;
pub mod services;

pub use commands::organize_pipeline::{run_pipeline, PipelineOutcome, PipelineStatus, Preview};
pub use config::OrganizerConfig;
pub use error::AppError;
pub use services::model_service::{ModelClient, OpenAiCompatibleClient};
