pub mod organize_pipeline;
pub mod render;
