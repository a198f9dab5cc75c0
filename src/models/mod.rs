pub mod file_descriptor;
pub mod mapping;
pub mod report;
pub mod tree;
