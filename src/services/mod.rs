pub mod checkpoint_service;
pub mod cleanup_service;
pub mod collector_service;
pub mod conflict_service;
pub mod model_service;
pub mod move_service;
pub mod proposal_service;
pub mod reconcile_service;
pub mod summary_service;
