pub mod executor;
pub mod fallback;
pub mod orchestrator;
pub mod probe;
