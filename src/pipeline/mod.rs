pub mod compositor;
pub mod orchestrator;
pub mod progress;
