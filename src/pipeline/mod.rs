//! Extraction pipeline: orchestration and progress reporting.

mod orchestrator;
mod progress;

pub use orchestrator::*;
pub use progress::*;
