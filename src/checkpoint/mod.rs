//! Persistence for incremental reruns.
//!
//! - [`CheckpointStore`]: emitted pairs, used to skip completed work
//! - [`FailureLog`]: failed prompts, replayed once at the start of each run

mod failures;
mod store;

pub use failures::*;
pub use store::*;
