//! LLM backend client module.

mod caller;
mod openai;

pub use caller::*;
pub use openai::*;
