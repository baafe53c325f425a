//! qagen - Q/A fine-tuning pair extraction from README-style documentation.
//!
//! ## Pipeline
//!
//! A document is segmented into titled sections and fenced code snippets
//! with surrounding context. Each unit drives one or more question→answer
//! rounds against a chat-completion backend, bounded by a concurrency cap
//! and rate-limit backoff. Validated pairs are appended to a JSONL
//! checkpoint store so reruns only touch new work; prompts whose answer
//! step failed are logged and replayed once on the next run.
//!
//! ## Variants
//!
//! One orchestrator serves both the batch CLI and a service front end: the
//! difference is the injected [`pipeline::ProgressSink`].

pub mod checkpoint;
pub mod client;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod segment;
pub mod validate;

// Re-exports for convenience
pub use checkpoint::{CheckpointStore, FailureLog, SkipSets};
pub use client::{ChatBackend, ChatClient, RateLimitedCaller};
pub use models::{Config, FailedPrompt, QaPair, QagenError, Result, RunStats, Snippet};
pub use pipeline::{ChannelSink, NoopSink, Pipeline, PipelineReport, ProgressSink};
pub use validate::{DenylistValidator, Validate};
