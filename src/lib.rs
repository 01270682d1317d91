// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod cluster;
pub mod config;
pub mod features;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod sink;

// Orchestration, alerting & background jobs
pub mod notify;
pub mod orchestrator;
pub mod scheduler;

pub mod bootstrap;

// ---- Re-exports for stable public API ----
pub use crate::config::PipelineConfig;
pub use crate::orchestrator::{Orchestrator, RunError, RunState};
pub use crate::pipeline::{ClusteringPipeline, RunOutcome};
