//! Media generation pipeline worker.
//!
//! Given a user reference image and a target description, drives vision
//! analysis, asset generation against external providers, and FFmpeg
//! compositing into a final video, with per-step progress persisted to
//! the task repository and poll-based status for clients.

pub mod artifacts;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod progress;
pub mod promote;
pub mod status;

pub use config::WorkerConfig;
pub use engine::{Fetcher, FfmpegEngine, HttpFetcher, MediaEngine};
pub use error::{WorkerError, WorkerResult};
pub use lifecycle::TaskLifecycleController;
pub use logging::TaskLogger;
pub use pipeline::{GenerationPipeline, PipelineContext};
pub use plan::PipelinePlan;
pub use progress::ProgressTracker;
pub use status::{StatusEnvelope, StatusQueryService};
