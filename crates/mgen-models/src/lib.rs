//! Shared data models for the MotionGen generation backend.
//!
//! This crate provides:
//! - Task record types (status, options, result payloads)
//! - Pipeline step enum with progress percentage bands
//! - Vision analysis payloads (object recognition, scene scripts)

pub mod analysis;
pub mod step;
pub mod task;

pub use analysis::{
    AnalysisError, ObjectMatch, ObjectRecognition, SceneScript, SceneSegment, MAX_SCRIPT_SEGMENTS,
};
pub use step::{Progress, Step};
pub use task::{GenerationOptions, PipelineKind, Task, TaskId, TaskResult, TaskStatus};
