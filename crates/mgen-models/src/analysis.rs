//! Vision analysis payloads.
//!
//! The analysis stage requires a schema-validated JSON response: either a
//! recognized-object payload or a scripted-scene payload with 1–3 ordered
//! segments. The `JsonSchema` derives feed the strict `response_format`
//! handed to the vision endpoint; the generation logic depends on these
//! exact field names.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Maximum number of segments a scene script may carry.
pub const MAX_SCRIPT_SEGMENTS: usize = 3;

/// Errors raised while validating an analysis payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("script has no segments")]
    EmptyScript,

    #[error("script has {0} segments, maximum is {MAX_SCRIPT_SEGMENTS}")]
    TooManySegments(usize),

    #[error("segment {0} has an empty generation prompt")]
    EmptyPrompt(usize),
}

/// A single object identified in the reference image.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ObjectMatch {
    /// Canonical object name
    pub name: String,

    /// Object category, when the model can classify it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Model confidence in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Additional matching metadata, passed through verbatim
    #[serde(flatten)]
    pub metadata: HashMap<String, Value>,
}

/// Object-recognition analysis result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ObjectRecognition {
    /// The object matched against the reference image
    pub matched_object: ObjectMatch,
}

/// One ordered segment of a scripted scene.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneSegment {
    /// Generation prompt for this segment
    pub prompt: String,

    /// Narration text spoken over this segment
    pub narration: String,

    /// Suggested segment duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

/// A scripted scene: 1–3 ordered segments plus scene-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneScript {
    /// Scene title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Difficulty rating echoed from the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,

    /// Ordered segments; segment k+1 is conditioned on segment k's output
    pub segments: Vec<SceneSegment>,
}

impl SceneScript {
    /// Validate segment count and prompts.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.segments.is_empty() {
            return Err(AnalysisError::EmptyScript);
        }
        if self.segments.len() > MAX_SCRIPT_SEGMENTS {
            return Err(AnalysisError::TooManySegments(self.segments.len()));
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if segment.prompt.trim().is_empty() {
                return Err(AnalysisError::EmptyPrompt(i + 1));
            }
        }
        Ok(())
    }

    /// Concatenated narration for single-track audio synthesis.
    pub fn full_narration(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.narration.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
