//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base directory for per-task working directories
    pub work_dir: String,
    /// Whether finished artifacts are re-uploaded to durable storage
    pub promote_to_durable: bool,
    /// Wall-clock cap for a single FFmpeg invocation
    pub ffmpeg_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: "/tmp/mgen".to_string(),
            promote_to_durable: true,
            ffmpeg_timeout: Duration::from_secs(600),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("MGEN_WORK_DIR").unwrap_or_else(|_| "/tmp/mgen".to_string()),
            promote_to_durable: std::env::var("MGEN_PROMOTE_TO_DURABLE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("MGEN_FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}
