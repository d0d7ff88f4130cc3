//! FFmpeg CLI wrapper for media compositing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeout/kill
//! - ffprobe duration/stream inspection
//! - Still-image→clip conversion, demuxer concat, audio/video mux,
//!   last-frame extraction
//! - Caption layout (char-width word wrap) flattened onto images via
//!   drawtext, PNG output
//! - Workdir and atomic-write filesystem helpers

pub mod caption;
pub mod command;
pub mod compose;
pub mod error;
pub mod fs;
pub mod probe;

pub use caption::{compose_caption, CaptionLayout, CaptionStyle};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{concat_media, extract_last_frame, mux_video_audio, still_to_clip};
pub use error::{MediaError, MediaResult};
pub use fs::{ensure_workdir, write_atomic};
pub use probe::{get_duration, probe_media, MediaInfo};
