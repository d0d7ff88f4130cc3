//! Declarative FFmpeg operations used by the generation pipelines.
//!
//! Command semantics matter for playback compatibility: still-image clips
//! use a fixed frame rate and yuv420p, concat is demuxer-based with stream
//! copy, and muxing uses `-shortest` so the video never outlives the
//! narration track.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Frame rate for still-image clips.
const STILL_CLIP_FPS: u32 = 30;

/// Default wall-clock cap for a single FFmpeg invocation.
const FFMPEG_TIMEOUT_SECS: u64 = 600;

/// Encode a still image as a video clip of `duration_secs`.
///
/// Loops the image, scales to even dimensions (required by yuv420p), and
/// writes H.264 with faststart.
pub async fn still_to_clip(
    image: impl AsRef<Path>,
    output: impl AsRef<Path>,
    duration_secs: f64,
) -> MediaResult<()> {
    let image = image.as_ref();
    if !image.exists() {
        return Err(MediaError::FileNotFound(image.to_path_buf()));
    }
    if duration_secs <= 0.0 {
        return Err(MediaError::invalid_media(format!(
            "non-positive clip duration {duration_secs}"
        )));
    }

    let cmd = FfmpegCommand::new(output.as_ref())
        .input_with_args(["-loop", "1"], image)
        .output_args(["-t", &format!("{duration_secs:.3}")])
        .output_args(["-r", &STILL_CLIP_FPS.to_string()])
        .video_filter("scale=trunc(iw/2)*2:trunc(ih/2)*2")
        .output_args(["-pix_fmt", "yuv420p"])
        .video_codec("libx264")
        .output_args(["-movflags", "+faststart"]);

    FfmpegRunner::new()
        .with_timeout(FFMPEG_TIMEOUT_SECS)
        .run(&cmd)
        .await
}

/// Concatenate same-codec segments with the concat demuxer (stream copy).
///
/// Writes the list file next to the output. Segments must already share
/// codec/container parameters; nothing is re-encoded.
pub async fn concat_media(
    segments: &[PathBuf],
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let output = output.as_ref();

    if segments.is_empty() {
        return Err(MediaError::invalid_media("no segments to concatenate"));
    }
    for segment in segments {
        if !segment.exists() {
            return Err(MediaError::FileNotFound(segment.clone()));
        }
    }

    let list_path = output.with_extension("concat.txt");
    let list = segments
        .iter()
        .map(|p| format!("file '{}'", p.to_string_lossy().replace('\'', r"'\''")))
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&list_path, list).await?;
    debug!("Wrote concat list: {}", list_path.display());

    let cmd = FfmpegCommand::new(output)
        .input_with_args(["-f", "concat", "-safe", "0"], &list_path)
        .output_args(["-c", "copy"])
        .output_args(["-movflags", "+faststart"]);

    let result = FfmpegRunner::new()
        .with_timeout(FFMPEG_TIMEOUT_SECS)
        .run(&cmd)
        .await;

    let _ = fs::remove_file(&list_path).await;
    result
}

/// Mux a silent video stream with an audio track.
///
/// Video is stream-copied, audio re-encoded to AAC; `-shortest` trims to
/// the shorter stream.
pub async fn mux_video_audio(
    video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    let audio = audio.as_ref();
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    if !audio.exists() {
        return Err(MediaError::FileNotFound(audio.to_path_buf()));
    }

    let cmd = FfmpegCommand::new(output.as_ref())
        .input(video)
        .input(audio)
        .video_codec("copy")
        .audio_codec("aac")
        .output_arg("-shortest")
        .output_args(["-movflags", "+faststart"]);

    FfmpegRunner::new()
        .with_timeout(FFMPEG_TIMEOUT_SECS)
        .run(&cmd)
        .await
}

/// Extract the last frame of a video as a JPEG.
///
/// Seeks near end-of-file and emits exactly one frame; used to condition
/// the next segment's generation on where the previous one ended.
pub async fn extract_last_frame(
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }

    let cmd = FfmpegCommand::new(output.as_ref())
        .input_with_args(["-sseof", "-0.25"], video)
        .single_frame()
        .output_args(["-q:v", "2"])
        .output_args(["-update", "1"]);

    FfmpegRunner::new()
        .with_timeout(FFMPEG_TIMEOUT_SECS)
        .run(&cmd)
        .await?;

    if !output.as_ref().exists() {
        return Err(MediaError::invalid_media(format!(
            "last-frame extraction produced no file for {}",
            video.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_still_to_clip_rejects_missing_image() {
        let err = still_to_clip("/nope.png", "/tmp/out.mp4", 4.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_still_to_clip_rejects_zero_duration() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.png");
        tokio::fs::write(&image, b"png").await.unwrap();

        let err = still_to_clip(&image, dir.path().join("out.mp4"), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia(_)));
    }

    #[tokio::test]
    async fn test_concat_rejects_empty_list() {
        let err = concat_media(&[], "/tmp/out.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia(_)));
    }

    #[tokio::test]
    async fn test_concat_rejects_missing_segment() {
        let segments = vec![PathBuf::from("/missing/seg-1.mp4")];
        let err = concat_media(&segments, "/tmp/out.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
