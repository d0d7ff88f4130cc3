//! Media engine and artifact fetcher seams.
//!
//! The pipeline drives FFmpeg and remote downloads through these traits so
//! tests can substitute scripted fakes; production wires `FfmpegEngine`
//! and `HttpFetcher`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mgen_media::{CaptionStyle, MediaResult};
use mgen_net::{download_bytes, NetResult, ResilientClient, RetryPolicy};

/// Media operations the pipeline depends on.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Encode a still image as a clip of `duration_secs`.
    async fn still_to_clip(
        &self,
        image: &Path,
        output: &Path,
        duration_secs: f64,
    ) -> MediaResult<()>;

    /// Concatenate same-codec segments (stream copy).
    async fn concat(&self, segments: &[PathBuf], output: &Path) -> MediaResult<()>;

    /// Mux a silent video with an audio track (`-shortest`).
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()>;

    /// Extract the last frame of a clip as JPEG.
    async fn extract_last_frame(&self, video: &Path, output: &Path) -> MediaResult<()>;

    /// Flatten a caption onto an image (PNG output).
    async fn compose_caption(&self, image: &Path, text: &str, output: &Path)
        -> MediaResult<()>;

    /// Duration of a media file in seconds.
    async fn media_duration(&self, path: &Path) -> MediaResult<f64>;
}

/// FFmpeg-backed engine.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    caption_style: CaptionStyle,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_caption_style(mut self, style: CaptionStyle) -> Self {
        self.caption_style = style;
        self
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn still_to_clip(
        &self,
        image: &Path,
        output: &Path,
        duration_secs: f64,
    ) -> MediaResult<()> {
        mgen_media::still_to_clip(image, output, duration_secs).await
    }

    async fn concat(&self, segments: &[PathBuf], output: &Path) -> MediaResult<()> {
        mgen_media::concat_media(segments, output).await
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        mgen_media::mux_video_audio(video, audio, output).await
    }

    async fn extract_last_frame(&self, video: &Path, output: &Path) -> MediaResult<()> {
        mgen_media::extract_last_frame(video, output).await
    }

    async fn compose_caption(
        &self,
        image: &Path,
        text: &str,
        output: &Path,
    ) -> MediaResult<()> {
        mgen_media::compose_caption(image, text, output, &self.caption_style).await
    }

    async fn media_duration(&self, path: &Path) -> MediaResult<f64> {
        mgen_media::get_duration(path).await
    }
}

/// Remote artifact fetcher.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` fully into memory.
    async fn fetch(&self, url: &str) -> NetResult<Vec<u8>>;
}

/// Fetcher backed by the resilient downloader.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: ResilientClient,
    policy: RetryPolicy,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            client: ResilientClient::new(),
            policy: RetryPolicy::download(),
        }
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> NetResult<Vec<u8>> {
        download_bytes(&self.client, url, &self.policy).await
    }
}
