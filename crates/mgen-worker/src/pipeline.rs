//! Generation pipeline orchestration.
//!
//! One parameterized pipeline covers every provider variant; a
//! `PipelinePlan` selects the shape. The shared stages:
//!
//! 1. Prepare — per-task workdir, reference image normalized to a durable URL
//! 2. Analyze — schema-validated vision call (semantic failure is fatal)
//! 3. Generate — images in parallel, or video segments strictly in
//!    sequence because segment k+1 is conditioned on segment k's last frame
//! 4. Post-process — caption compositing, narration synthesis
//! 5. Mux — stills→clips→concat→mux, or stream-copy concat of clips
//! 6. Finalize — one atomic Success write carrying the result

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use mgen_media::{ensure_workdir, write_atomic};
use mgen_models::{PipelineKind, Step, Task, TaskId, TaskResult, TaskStatus};
use mgen_providers::{
    ImageGenerator, JobPoll, SpeechSynthesizer, VideoGenerator, VisionAnalyzer,
};
use mgen_storage::{media_key, BlobStore};
use mgen_tasks::{CreditLedger, TaskRepository};
use tracing::{info, warn};

use crate::artifacts::{
    captioned_image, chain_frame, content_type_for, original_image, segment_clip, slide_clip,
    FINAL_VIDEO, NARRATION_AUDIO, REFERENCE_IMAGE, SILENT_SLIDESHOW,
};
use crate::config::WorkerConfig;
use crate::engine::{Fetcher, MediaEngine};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;
use crate::plan::PipelinePlan;
use crate::progress::ProgressTracker;

/// Shared collaborators injected into pipelines and the lifecycle
/// controller.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub repo: Arc<dyn TaskRepository>,
    pub store: Arc<dyn BlobStore>,
    pub ledger: Arc<dyn CreditLedger>,
    pub vision: Arc<dyn VisionAnalyzer>,
    pub images: Arc<dyn ImageGenerator>,
    pub videos: Arc<dyn VideoGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub engine: Arc<dyn MediaEngine>,
    pub fetcher: Arc<dyn Fetcher>,
}

/// One provider variant's pipeline.
pub struct GenerationPipeline {
    plan: PipelinePlan,
    ctx: Arc<PipelineContext>,
}

/// Retry a stage-level operation with linear backoff.
///
/// Stage retries are invisible to callers; only retryable errors are
/// reattempted, and the last error surfaces once attempts run out.
async fn retry_stage<T, F, Fut>(
    attempts: u32,
    delay: Duration,
    what: &str,
    op: F,
) -> WorkerResult<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = WorkerResult<T>>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(
                    stage = %what,
                    attempt,
                    "stage attempt failed, retrying: {e}"
                );
                tokio::time::sleep(delay.saturating_mul(attempt)).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.expect("retry loop ran at least once"))
}

impl GenerationPipeline {
    pub fn new(plan: PipelinePlan, ctx: Arc<PipelineContext>) -> Self {
        Self { plan, ctx }
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    /// Run the pipeline for `task_id` to completion.
    ///
    /// On success the terminal Success write (status + 100% progress +
    /// result) has been persisted atomically. Errors are returned to the
    /// supervising caller, which owns failure persistence and refund
    /// bookkeeping.
    pub async fn run(&self, task_id: &TaskId) -> WorkerResult<TaskResult> {
        let task = self
            .ctx
            .repo
            .find(task_id)
            .await?
            .ok_or_else(|| WorkerError::TaskNotFound(task_id.to_string()))?;

        let operation = match self.plan.kind {
            PipelineKind::VideoChain => "video_chain",
            PipelineKind::ImageSlideshow => "image_slideshow",
        };
        let logger = TaskLogger::new(&task.id, operation);
        logger.log_start(&format!("provider={} model={}", task.provider, task.model));

        let tracker = ProgressTracker::new(
            task.id.clone(),
            Arc::clone(&self.ctx.repo),
            task.progress.clone(),
        );

        let workdir = ensure_workdir(&self.ctx.config.work_dir, task.id.as_str()).await?;
        let reference_url = self.prepare_reference(&task, &workdir).await?;

        tracker.advance(Step::Analyzing).await?;

        let result = match self.plan.kind {
            PipelineKind::VideoChain => {
                self.run_video_chain(&task, &tracker, &workdir, &reference_url, &logger)
                    .await?
            }
            PipelineKind::ImageSlideshow => {
                self.run_image_slideshow(&task, &tracker, &workdir, &reference_url, &logger)
                    .await?
            }
        };

        // The only Success publication: atomic, and only after every
        // referenced file was fully written and uploaded.
        let mut progress = tracker.snapshot().await;
        progress.advance(Step::Completed, Step::Completed.default_message());
        self.ctx
            .repo
            .set_outcome(&task.id, TaskStatus::Success, &progress, &result)
            .await?;

        logger.log_completion("final artifact published");
        Ok(result)
    }

    /// Normalize the caller's reference image into a durable URL.
    ///
    /// Client-supplied URLs can be transient; the bytes are fetched once,
    /// kept in the workdir, and re-uploaded so later stages never depend
    /// on the original location.
    async fn prepare_reference(
        &self,
        task: &Task,
        workdir: &Path,
    ) -> WorkerResult<String> {
        let source = task
            .options
            .reference_image_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| WorkerError::validation("reference image is required"))?;

        let bytes = self.ctx.fetcher.fetch(source).await?;
        let local = workdir.join(REFERENCE_IMAGE);
        write_atomic(&local, &bytes).await?;

        let key = media_key(Utc::now(), task.id.as_str(), REFERENCE_IMAGE)
            .map_err(WorkerError::Storage)?;
        let durable = self
            .ctx
            .store
            .upload(bytes, &key, content_type_for(REFERENCE_IMAGE))
            .await?;

        info!(task_id = %task.id, url = %durable, "reference image normalized");
        Ok(durable)
    }

    /// Upload a finished workdir file, returning its durable URL.
    async fn publish_file(
        &self,
        task_id: &TaskId,
        path: &Path,
        filename: &str,
    ) -> WorkerResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let key = media_key(Utc::now(), task_id.as_str(), filename)
            .map_err(WorkerError::Storage)?;
        Ok(self
            .ctx
            .store
            .upload(bytes, &key, content_type_for(filename))
            .await?)
    }

    // =========================================================================
    // Video chain
    // =========================================================================

    async fn run_video_chain(
        &self,
        task: &Task,
        tracker: &ProgressTracker,
        workdir: &Path,
        reference_url: &str,
        logger: &TaskLogger,
    ) -> WorkerResult<TaskResult> {
        let script = self
            .ctx
            .vision
            .analyze_scene(
                reference_url,
                &task.options.target,
                task.options.difficulty.as_deref(),
            )
            .await?;
        let analysis = serde_json::to_value(&script)
            .map_err(|e| WorkerError::analysis_failed(e.to_string()))?;

        let total = script.segments.len() as u32;
        let aspect = task.options.aspect_ratio.as_deref();
        logger.log_stage(&format!("script has {total} segments"));

        // Segments are strictly sequential: segment k+1 is conditioned on
        // the last frame of segment k, never on the original reference.
        let mut conditioning_url = reference_url.to_string();
        let mut clips = Vec::with_capacity(script.segments.len());

        for (i, segment) in script.segments.iter().enumerate() {
            let index = i as u32 + 1;
            tracker
                .advance(Step::GeneratingAsset { index, total })
                .await?;

            let clip = self
                .generate_segment(task, workdir, index, &segment.prompt, &conditioning_url, aspect)
                .await?;

            if index < total {
                tracker
                    .advance(Step::ExtractingFrame { index, total })
                    .await?;
                conditioning_url = self.chain_next_frame(task, workdir, index, &clip).await?;
            }

            clips.push(clip);
        }

        tracker.advance(Step::Merging).await?;
        let final_path = workdir.join(FINAL_VIDEO);
        self.ctx.engine.concat(&clips, &final_path).await?;

        let video_url = self.publish_file(&task.id, &final_path, FINAL_VIDEO).await?;

        let mut result = TaskResult::default();
        result.video_url = Some(video_url);
        result.analysis = Some(analysis);
        Ok(result)
    }

    /// Generate one segment, retrying the whole attempt on failure.
    async fn generate_segment(
        &self,
        task: &Task,
        workdir: &Path,
        index: u32,
        prompt: &str,
        conditioning_url: &str,
        aspect: Option<&str>,
    ) -> WorkerResult<PathBuf> {
        retry_stage(
            self.plan.segment_attempts,
            self.plan.stage_retry_delay,
            "generate_segment",
            |attempt| async move {
                info!(
                    task_id = %task.id,
                    segment = index,
                    attempt,
                    "generating video segment"
                );
                let job_id = self
                    .ctx
                    .videos
                    .submit(prompt, conditioning_url, aspect)
                    .await?;
                let output_url = self.await_video_job(&job_id).await?;

                let bytes = self.ctx.fetcher.fetch(&output_url).await?;
                let path = workdir.join(segment_clip(index));
                write_atomic(&path, &bytes).await?;
                Ok(path)
            },
        )
        .await
    }

    /// Poll a generation job until terminal state, under two independent
    /// bounds: a wall-clock cap per attempt, and a cap on consecutive
    /// poll failures.
    async fn await_video_job(&self, job_id: &str) -> WorkerResult<String> {
        let started = Instant::now();
        let mut consecutive_failures = 0u32;

        loop {
            if started.elapsed() >= self.plan.max_generation_wait {
                return Err(WorkerError::GenerationTimeout(
                    self.plan.max_generation_wait.as_secs(),
                ));
            }

            tokio::time::sleep(self.plan.poll_interval).await;

            match self.ctx.videos.poll(job_id).await {
                Ok(JobPoll::Completed { output_url }) => return Ok(output_url),
                Ok(JobPoll::Failed { reason }) => {
                    return Err(WorkerError::generation_failed(format!(
                        "job {job_id} failed upstream: {reason}"
                    )))
                }
                Ok(_) => {
                    consecutive_failures = 0;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.plan.max_poll_failures {
                        return Err(WorkerError::generation_failed(format!(
                            "job {job_id}: {consecutive_failures} consecutive poll failures, last: {e}"
                        )));
                    }
                    warn!(job_id = %job_id, consecutive_failures, "poll failed: {e}");
                }
            }
        }
    }

    /// Extract the last frame of `clip` and upload it as the next
    /// segment's conditioning image.
    async fn chain_next_frame(
        &self,
        task: &Task,
        workdir: &Path,
        index: u32,
        clip: &Path,
    ) -> WorkerResult<String> {
        let frame_name = chain_frame(index);
        let frame_path = workdir.join(&frame_name);
        self.ctx.engine.extract_last_frame(clip, &frame_path).await?;
        self.publish_file(&task.id, &frame_path, &frame_name).await
    }

    // =========================================================================
    // Image slideshow
    // =========================================================================

    async fn run_image_slideshow(
        &self,
        task: &Task,
        tracker: &ProgressTracker,
        workdir: &Path,
        reference_url: &str,
        logger: &TaskLogger,
    ) -> WorkerResult<TaskResult> {
        let script = self
            .ctx
            .vision
            .analyze_scene(
                reference_url,
                &task.options.target,
                task.options.difficulty.as_deref(),
            )
            .await?;
        let analysis = serde_json::to_value(&script)
            .map_err(|e| WorkerError::analysis_failed(e.to_string()))?;

        let total = script.segments.len() as u32;
        let aspect = task.options.aspect_ratio.as_deref();
        logger.log_stage(&format!("generating {total} images in parallel"));

        // Images are independent: generate concurrently, each with its own
        // bounded retries, into index-named files.
        let generation = script.segments.iter().enumerate().map(|(i, segment)| {
            let index = i as u32 + 1;
            let prompt = segment.prompt.clone();
            async move {
                let path = self
                    .generate_image(workdir, index, &prompt, reference_url, aspect)
                    .await?;
                tracker
                    .advance(Step::GeneratingAsset { index, total })
                    .await?;
                Ok::<(u32, PathBuf), WorkerError>((index, path))
            }
        });

        let mut originals = Vec::with_capacity(script.segments.len());
        for outcome in futures::future::join_all(generation).await {
            originals.push(outcome?);
        }
        originals.sort_by_key(|(index, _)| *index);

        // Originals are persisted durably before any compositing touches
        // them.
        let mut original_urls = Vec::with_capacity(originals.len());
        for (index, path) in &originals {
            let url = self
                .publish_file(&task.id, path, &original_image(*index))
                .await?;
            original_urls.push(url);
        }

        tracker.advance(Step::Compositing).await?;
        let mut captioned = Vec::with_capacity(originals.len());
        for ((index, path), segment) in originals.iter().zip(&script.segments) {
            let out = workdir.join(captioned_image(*index));
            self.ctx
                .engine
                .compose_caption(path, &segment.narration, &out)
                .await?;
            captioned.push((*index, out));
        }

        tracker.advance(Step::Synthesizing).await?;
        let voice = task
            .options
            .voice
            .clone()
            .unwrap_or_else(|| self.plan.default_voice.clone());
        let audio_bytes = self
            .ctx
            .speech
            .synthesize(&script.full_narration(), &voice)
            .await?;
        let audio_path = workdir.join(NARRATION_AUDIO);
        write_atomic(&audio_path, &audio_bytes).await?;

        tracker.advance(Step::Merging).await?;
        let final_path = self
            .mux_slideshow(workdir, &captioned, &audio_path)
            .await?;

        let video_url = self.publish_file(&task.id, &final_path, FINAL_VIDEO).await?;
        let audio_url = self
            .publish_file(&task.id, &audio_path, NARRATION_AUDIO)
            .await?;
        let mut image_urls = Vec::with_capacity(captioned.len());
        for (index, path) in &captioned {
            let url = self
                .publish_file(&task.id, path, &captioned_image(*index))
                .await?;
            image_urls.push(url);
        }

        let mut result = TaskResult::default();
        result.video_url = Some(video_url);
        result.image_urls = image_urls;
        result.audio_url = Some(audio_url);
        result.original_image_urls = original_urls;
        result.analysis = Some(analysis);
        Ok(result)
    }

    /// Generate one image with bounded retries and persist the original.
    async fn generate_image(
        &self,
        workdir: &Path,
        index: u32,
        prompt: &str,
        reference_url: &str,
        aspect: Option<&str>,
    ) -> WorkerResult<PathBuf> {
        retry_stage(
            self.plan.image_attempts,
            self.plan.stage_retry_delay,
            "generate_image",
            |_attempt| async move {
                let url = self
                    .ctx
                    .images
                    .generate(prompt, Some(reference_url), aspect)
                    .await?;
                let bytes = self.ctx.fetcher.fetch(&url).await?;
                let path = workdir.join(original_image(index));
                write_atomic(&path, &bytes).await?;
                Ok(path)
            },
        )
        .await
    }

    /// Turn captioned stills into equal-duration clips, concatenate, and
    /// mux with the narration track.
    async fn mux_slideshow(
        &self,
        workdir: &Path,
        captioned: &[(u32, PathBuf)],
        audio_path: &Path,
    ) -> WorkerResult<PathBuf> {
        let audio_duration = self.ctx.engine.media_duration(audio_path).await?;
        if audio_duration <= 0.0 {
            return Err(WorkerError::generation_failed(
                "narration track has no duration",
            ));
        }
        let per_slide = audio_duration / captioned.len() as f64;

        let mut slides = Vec::with_capacity(captioned.len());
        for (index, image) in captioned {
            let slide = workdir.join(slide_clip(*index));
            self.ctx
                .engine
                .still_to_clip(image, &slide, per_slide)
                .await?;
            slides.push(slide);
        }

        let silent = workdir.join(SILENT_SLIDESHOW);
        self.ctx.engine.concat(&slides, &silent).await?;

        let final_path = workdir.join(FINAL_VIDEO);
        self.ctx
            .engine
            .mux(&silent, audio_path, &final_path)
            .await?;
        Ok(final_path)
    }
}

/// Persist the Failed terminal state for a task, with refund bookkeeping.
///
/// Reads the task back for its `credit_id`; when the record is gone the
/// refund is skipped (not retried) and logged. The stored result keeps any
/// previously published fields and gains `error`; since results are only
/// written on success, a failed task never exposes partial artifact URLs.
pub async fn persist_failure(ctx: &PipelineContext, task_id: &TaskId, error_message: &str) {
    let task = match ctx.repo.find(task_id).await {
        Ok(Some(task)) => task,
        Ok(None) => {
            warn!(
                task_id = %task_id,
                "task record missing during failure handling; refund skipped"
            );
            return;
        }
        Err(e) => {
            warn!(task_id = %task_id, "failed to load task during failure handling: {e}");
            return;
        }
    };

    if let Some(credit_id) = &task.credit_id {
        if let Err(e) = ctx
            .ledger
            .mark_refundable(credit_id, task_id, error_message)
            .await
        {
            warn!(task_id = %task_id, "refund bookkeeping failed: {e}");
        }
    }

    let mut progress = task.progress.clone();
    progress.advance(Step::Failed, error_message.to_string());

    let mut result = task.result.clone();
    result.error = Some(error_message.to_string());

    if let Err(e) = ctx
        .repo
        .set_outcome(task_id, TaskStatus::Failed, &progress, &result)
        .await
    {
        warn!(task_id = %task_id, "failed to persist Failed state: {e}");
    }
}
