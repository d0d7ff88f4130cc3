//! Local pipeline runner.
//!
//! Reads a task request from a JSON file, wires real provider clients
//! from the environment, runs the pipeline, and polls status until the
//! task reaches a terminal state. Useful for smoke-testing a provider
//! setup without the web front end.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mgen_models::{GenerationOptions, PipelineKind, Task};
use mgen_providers::{
    HttpImageGenerator, HttpSpeechSynthesizer, HttpVideoGenerator, HttpVisionAnalyzer,
    ImageGenConfig, SpeechConfig, VideoGenConfig, VisionConfig,
};
use mgen_storage::{BlobStore, MemoryBlobStore, R2Client};
use mgen_tasks::{MemoryCreditLedger, MemoryTaskRepository};
use mgen_worker::{
    FfmpegEngine, HttpFetcher, PipelineContext, PipelinePlan, StatusQueryService,
    TaskLifecycleController, WorkerConfig,
};

/// Task request file format.
#[derive(Debug, Deserialize)]
struct TaskRequest {
    user_id: String,
    provider: String,
    model: String,
    kind: PipelineKind,
    #[serde(default)]
    options: GenerationOptions,
    credit_id: Option<String>,
}

fn env_or_exit(name: &str) -> String {
    match std::env::var(name) {
        Ok(value) => value,
        Err(_) => {
            error!("{name} not set");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("mgen=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let request_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            error!("usage: mgen-worker <task-request.json>");
            std::process::exit(1);
        }
    };

    let request: TaskRequest = match std::fs::read_to_string(&request_path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(request) => request,
        Err(e) => {
            error!("failed to read task request {request_path}: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = mgen_media::check_ffmpeg().and(mgen_media::check_ffprobe()) {
        error!("media toolchain missing: {e}");
        std::process::exit(1);
    }

    let store: Arc<dyn BlobStore> = match R2Client::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("R2 not configured ({e}); using in-memory store");
            Arc::new(MemoryBlobStore::new())
        }
    };

    let repo = Arc::new(MemoryTaskRepository::new());
    let ctx = Arc::new(PipelineContext {
        config: WorkerConfig::from_env(),
        repo: repo.clone(),
        store,
        ledger: Arc::new(MemoryCreditLedger::new()),
        vision: Arc::new(HttpVisionAnalyzer::new(VisionConfig::new(
            env_or_exit("VISION_ENDPOINT"),
            env_or_exit("VISION_API_KEY"),
            env_or_exit("VISION_MODEL"),
        ))),
        images: Arc::new(HttpImageGenerator::new(ImageGenConfig::new(
            env_or_exit("IMAGEGEN_ENDPOINT"),
            env_or_exit("IMAGEGEN_API_KEY"),
            env_or_exit("IMAGEGEN_MODEL"),
        ))),
        videos: Arc::new(HttpVideoGenerator::new(VideoGenConfig::new(
            env_or_exit("VIDEOGEN_ENDPOINT"),
            env_or_exit("VIDEOGEN_API_KEY"),
            env_or_exit("VIDEOGEN_MODEL"),
        ))),
        speech: Arc::new(HttpSpeechSynthesizer::new(SpeechConfig::new(
            env_or_exit("SPEECH_ENDPOINT"),
            env_or_exit("SPEECH_API_KEY"),
            env_or_exit("SPEECH_MODEL"),
        ))),
        engine: Arc::new(FfmpegEngine::new()),
        fetcher: Arc::new(HttpFetcher::new()),
    });

    let plan = match request.kind {
        PipelineKind::VideoChain => {
            PipelinePlan::video_chain(request.provider.as_str(), request.model.as_str())
        }
        PipelineKind::ImageSlideshow => {
            PipelinePlan::image_slideshow(request.provider.as_str(), request.model.as_str())
        }
    };
    let controller = TaskLifecycleController::new(Arc::clone(&ctx)).register_plan(plan);

    let mut task = Task::new(
        request.user_id,
        request.provider,
        request.model,
        request.options,
    );
    if let Some(credit_id) = request.credit_id {
        task = task.with_credit_id(credit_id);
    }

    let task_id = match controller.schedule(task).await {
        Ok(id) => id,
        Err(e) => {
            error!("schedule failed: {e}");
            std::process::exit(1);
        }
    };
    info!(task_id = %task_id, "task accepted, polling status");

    let status = StatusQueryService::new(repo);
    loop {
        tokio::time::sleep(Duration::from_secs(2)).await;
        match status.query(&task_id).await {
            Ok(envelope) => {
                info!(
                    percent = envelope.progress.percent,
                    "status: {} - {}",
                    envelope.status,
                    envelope.progress.message
                );
                if envelope.status.is_terminal() {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&envelope)
                            .expect("envelope serializes")
                    );
                    break;
                }
            }
            Err(e) => {
                error!("status query failed: {e}");
                break;
            }
        }
    }
}
