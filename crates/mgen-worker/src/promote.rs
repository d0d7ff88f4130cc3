//! Durable-storage promote pass.
//!
//! After a successful run, every file left in the task's working
//! directory is re-uploaded to durable storage and the task's result URLs
//! are patched to the durable copies. This pass is best-effort: a failure
//! here logs and leaves the task Success with its original URLs; it never
//! touches status or progress.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use mgen_models::TaskId;
use mgen_storage::media_key;
use mgen_tasks::ResultUrlPatch;
use tracing::{info, warn};

use crate::artifacts::{artifact_index, content_type_for, FINAL_VIDEO, NARRATION_AUDIO};
use crate::pipeline::PipelineContext;

/// Upload the workdir's files and patch the task's result URLs.
pub async fn promote_workdir(ctx: &PipelineContext, task_id: &TaskId) {
    let workdir = PathBuf::from(&ctx.config.work_dir).join(task_id.as_str());

    let uploaded = match upload_directory(ctx, task_id, &workdir).await {
        Ok(uploaded) => uploaded,
        Err(e) => {
            warn!(task_id = %task_id, "promote pass aborted: {e}");
            return;
        }
    };

    let patch = build_url_patch(&uploaded);
    if patch.is_empty() {
        return;
    }

    match ctx.repo.patch_result_urls(task_id, &patch).await {
        Ok(()) => info!(
            task_id = %task_id,
            files = uploaded.len(),
            "result URLs promoted to durable storage"
        ),
        Err(e) => warn!(task_id = %task_id, "failed to patch promoted URLs: {e}"),
    }
}

/// Upload every regular file in `workdir`, returning filename → URL.
async fn upload_directory(
    ctx: &PipelineContext,
    task_id: &TaskId,
    workdir: &Path,
) -> std::io::Result<HashMap<String, String>> {
    let mut uploaded = HashMap::new();
    let mut entries = tokio::fs::read_dir(workdir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().to_string();
        // Leftover temp files are not artifacts.
        if filename.ends_with(".part") || filename.ends_with(".concat.txt") {
            continue;
        }

        let bytes = match tokio::fs::read(entry.path()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %filename, "promote skipped unreadable file: {e}");
                continue;
            }
        };

        let key = match media_key(Utc::now(), task_id.as_str(), &filename) {
            Ok(key) => key,
            Err(e) => {
                warn!(file = %filename, "promote skipped file with bad key: {e}");
                continue;
            }
        };

        match ctx
            .store
            .upload(bytes, &key, content_type_for(&filename))
            .await
        {
            Ok(url) => {
                uploaded.insert(filename, url);
            }
            Err(e) => {
                warn!(file = %filename, "promote upload failed: {e}");
            }
        }
    }

    Ok(uploaded)
}

/// Map uploaded filenames onto the result's URL fields.
fn build_url_patch(uploaded: &HashMap<String, String>) -> ResultUrlPatch {
    ResultUrlPatch {
        video_url: uploaded.get(FINAL_VIDEO).cloned(),
        audio_url: uploaded.get(NARRATION_AUDIO).cloned(),
        image_urls: collect_indexed(uploaded, "captioned"),
        original_image_urls: collect_indexed(uploaded, "original"),
    }
}

/// Gather `{prefix}-{index}.*` URLs ordered by index.
fn collect_indexed(uploaded: &HashMap<String, String>, prefix: &str) -> Option<Vec<String>> {
    let mut indexed: Vec<(u32, String)> = uploaded
        .iter()
        .filter_map(|(name, url)| {
            artifact_index(name, prefix).map(|index| (index, url.clone()))
        })
        .collect();

    if indexed.is_empty() {
        return None;
    }
    indexed.sort_by_key(|(index, _)| *index);
    Some(indexed.into_iter().map(|(_, url)| url).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_maps_known_filenames() {
        let mut uploaded = HashMap::new();
        uploaded.insert("final.mp4".to_string(), "https://cdn/f.mp4".to_string());
        uploaded.insert("narration.mp3".to_string(), "https://cdn/n.mp3".to_string());
        uploaded.insert("captioned-2.png".to_string(), "https://cdn/c2.png".to_string());
        uploaded.insert("captioned-1.png".to_string(), "https://cdn/c1.png".to_string());
        uploaded.insert("original-1.png".to_string(), "https://cdn/o1.png".to_string());
        uploaded.insert("reference.jpg".to_string(), "https://cdn/r.jpg".to_string());

        let patch = build_url_patch(&uploaded);
        assert_eq!(patch.video_url.as_deref(), Some("https://cdn/f.mp4"));
        assert_eq!(patch.audio_url.as_deref(), Some("https://cdn/n.mp3"));
        assert_eq!(
            patch.image_urls,
            Some(vec![
                "https://cdn/c1.png".to_string(),
                "https://cdn/c2.png".to_string()
            ])
        );
        assert_eq!(
            patch.original_image_urls,
            Some(vec!["https://cdn/o1.png".to_string()])
        );
    }

    #[test]
    fn test_patch_empty_when_nothing_matches() {
        let mut uploaded = HashMap::new();
        uploaded.insert("reference.jpg".to_string(), "https://cdn/r.jpg".to_string());

        let patch = build_url_patch(&uploaded);
        assert!(patch.is_empty());
    }
}
