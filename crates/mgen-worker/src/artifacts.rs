//! Artifact file naming inside a task's working directory.
//!
//! Names are index-stamped so parallel image generation never contends on
//! a file, and stable so the promote pass can map files back to result
//! fields.

/// Normalized reference image.
pub const REFERENCE_IMAGE: &str = "reference.jpg";
/// Synthesized narration track.
pub const NARRATION_AUDIO: &str = "narration.mp3";
/// Concatenated slideshow before audio muxing.
pub const SILENT_SLIDESHOW: &str = "slides.mp4";
/// Final muxed artifact.
pub const FINAL_VIDEO: &str = "final.mp4";

/// Generated video segment `index` (1-based).
pub fn segment_clip(index: u32) -> String {
    format!("segment-{index}.mp4")
}

/// Conditioning frame extracted after segment `index`.
pub fn chain_frame(index: u32) -> String {
    format!("frame-{index}.jpg")
}

/// Un-watermarked generated image `index`.
pub fn original_image(index: u32) -> String {
    format!("original-{index}.png")
}

/// Caption-composited image `index`.
pub fn captioned_image(index: u32) -> String {
    format!("captioned-{index}.png")
}

/// Still-image slide clip `index`.
pub fn slide_clip(index: u32) -> String {
    format!("slide-{index}.mp4")
}

/// Content type for an artifact filename.
pub fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("mp4") => "video/mp4",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Parse the index out of an index-stamped artifact name.
pub fn artifact_index(filename: &str, prefix: &str) -> Option<u32> {
    filename
        .strip_prefix(prefix)?
        .strip_prefix('-')?
        .split('.')
        .next()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_index_stamped() {
        assert_eq!(segment_clip(2), "segment-2.mp4");
        assert_eq!(original_image(1), "original-1.png");
        assert_eq!(chain_frame(3), "frame-3.jpg");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(FINAL_VIDEO), "video/mp4");
        assert_eq!(content_type_for(NARRATION_AUDIO), "audio/mpeg");
        assert_eq!(content_type_for("original-1.png"), "image/png");
        assert_eq!(content_type_for("notes.txt"), "application/octet-stream");
    }

    #[test]
    fn test_artifact_index_parsing() {
        assert_eq!(artifact_index("captioned-2.png", "captioned"), Some(2));
        assert_eq!(artifact_index("captioned-x.png", "captioned"), None);
        assert_eq!(artifact_index("final.mp4", "captioned"), None);
    }
}
