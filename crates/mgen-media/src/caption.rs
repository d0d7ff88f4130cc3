//! Caption layout and flattening.
//!
//! Layout is pure: a font size proportional to image width, greedy word
//! wrap against a per-character width estimate, and a block anchored near
//! the bottom with fixed padding. The flatten step renders the wrapped
//! lines onto the source image with drawtext and writes lossless PNG.

use std::path::Path;

use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Font file candidates checked in order.
const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
];

/// Caption rendering configuration.
#[derive(Debug, Clone)]
pub struct CaptionStyle {
    /// Explicit font file; falls back to `FONT_PATHS` when unset
    pub font_file: Option<String>,
    /// Text color
    pub font_color: String,
    /// Image width divided by this gives the font size
    pub font_size_divisor: u32,
    /// Horizontal padding as a fraction of image width
    pub side_padding_ratio: f64,
    /// Bottom padding as a fraction of image height
    pub bottom_padding_ratio: f64,
    /// Line height as a multiple of font size
    pub line_spacing: f64,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_file: None,
            font_color: "white".to_string(),
            font_size_divisor: 18,
            side_padding_ratio: 0.08,
            bottom_padding_ratio: 0.08,
            line_spacing: 1.35,
        }
    }
}

/// Computed caption geometry for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub font_size: u32,
    pub line_height: u32,
    /// Wrapped lines, top to bottom
    pub lines: Vec<String>,
    /// Y coordinate of the first line's baseline box
    pub block_top: u32,
}

impl CaptionLayout {
    /// Compute the layout for `text` on an image of `width` x `height`.
    pub fn compute(width: u32, height: u32, text: &str, style: &CaptionStyle) -> Self {
        let font_size = (width / style.font_size_divisor.max(1)).max(16);
        let side_padding = (f64::from(width) * style.side_padding_ratio) as u32;
        let content_width = width.saturating_sub(2 * side_padding).max(font_size);

        let lines = wrap_caption(text, content_width, font_size);

        let line_height = (f64::from(font_size) * style.line_spacing).round() as u32;
        let bottom_padding = (f64::from(height) * style.bottom_padding_ratio) as u32;
        let block_height = line_height * lines.len() as u32;
        let block_top = height
            .saturating_sub(bottom_padding)
            .saturating_sub(block_height)
            .max(bottom_padding);

        Self {
            font_size,
            line_height,
            lines,
            block_top,
        }
    }
}

/// Estimated rendered width of one character, in pixels.
///
/// The estimate distinguishes spaces, uppercase, and narrow punctuation;
/// it only has to be good enough to wrap a line or two early rather than
/// overflow the padded content box.
fn char_width(c: char, font_size: u32) -> f64 {
    let factor = if c == ' ' {
        0.30
    } else if c.is_uppercase() {
        0.72
    } else if matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '\'' | '"' | '-') {
        0.33
    } else {
        0.52
    };
    f64::from(font_size) * factor
}

/// Estimated rendered width of a string.
fn text_width(text: &str, font_size: u32) -> f64 {
    text.chars().map(|c| char_width(c, font_size)).sum()
}

/// Greedy word wrap into lines fitting `max_width` pixels.
///
/// A single word wider than the content box gets its own line rather than
/// being hyphenated.
pub fn wrap_caption(text: &str, max_width: u32, font_size: u32) -> Vec<String> {
    let max_width = f64::from(max_width);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if text_width(&candidate, font_size) <= max_width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Escape text for use inside a drawtext filter argument.
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', r"\\")
        .replace('\'', r"\'")
        .replace(':', r"\:")
        .replace('%', r"\%")
        .replace(',', r"\,")
}

/// Resolve a usable font file.
fn resolve_font(style: &CaptionStyle) -> Option<String> {
    if let Some(font) = &style.font_file {
        return Some(font.clone());
    }
    FONT_PATHS
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
}

/// Build the drawtext filter chain for a layout.
fn build_caption_filter(layout: &CaptionLayout, style: &CaptionStyle) -> String {
    let font = resolve_font(style)
        .map(|f| format!("fontfile='{}':", escape_drawtext(&f)))
        .unwrap_or_default();

    layout
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let y = layout.block_top + layout.line_height * i as u32;
            format!(
                "drawtext={font}text='{text}':fontsize={size}:fontcolor={color}:\
                 borderw=2:bordercolor=black@0.7:x=(w-text_w)/2:y={y}",
                text = escape_drawtext(line),
                size = layout.font_size,
                color = style.font_color,
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Composite `text` onto `input`, writing a flattened PNG to `output`.
pub async fn compose_caption(
    input: impl AsRef<Path>,
    text: &str,
    output: impl AsRef<Path>,
    style: &CaptionStyle,
) -> MediaResult<()> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    if text.trim().is_empty() {
        return Err(MediaError::invalid_media("empty caption text"));
    }

    let (width, height) = image::image_dimensions(input)?;
    let layout = CaptionLayout::compute(width, height, text, style);
    debug!(
        image = %input.display(),
        lines = layout.lines.len(),
        font_size = layout.font_size,
        "composing caption"
    );

    let cmd = FfmpegCommand::new(output.as_ref())
        .input(input)
        .video_filter(build_caption_filter(&layout, style))
        .output_args(["-frames:v", "1"]);

    FfmpegRunner::new().with_timeout(120).run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_fits_content_width() {
        let font_size = 40;
        let max_width = 600;
        let lines = wrap_caption(
            "Keep your core tight and lower yourself slowly to the floor",
            max_width,
            font_size,
        );

        assert!(lines.len() > 1);
        for line in &lines {
            assert!(
                text_width(line, font_size) <= f64::from(max_width),
                "line overflows: {line}"
            );
        }
    }

    #[test]
    fn test_wrap_preserves_word_order() {
        let lines = wrap_caption("one two three four five six", 200, 40);
        let rejoined = lines.join(" ");
        assert_eq!(rejoined, "one two three four five six");
    }

    #[test]
    fn test_oversized_word_gets_own_line() {
        let lines = wrap_caption("a Supercalifragilisticexpialidocious b", 100, 40);
        assert!(lines.iter().any(|l| l.contains("Supercali")));
        // Nothing dropped.
        assert_eq!(lines.join(" ").split_whitespace().count(), 3);
    }

    #[test]
    fn test_uppercase_estimated_wider() {
        assert!(text_width("WIDE", 40) > text_width("wide", 40));
        assert!(char_width(' ', 40) < char_width('m', 40));
    }

    #[test]
    fn test_layout_font_scales_with_width() {
        let style = CaptionStyle::default();
        let narrow = CaptionLayout::compute(720, 1280, "hello world", &style);
        let wide = CaptionLayout::compute(1440, 2560, "hello world", &style);
        assert_eq!(wide.font_size, narrow.font_size * 2);
    }

    #[test]
    fn test_layout_anchors_near_bottom() {
        let style = CaptionStyle::default();
        let layout = CaptionLayout::compute(720, 1280, "short caption", &style);
        let block_bottom =
            layout.block_top + layout.line_height * layout.lines.len() as u32;
        let bottom_padding = (1280.0 * style.bottom_padding_ratio) as u32;
        assert_eq!(block_bottom, 1280 - bottom_padding);
    }

    #[test]
    fn test_drawtext_escaping() {
        assert_eq!(escape_drawtext("it's 50%"), r"it\'s 50\%");
        assert_eq!(escape_drawtext("a:b,c"), r"a\:b\,c");
    }

    #[test]
    fn test_filter_has_one_drawtext_per_line() {
        let style = CaptionStyle {
            font_file: Some("/tmp/font.ttf".into()),
            ..Default::default()
        };
        let layout = CaptionLayout::compute(
            720,
            1280,
            "Keep your core tight and lower yourself slowly to the floor again",
            &style,
        );
        let filter = build_caption_filter(&layout, &style);
        assert_eq!(
            filter.matches("drawtext=").count(),
            layout.lines.len()
        );
    }
}
