//! Pipeline steps and progress tracking.
//!
//! Steps form a closed, totally ordered enum; the progress percentage for
//! each step comes from a fixed band table rather than literals scattered
//! through the pipeline. Asset-generation steps split the 5–85 band into
//! equal slices, merging holds 85 until completion at 100.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Percent reached when analysis starts.
const ANALYZING_PERCENT: u8 = 5;
/// Upper bound of the asset-generation band.
const ASSET_BAND_END: u8 = 85;
/// Percent reached when the final mux starts.
const MERGING_PERCENT: u8 = 85;

/// One step of a generation pipeline.
///
/// Asset steps carry their 1-based index and the total slot count so the
/// percentage band can be computed without variant-specific tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Step {
    /// Task accepted, nothing started
    Pending,
    /// Vision analysis of the reference image
    Analyzing,
    /// Generating asset `index` of `total` (image or video segment)
    GeneratingAsset { index: u32, total: u32 },
    /// Extracting the conditioning frame after segment `index`
    ExtractingFrame { index: u32, total: u32 },
    /// Synthesizing narration audio
    Synthesizing,
    /// Compositing captions onto generated images
    Compositing,
    /// Final concat/mux
    Merging,
    /// Terminal success
    Completed,
    /// Terminal failure
    Failed,
}

impl Step {
    /// Progress percentage band for this step.
    ///
    /// Asset slices are placed inside (5, 85]: generation at 25% of its
    /// slice, frame extraction at 75%, so a generate/extract pair for the
    /// same segment always orders correctly.
    pub fn percent(&self) -> u8 {
        match self {
            Step::Pending => 0,
            Step::Analyzing => ANALYZING_PERCENT,
            Step::GeneratingAsset { index, total } => asset_percent(*index, *total, 0.25),
            Step::ExtractingFrame { index, total } => asset_percent(*index, *total, 0.75),
            Step::Synthesizing => 78,
            Step::Compositing => 74,
            Step::Merging => MERGING_PERCENT,
            Step::Completed => 100,
            // A failed task keeps whatever percent it had reached;
            // `Progress::advance` only ever moves percent upward.
            Step::Failed => 0,
        }
    }

    /// Default human-readable message for this step.
    pub fn default_message(&self) -> String {
        match self {
            Step::Pending => "Waiting to start".to_string(),
            Step::Analyzing => "Analyzing reference image".to_string(),
            Step::GeneratingAsset { index, total } => {
                format!("Generating asset {index} of {total}")
            }
            Step::ExtractingFrame { index, .. } => {
                format!("Extracting frame from segment {index}")
            }
            Step::Synthesizing => "Synthesizing narration".to_string(),
            Step::Compositing => "Compositing captions".to_string(),
            Step::Merging => "Merging final video".to_string(),
            Step::Completed => "Completed".to_string(),
            Step::Failed => "Failed".to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Completed | Step::Failed)
    }
}

/// Percent for an asset sub-step at `offset` (0..1) into its slice.
fn asset_percent(index: u32, total: u32, offset: f64) -> u8 {
    let total = total.max(1);
    let index = index.clamp(1, total);
    let band = f64::from(ASSET_BAND_END - ANALYZING_PERCENT);
    let slice = band / f64::from(total);
    let position = f64::from(ANALYZING_PERCENT) + slice * (f64::from(index - 1) + offset);
    (position.round() as u8).min(ASSET_BAND_END)
}

/// Fine-grained progress blob persisted with each task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// Current step
    pub step: Step,
    /// Human-readable description for the UI
    pub message: String,
    /// 0–100, non-decreasing for a given task
    pub percent: u8,
    /// When the pipeline started
    pub started_at: DateTime<Utc>,
    /// Last progress write
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    /// Initial progress for a freshly created task.
    pub fn pending(now: DateTime<Utc>) -> Self {
        Self {
            step: Step::Pending,
            message: Step::Pending.default_message(),
            percent: 0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Advance to `step`, clamping percent so it never regresses.
    ///
    /// Re-advancing to the current step only refreshes `updated_at`.
    pub fn advance(&mut self, step: Step, message: impl Into<String>) {
        let now = Utc::now();
        if step == self.step {
            self.updated_at = now;
            return;
        }
        self.step = step;
        self.message = message.into();
        self.percent = step.percent().max(self.percent);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_bands() {
        assert_eq!(Step::Pending.percent(), 0);
        assert_eq!(Step::Analyzing.percent(), 5);
        assert_eq!(Step::Merging.percent(), 85);
        assert_eq!(Step::Completed.percent(), 100);
    }

    #[test]
    fn test_asset_slices_are_ordered() {
        let total = 3;
        let mut last = Step::Analyzing.percent();
        for index in 1..=total {
            let gen = Step::GeneratingAsset { index, total }.percent();
            let ext = Step::ExtractingFrame { index, total }.percent();
            assert!(gen > last, "generate {index} must advance past {last}");
            assert!(ext > gen, "extract {index} must follow generate");
            last = ext;
        }
        assert!(Step::Merging.percent() >= last);
    }

    #[test]
    fn test_two_segment_band_values() {
        // 2 segments split the 80-point band into 40-point slices.
        assert_eq!(
            Step::GeneratingAsset { index: 1, total: 2 }.percent(),
            15
        );
        assert_eq!(
            Step::ExtractingFrame { index: 1, total: 2 }.percent(),
            35
        );
        assert_eq!(
            Step::GeneratingAsset { index: 2, total: 2 }.percent(),
            55
        );
    }

    #[test]
    fn test_progress_never_regresses() {
        let mut progress = Progress::pending(Utc::now());

        progress.advance(Step::Merging, "merging");
        assert_eq!(progress.percent, 85);

        // A lower-band step can still be recorded but percent holds.
        progress.advance(Step::Analyzing, "late update");
        assert_eq!(progress.percent, 85);
        assert_eq!(progress.step, Step::Analyzing);
    }

    #[test]
    fn test_progress_idempotent_readvance() {
        let mut progress = Progress::pending(Utc::now());
        progress.advance(Step::Analyzing, "analyzing");
        let percent = progress.percent;
        let message = progress.message.clone();

        progress.advance(Step::Analyzing, "different text ignored");
        assert_eq!(progress.percent, percent);
        assert_eq!(progress.message, message);
    }

    #[test]
    fn test_failed_keeps_reached_percent() {
        let mut progress = Progress::pending(Utc::now());
        progress.advance(Step::Merging, "merging");
        progress.advance(Step::Failed, "ffmpeg exited 1");
        assert_eq!(progress.percent, 85);
        assert_eq!(progress.step, Step::Failed);
    }

    #[test]
    fn test_degenerate_totals_clamp() {
        // total = 0 must not panic or divide by zero.
        let step = Step::GeneratingAsset { index: 1, total: 0 };
        assert!(step.percent() > Step::Analyzing.percent());
        assert!(step.percent() <= 85);
    }
}
