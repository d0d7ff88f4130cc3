//! Clients for external generative AI services.
//!
//! Each capability sits behind a trait so pipelines can be tested with
//! scripted fakes:
//! - `VisionAnalyzer` — schema-validated analysis of a reference image
//! - `ImageGenerator` — prompt (+ optional reference) to image URLs
//! - `VideoGenerator` — submit a clip job, poll it by id
//! - `SpeechSynthesizer` — narration text to audio bytes
//!
//! HTTP implementations are constructed from explicit per-provider config
//! structs (endpoint, key, model); nothing is read from the environment
//! inside request paths.

pub mod error;
pub mod image;
pub mod speech;
pub mod traits;
pub mod video;
pub mod vision;

pub use error::{ProviderError, ProviderResult};
pub use image::{HttpImageGenerator, ImageGenConfig};
pub use speech::{HttpSpeechSynthesizer, SpeechConfig};
pub use traits::{ImageGenerator, JobPoll, SpeechSynthesizer, VideoGenerator, VisionAnalyzer};
pub use video::{HttpVideoGenerator, VideoGenConfig};
pub use vision::{HttpVisionAnalyzer, VisionConfig};
