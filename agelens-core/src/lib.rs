//! Core age-estimation pipeline primitives.
//!
//! This crate locates face regions (manual override, SSD ONNX detector via
//! `tract-onnx`, SeetaFace cascade fallback), extracts per-face image
//! statistics, and maps them to a bounded age estimate through a three-tier
//! scoring chain.

/// SeetaFace cascade detector tier.
pub mod cascade;
/// ONNX SSD face detector tier.
pub mod dnn;
/// Eye sub-detection used for ocular feature ratios.
pub mod eyes;
/// Feature-light fallback scorer and the unconditional safety net.
pub mod fallback;
/// Per-face feature extraction.
pub mod features;
/// Cascaded face localization (manual, DNN, cascade).
pub mod locator;
/// Top-level estimator and result aggregation.
pub mod pipeline;
/// Face region geometry and bounds clamping.
pub mod region;
/// Primary weighted age scorer.
pub mod scorer;

pub use cascade::CascadeDetector;
pub use dnn::SsdFaceModel;
pub use eyes::{DarkRegionEyeLocator, EyeBox, EyeLocator};
pub use fallback::{fallback_score, pixel_checksum, unconditional_age};
pub use features::{FeatureExtractor, FeatureVector, TEXTURE_BINS};
pub use locator::FaceLocator;
pub use pipeline::{AgeEstimator, EstimateError, EstimationResult};
pub use region::{FaceRegion, ManualRegion};
pub use scorer::{AgeScorer, FixedNoise, NoiseSource, ThreadRngNoise};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
