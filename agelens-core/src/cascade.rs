//! SeetaFace cascade detector tier.
//!
//! Classical multi-scale sliding-window detection via the `rustface` crate.
//! The parsed model is held immutably and a short-lived detector is built per
//! call, because rustface detection requires mutable scratch state and the
//! loaded model must stay shareable across threads.

use std::{fs, io::Cursor, path::Path};

use anyhow::{Context, Result};
use image::GrayImage;
use log::debug;

use crate::region::FaceRegion;
use agelens_utils::timing_guard;

/// Smallest face side the sliding window considers, in pixels.
const MIN_FACE_SIZE: u32 = 20;
/// SeetaFace classifier score threshold.
const SCORE_THRESH: f64 = 2.0;
/// Pyramid downscale factor per level (the inverse of a 1.1 scale step).
const PYRAMID_SCALE: f32 = 0.91;
/// Window slide step in both axes; coarser steps trade recall for speed the
/// same way a higher neighbour-vote minimum does.
const WINDOW_STEP: u32 = 4;
/// Cascade matches carry no usable per-window score, so every match reports
/// this fixed confidence.
const CASCADE_CONFIDENCE: f32 = 0.8;

/// Classical cascade face detector.
pub struct CascadeDetector {
    model: rustface::Model,
}

impl CascadeDetector {
    /// Parse a SeetaFace model file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read cascade model {}", path.display()))?;
        let model = rustface::read_model(Cursor::new(bytes))
            .map_err(|e| anyhow::anyhow!("failed to parse cascade model {}: {e}", path.display()))?;
        Ok(Self { model })
    }

    /// Run multi-scale detection over a grayscale image.
    ///
    /// Every match is clamped to image bounds and reported with the fixed
    /// cascade confidence; degenerate boxes are discarded.
    pub fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        let _guard = timing_guard("agelens_core::cascade_detect", log::Level::Debug);

        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(MIN_FACE_SIZE);
        detector.set_score_thresh(SCORE_THRESH);
        detector.set_pyramid_scale_factor(PYRAMID_SCALE);
        detector.set_slide_window_step(WINDOW_STEP, WINDOW_STEP);

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));
        debug!("cascade tier produced {} raw match(es)", faces.len());

        faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                FaceRegion::from_detection(
                    bbox.x() as f32,
                    bbox.y() as f32,
                    bbox.width() as f32,
                    bbox.height() as f32,
                    CASCADE_CONFIDENCE,
                    (width, height),
                )
            })
            .collect()
    }
}

impl std::fmt::Debug for CascadeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeDetector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loading_missing_model_fails() {
        assert!(CascadeDetector::load("missing.bin").is_err());
    }

    #[test]
    fn loading_garbage_model_fails() {
        let mut temp = NamedTempFile::new().expect("temp file");
        temp.write_all(b"definitely not a seetaface model")
            .expect("write mock model");
        assert!(CascadeDetector::load(temp.path()).is_err());
    }
}
