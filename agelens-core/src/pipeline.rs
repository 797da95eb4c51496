//! Top-level estimator and result aggregation.
//!
//! Ties the locator, feature extractor, and scorers into a single entry
//! point. Scoring is structured so an individual face always yields an age:
//! the weighted scorer is tried first, a feature-light fallback second, and
//! an unconditional random age last.

use image::DynamicImage;
use log::{debug, warn};
use thiserror::Error;

use crate::fallback::{fallback_score, unconditional_age};
use crate::features::FeatureExtractor;
use crate::locator::FaceLocator;
use crate::region::{FaceRegion, ManualRegion};
use crate::scorer::AgeScorer;
use agelens_utils::config::{AppSettings, ScoringStrategy};
use agelens_utils::timing_guard;

/// Errors surfaced by [`AgeEstimator::estimate_ages`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EstimateError {
    /// No locator tier produced a face region.
    #[error("no face detected in the image")]
    NoFaceLocated,
    /// Faces were located but every one of them failed analysis.
    #[error("could not analyze any faces in the image")]
    AllFacesFailed,
}

/// A single face's estimate: the age and the region it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationResult {
    /// Estimated age in years.
    pub age: u32,
    /// The face region the estimate belongs to. Confidence is carried
    /// through from the locator unchanged.
    pub region: FaceRegion,
}

/// End-to-end age estimation pipeline.
#[derive(Debug)]
pub struct AgeEstimator {
    locator: FaceLocator,
    extractor: FeatureExtractor,
    scorer: AgeScorer,
    strategy: ScoringStrategy,
}

impl AgeEstimator {
    /// Assemble an estimator from pre-built components.
    pub fn new(
        locator: FaceLocator,
        extractor: FeatureExtractor,
        scorer: AgeScorer,
        strategy: ScoringStrategy,
    ) -> Self {
        Self {
            locator,
            extractor,
            scorer,
            strategy,
        }
    }

    /// Build the full pipeline from settings, loading whichever detector
    /// artifacts exist.
    pub fn from_settings(settings: &AppSettings) -> anyhow::Result<Self> {
        let locator = FaceLocator::from_settings(settings)?;
        if !locator.has_detector() {
            warn!("no detector tiers available; only manual regions will locate faces");
        }
        Ok(Self::new(
            locator,
            FeatureExtractor::new(settings.extraction.face_size),
            AgeScorer::new(settings.scoring.noise_enabled),
            settings.scoring.strategy,
        ))
    }

    /// Estimate an age for every face in the image.
    ///
    /// Faces that fail analysis are skipped with a warning; results keep the
    /// locator's ordering. Fails only when no face is located at all or when
    /// every located face fails.
    pub fn estimate_ages(
        &self,
        image: &DynamicImage,
        manual: Option<&ManualRegion>,
    ) -> Result<Vec<EstimationResult>, EstimateError> {
        let _guard = timing_guard("agelens_core::estimate_ages", log::Level::Debug);

        let regions = self.locator.locate(image, manual);
        if regions.is_empty() {
            return Err(EstimateError::NoFaceLocated);
        }

        let mut results = Vec::with_capacity(regions.len());
        for region in regions {
            match self.estimate_region(image, &region) {
                Some(age) => results.push(EstimationResult { age, region }),
                None => {
                    warn!(
                        "skipping unanalyzable face at ({}, {}) {}x{}",
                        region.x, region.y, region.width, region.height
                    );
                }
            }
        }

        if results.is_empty() {
            return Err(EstimateError::AllFacesFailed);
        }
        Ok(results)
    }

    /// Crop a located region and score it. Returns `None` only when the
    /// region does not actually fit the image it was located in.
    fn estimate_region(&self, image: &DynamicImage, region: &FaceRegion) -> Option<u32> {
        if !region.contained_in((image.width(), image.height())) {
            return None;
        }
        let crop = image.crop_imm(region.x, region.y, region.width, region.height);
        Some(self.estimate_face(&crop))
    }

    /// Score a face crop through the three-tier chain. Never fails.
    fn estimate_face(&self, crop: &DynamicImage) -> u32 {
        if self.strategy == ScoringStrategy::Weighted {
            match self
                .extractor
                .extract(crop)
                .and_then(|features| self.scorer.score(&features))
            {
                Ok(age) => return age,
                Err(e) => {
                    warn!("weighted scoring failed ({e:#}); using fallback scorer");
                }
            }
        }

        match fallback_score(crop) {
            Ok(age) => age,
            Err(e) => {
                warn!("fallback scoring failed ({e:#}); using unconditional age");
                let age = unconditional_age();
                debug!("unconditional tier produced age {age}");
                age
            }
        }
    }
}
