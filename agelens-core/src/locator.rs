//! Cascaded face localization.
//!
//! Tiers run in strict precedence: a valid manual region short-circuits
//! everything, otherwise the SSD detector runs, and only when it yields
//! nothing (or is unavailable) does the classical cascade get a turn. The
//! first tier to produce at least one region wins; later tiers never add to
//! an earlier tier's output.

use anyhow::Result;
use image::DynamicImage;
use log::{debug, warn};

use crate::cascade::CascadeDetector;
use crate::dnn::SsdFaceModel;
use crate::region::{FaceRegion, ManualRegion};
use agelens_utils::config::AppSettings;
use agelens_utils::timing_guard;

/// Locates face regions through manual override, DNN, and cascade tiers.
#[derive(Debug)]
pub struct FaceLocator {
    dnn: Option<SsdFaceModel>,
    cascade: Option<CascadeDetector>,
    score_threshold: f32,
}

impl FaceLocator {
    /// Build a locator from already-loaded detector tiers.
    ///
    /// Either tier may be `None`; a locator with no detectors still honors
    /// manual regions.
    pub fn new(
        dnn: Option<SsdFaceModel>,
        cascade: Option<CascadeDetector>,
        score_threshold: f32,
    ) -> Self {
        Self {
            dnn,
            cascade,
            score_threshold,
        }
    }

    /// Build a locator from settings, loading whichever model artifacts are
    /// present on disk.
    ///
    /// A missing or unloadable artifact disables its tier with a warning
    /// rather than failing startup; the remaining tiers keep working.
    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        let dnn = match settings.models.face_model.as_deref() {
            Some(path) => match SsdFaceModel::load(path, settings.input) {
                Ok(model) => Some(model),
                Err(e) => {
                    warn!("DNN face detector unavailable ({e:#}); tier disabled");
                    None
                }
            },
            None => {
                debug!("no DNN face model configured; tier disabled");
                None
            }
        };

        let cascade = match settings.models.cascade_model.as_deref() {
            Some(path) => match CascadeDetector::load(path) {
                Ok(detector) => Some(detector),
                Err(e) => {
                    warn!("cascade face detector unavailable ({e:#}); tier disabled");
                    None
                }
            },
            None => {
                debug!("no cascade model configured; tier disabled");
                None
            }
        };

        Ok(Self::new(dnn, cascade, settings.detection.score_threshold))
    }

    /// Whether at least one automatic detector tier is available.
    pub fn has_detector(&self) -> bool {
        self.dnn.is_some() || self.cascade.is_some()
    }

    /// Locate faces in an image.
    ///
    /// Returns the output of the first tier that produces any region. An
    /// empty result means no tier found a face; the caller decides whether
    /// that is an error.
    pub fn locate(&self, image: &DynamicImage, manual: Option<&ManualRegion>) -> Vec<FaceRegion> {
        let _guard = timing_guard("agelens_core::locate", log::Level::Debug);
        let bounds = (image.width(), image.height());

        if let Some(region) = manual {
            match FaceRegion::from_manual(region, bounds) {
                Some(clamped) => {
                    debug!(
                        "manual region accepted at ({}, {}) {}x{}",
                        clamped.x, clamped.y, clamped.width, clamped.height
                    );
                    return vec![clamped];
                }
                None => {
                    warn!("manual region {region:?} has no overlap with the image; falling back to detection");
                }
            }
        }

        if let Some(dnn) = &self.dnn {
            match dnn.detect(image, self.score_threshold) {
                Ok(regions) if !regions.is_empty() => {
                    debug!("DNN tier located {} face(s)", regions.len());
                    return regions;
                }
                Ok(_) => debug!("DNN tier found no faces; trying cascade"),
                Err(e) => warn!("DNN tier failed ({e:#}); trying cascade"),
            }
        }

        if let Some(cascade) = &self.cascade {
            let regions = cascade.detect(&image.to_luma8());
            if !regions.is_empty() {
                debug!("cascade tier located {} face(s)", regions.len());
                return regions;
            }
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agelens_utils::fixtures::flat_gray_image;

    fn manual_only_locator() -> FaceLocator {
        FaceLocator::new(None, None, 0.5)
    }

    #[test]
    fn manual_region_wins_and_is_clamped() {
        let image = flat_gray_image(40, 40, 128);
        let manual = ManualRegion {
            x: 10,
            y: 10,
            width: 50,
            height: 50,
        };

        let regions = manual_only_locator().locate(&image, Some(&manual));
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert!(region.is_manual);
        assert_eq!((region.x, region.y, region.width, region.height), (10, 10, 30, 30));
    }

    #[test]
    fn invalid_manual_region_falls_through() {
        let image = flat_gray_image(40, 40, 128);
        let manual = ManualRegion {
            x: 500,
            y: 500,
            width: 10,
            height: 10,
        };

        // No detector tiers available, so fallthrough yields nothing.
        let regions = manual_only_locator().locate(&image, Some(&manual));
        assert!(regions.is_empty());
    }

    #[test]
    fn no_tiers_yields_empty() {
        let image = flat_gray_image(300, 300, 128);
        assert!(manual_only_locator().locate(&image, None).is_empty());
        assert!(!manual_only_locator().has_detector());
    }

    #[test]
    fn from_settings_tolerates_missing_artifacts() {
        let mut settings = AppSettings::default();
        settings.models.face_model = Some("does/not/exist.onnx".into());
        settings.models.cascade_model = Some("does/not/exist.bin".into());

        let locator = FaceLocator::from_settings(&settings).expect("locator builds");
        assert!(!locator.has_detector());
    }
}
