//! Per-face feature extraction.
//!
//! A face crop is normalized to a square grayscale image with its histogram
//! equalized, then reduced to the statistics the scorer consumes: an LBP
//! texture histogram, Canny edge density, a mean Sobel gradient, intensity
//! moments, the crop's aspect ratio, and eye-derived ratios from the
//! configured [`EyeLocator`].

use anyhow::Result;
use image::{DynamicImage, GrayImage, imageops::FilterType};
use imageproc::edges::canny;
use log::debug;

use crate::eyes::{DarkRegionEyeLocator, EyeLocator};
use agelens_utils::image_utils::{intensity_stats, normalize_face};
use agelens_utils::timing_guard;

/// Number of bins in the LBP texture histogram (one per 8-bit pattern).
pub const TEXTURE_BINS: usize = 256;

/// Canny thresholds tuned for equalized 200px face crops.
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 100.0;

/// Per-face statistics consumed by the scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Normalized local-binary-pattern histogram; sums to 1 for faces with
    /// any interior pixels.
    pub texture_histogram: Vec<f32>,
    /// Fraction of normalized-face pixels marked as edges.
    pub edge_density: f32,
    /// Width over height of the face crop before square normalization.
    pub aspect_ratio: f32,
    /// Mean Sobel gradient magnitude over interior pixels.
    pub mean_gradient: f32,
    /// Mean intensity of the resized (unequalized) grayscale crop.
    pub intensity_mean: f32,
    /// Intensity standard deviation of the resized (unequalized) crop.
    pub intensity_stddev: f32,
    /// Number of eyes the sub-detector found (0, 1, or 2).
    pub eye_count: usize,
    /// Mean eye box area divided by the normalized face area; zero unless
    /// both eyes were found.
    pub eye_area_ratio: f32,
    /// Distance between eye centers divided by the face side; zero unless
    /// both eyes were found.
    pub inter_eye_ratio: f32,
}

/// Extracts a [`FeatureVector`] from a face crop.
#[derive(Debug)]
pub struct FeatureExtractor {
    face_size: u32,
    eye_locator: Box<dyn EyeLocator>,
}

impl FeatureExtractor {
    /// Create an extractor with the default dark-region eye locator.
    pub fn new(face_size: u32) -> Self {
        Self::with_eye_locator(face_size, Box::new(DarkRegionEyeLocator))
    }

    /// Create an extractor with a caller-supplied eye locator.
    pub fn with_eye_locator(face_size: u32, eye_locator: Box<dyn EyeLocator>) -> Self {
        Self {
            face_size,
            eye_locator,
        }
    }

    /// Side length of the normalized face square.
    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    /// Extract features from a face crop.
    ///
    /// Fails only when the crop is degenerate (zero-sized); missing eyes are
    /// represented as zeroed ocular ratios, not an error.
    pub fn extract(&self, face: &DynamicImage) -> Result<FeatureVector> {
        let _guard = timing_guard("agelens_core::extract_features", log::Level::Debug);

        let (crop_w, crop_h) = (face.width(), face.height());
        anyhow::ensure!(
            crop_w > 0 && crop_h > 0,
            "face crop dimensions must be non-zero"
        );
        let aspect_ratio = crop_w as f32 / crop_h as f32;

        let norm = normalize_face(face, self.face_size)?;

        // Intensity moments come from the resized crop before equalization,
        // which would otherwise flatten the mean toward mid-gray.
        let resized_gray = face
            .resize_exact(self.face_size, self.face_size, FilterType::Triangle)
            .to_luma8();
        let (intensity_mean, intensity_stddev) = intensity_stats(&resized_gray);

        let texture_histogram = lbp_histogram(&norm);
        let edge_density = edge_density(&norm);
        let mean_gradient = mean_sobel_gradient(&norm);

        let eyes = self.eye_locator.locate_eyes(&norm);
        let face_side = self.face_size as f32;
        // Both ocular ratios require a full pair; a lone eye carries no
        // usable geometry and reads the same as none.
        let (eye_area_ratio, inter_eye_ratio) = if eyes.len() >= 2 {
            let mean_area: f32 =
                eyes.iter().map(|e| e.area()).sum::<f32>() / eyes.len() as f32;
            let (lx, ly) = eyes[0].center();
            let (rx, ry) = eyes[1].center();
            let distance = ((rx - lx).powi(2) + (ry - ly).powi(2)).sqrt();
            (mean_area / (face_side * face_side), distance / face_side)
        } else {
            (0.0, 0.0)
        };

        debug!(
            "extracted features: edges {:.4}, gradient {:.2}, eyes {}",
            edge_density,
            mean_gradient,
            eyes.len()
        );

        Ok(FeatureVector {
            texture_histogram,
            edge_density,
            aspect_ratio,
            mean_gradient,
            intensity_mean,
            intensity_stddev,
            eye_count: eyes.len(),
            eye_area_ratio,
            inter_eye_ratio,
        })
    }
}

/// Normalized 8-neighbor local binary pattern histogram over interior pixels.
///
/// Each neighbor at or above the center intensity contributes a bit, clockwise
/// from the top-left, giving one of 256 patterns per pixel.
fn lbp_histogram(gray: &GrayImage) -> Vec<f32> {
    let (w, h) = gray.dimensions();
    let mut counts = vec![0u32; TEXTURE_BINS];
    if w < 3 || h < 3 {
        return vec![0.0; TEXTURE_BINS];
    }

    // Clockwise neighborhood starting at the top-left.
    const OFFSETS: [(i32, i32); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
    ];

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = gray.get_pixel(x, y)[0];
            let mut pattern = 0u8;
            for (bit, (dx, dy)) in OFFSETS.iter().enumerate() {
                let neighbor =
                    gray.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0];
                if neighbor >= center {
                    pattern |= 1 << bit;
                }
            }
            counts[pattern as usize] += 1;
        }
    }

    let total = ((w - 2) * (h - 2)) as f32;
    counts.iter().map(|&c| c as f32 / total).collect()
}

/// Fraction of pixels the Canny detector marks as edges.
fn edge_density(gray: &GrayImage) -> f32 {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let edge_pixels = edges.as_raw().iter().filter(|&&p| p > 0).count();
    edge_pixels as f32 / (gray.width() as f32 * gray.height() as f32)
}

/// Mean Sobel gradient magnitude over interior pixels.
fn mean_sobel_gradient(gray: &GrayImage) -> f32 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| gray.get_pixel(x, y)[0] as f32;
    let mut sum = 0.0f64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            sum += ((gx * gx + gy * gy) as f64).sqrt();
        }
    }
    (sum / ((w - 2) as f64 * (h - 2) as f64)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eyes::EyeBox;
    use agelens_utils::fixtures::{flat_gray_image, synthetic_face};
    use image::DynamicImage;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(200)
    }

    #[derive(Debug)]
    struct SingleEyeLocator;

    impl EyeLocator for SingleEyeLocator {
        fn locate_eyes(&self, _face: &GrayImage) -> Vec<EyeBox> {
            vec![EyeBox {
                x: 50,
                y: 70,
                width: 20,
                height: 10,
            }]
        }
    }

    #[test]
    fn histogram_is_normalized() {
        let face = synthetic_face(200, 200);
        let features = extractor().extract(&face).expect("extract");

        assert_eq!(features.texture_histogram.len(), TEXTURE_BINS);
        let sum: f32 = features.texture_histogram.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3, "histogram sums to {sum}");
    }

    #[test]
    fn flat_image_has_uniform_lbp_and_no_edges() {
        let face = flat_gray_image(200, 200, 128);
        let features = extractor().extract(&face).expect("extract");

        // Every neighbor equals the center, so every pixel lands in bin 255.
        assert!((features.texture_histogram[255] - 1.0).abs() < 1e-6);
        assert_eq!(features.edge_density, 0.0);
        assert_eq!(features.mean_gradient, 0.0);
        assert_eq!(features.eye_count, 0);
        assert_eq!(features.eye_area_ratio, 0.0);
        assert_eq!(features.inter_eye_ratio, 0.0);
    }

    #[test]
    fn aspect_ratio_reflects_crop_before_resizing() {
        let face = flat_gray_image(60, 100, 128);
        let features = extractor().extract(&face).expect("extract");
        assert!((features.aspect_ratio - 0.6).abs() < 1e-6);
    }

    #[test]
    fn synthetic_face_produces_ocular_ratios() {
        let face = synthetic_face(200, 200);
        let features = extractor().extract(&face).expect("extract");

        assert_eq!(features.eye_count, 2);
        assert!(features.eye_area_ratio > 0.0);
        assert!(
            features.inter_eye_ratio > 0.2 && features.inter_eye_ratio < 0.7,
            "inter-eye ratio {}",
            features.inter_eye_ratio
        );
    }

    #[test]
    fn single_eye_zeroes_both_ocular_ratios() {
        let extractor = FeatureExtractor::with_eye_locator(200, Box::new(SingleEyeLocator));
        let face = flat_gray_image(200, 200, 128);
        let features = extractor.extract(&face).expect("extract");

        assert_eq!(features.eye_count, 1);
        assert_eq!(features.eye_area_ratio, 0.0);
        assert_eq!(features.inter_eye_ratio, 0.0);
    }

    #[test]
    fn textured_face_has_nonzero_edges_and_gradient() {
        let face = synthetic_face(200, 200);
        let features = extractor().extract(&face).expect("extract");
        assert!(features.edge_density > 0.0);
        assert!(features.mean_gradient > 0.0);
        assert!(features.intensity_stddev > 0.0);
    }

    #[test]
    fn empty_crop_is_rejected() {
        let face = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        assert!(extractor().extract(&face).is_err());
    }

    #[test]
    fn extraction_is_deterministic() {
        let face = synthetic_face(200, 200);
        let a = extractor().extract(&face).expect("extract");
        let b = extractor().extract(&face).expect("extract");
        assert_eq!(a, b);
    }
}
