use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, RgbImage, imageops::FilterType};
use imageproc::contrast::equalize_histogram;
use ndarray::Array3;

use crate::config::ResizeQuality;

/// Load an image from disk into memory.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Resize an image to the requested resolution using the provided filter.
pub fn resize_image(image: &DynamicImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    image.resize_exact(width, height, filter).to_rgb8()
}

/// Map a resize quality preference onto a sampling filter.
pub fn resize_filter(quality: ResizeQuality) -> FilterType {
    match quality {
        ResizeQuality::Quality => FilterType::Triangle,
        ResizeQuality::Speed => FilterType::Nearest,
    }
}

/// Convert an RGB image into a mean-subtracted BGR CHW array.
///
/// Matches OpenCV's `blobFromImage` with `swapRB=false` on a BGR source:
/// channels are reordered from RGB HWC to BGR CHW and the per-channel mean
/// is subtracted. SSD face detectors expect means of (104, 177, 123).
pub fn rgb_to_bgr_chw_mean(image: &RgbImage, mean: [f32; 3]) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        array[(0, yi, xi)] = pixel[2] as f32 - mean[0]; // Blue
        array[(1, yi, xi)] = pixel[1] as f32 - mean[1]; // Green
        array[(2, yi, xi)] = pixel[0] as f32 - mean[2]; // Red
    }
    array
}

/// Resize a face crop to a standard square and contrast-normalize it.
///
/// The returned image is grayscale with its histogram equalized so that
/// texture and edge measurements are comparable across lighting conditions.
pub fn normalize_face(face: &DynamicImage, size: u32) -> Result<GrayImage> {
    anyhow::ensure!(size > 0, "normalized face size must be non-zero");
    let (w, h) = (face.width(), face.height());
    anyhow::ensure!(w > 0 && h > 0, "face crop dimensions must be non-zero");

    let resized = face.resize_exact(size, size, FilterType::Triangle);
    Ok(equalize_histogram(&resized.to_luma8()))
}

/// Compute the mean and standard deviation of grayscale intensity.
pub fn intensity_stats(image: &GrayImage) -> (f32, f32) {
    let pixels = image.as_raw();
    if pixels.is_empty() {
        return (0.0, 0.0);
    }
    let count = pixels.len() as f64;
    let sum: f64 = pixels.iter().map(|&p| p as f64).sum();
    let mean = sum / count;
    let variance: f64 = pixels
        .iter()
        .map(|&p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / count;
    (mean as f32, variance.sqrt() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn bgr_chw_subtracts_means() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, Rgb([0, 128, 255]));
        image.put_pixel(1, 0, Rgb([255, 128, 0]));
        image.put_pixel(0, 1, Rgb([64, 64, 64]));
        image.put_pixel(1, 1, Rgb([255, 255, 255]));

        let array = rgb_to_bgr_chw_mean(&image, [104.0, 177.0, 123.0]);
        assert_eq!(array.shape(), &[3, 2, 2]);

        // Pixel (0,0): blue channel = 255 - 104, red channel = 0 - 123.
        assert_eq!(array[(0, 0, 0)], 151.0);
        assert_eq!(array[(2, 0, 0)], -123.0);
        assert_eq!(array[(1, 0, 1)], 128.0 - 177.0);
    }

    #[test]
    fn normalize_face_produces_square_grayscale() {
        let face = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 120, Rgb([90, 120, 150])));
        let norm = normalize_face(&face, 200).expect("normalize");
        assert_eq!(norm.dimensions(), (200, 200));
    }

    #[test]
    fn normalize_face_rejects_empty_crop() {
        let face = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(normalize_face(&face, 200).is_err());
    }

    #[test]
    fn intensity_stats_of_flat_image() {
        let gray = GrayImage::from_pixel(16, 16, image::Luma([77]));
        let (mean, stddev) = intensity_stats(&gray);
        assert_eq!(mean, 77.0);
        assert_eq!(stddev, 0.0);
    }

    #[test]
    fn intensity_stats_of_two_level_image() {
        let mut gray = GrayImage::from_pixel(2, 1, image::Luma([0]));
        gray.put_pixel(1, 0, image::Luma([200]));
        let (mean, stddev) = intensity_stats(&gray);
        assert_eq!(mean, 100.0);
        assert_eq!(stddev, 100.0);
    }

}
