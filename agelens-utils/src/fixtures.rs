//! Synthetic image builders shared by unit and integration tests.
//!
//! The repository ships no binary image assets; tests construct small
//! deterministic images in memory instead. The face builder produces a crop
//! with skin-like texture, two dark eye patches, and a mouth line so that
//! feature extraction has real structure to measure.

use image::{DynamicImage, Rgb, RgbImage};

/// A single flat gray field.
pub fn flat_gray_image(width: u32, height: u32, value: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
}

/// A flat field with one axis-aligned gray square, for featureless-image
/// scenarios (no detector should find a face here).
pub fn gray_square_on_flat(
    width: u32,
    height: u32,
    square_x: u32,
    square_y: u32,
    square_size: u32,
    background: u8,
    square_value: u8,
) -> DynamicImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([background; 3]));
    for y in square_y..(square_y + square_size).min(height) {
        for x in square_x..(square_x + square_size).min(width) {
            img.put_pixel(x, y, Rgb([square_value; 3]));
        }
    }
    DynamicImage::ImageRgb8(img)
}

/// A synthetic face crop: textured skin tone, two dark eye patches in the
/// upper band, and a darker mouth line.
///
/// Deterministic; repeated calls with the same dimensions produce identical
/// pixels.
pub fn synthetic_face(width: u32, height: u32) -> DynamicImage {
    let mut img = RgbImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            // Mild deterministic texture so LBP and gradient terms are non-trivial.
            let ripple = ((x.wrapping_mul(31) ^ y.wrapping_mul(17)) % 13) as i32 - 6;
            let value = (170 + ripple).clamp(0, 255) as u8;
            img.put_pixel(x, y, Rgb([value, value, value]));
        }
    }

    let eye_w = (width / 8).max(2);
    let eye_h = (height / 12).max(2);
    let eye_y = height * 7 / 20;
    let left_eye_x = width * 22 / 100;
    let right_eye_x = width * 66 / 100;
    for (ex, ey) in [(left_eye_x, eye_y), (right_eye_x, eye_y)] {
        for y in ey..(ey + eye_h).min(height) {
            for x in ex..(ex + eye_w).min(width) {
                img.put_pixel(x, y, Rgb([40, 40, 40]));
            }
        }
    }

    let mouth_y = height * 3 / 4;
    for y in mouth_y..(mouth_y + (height / 40).max(1)).min(height) {
        for x in (width / 3)..(width * 2 / 3) {
            img.put_pixel(x, y, Rgb([90, 90, 90]));
        }
    }

    DynamicImage::ImageRgb8(img)
}
