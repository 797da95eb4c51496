//! Eye sub-detection used for ocular feature ratios.
//!
//! Eyes sit in the upper band of a normalized face and read darker than the
//! surrounding skin, so the default locator scans that band for the darkest
//! window on each side and keeps it when it is clearly below the face's mean
//! intensity. Finding fewer than two eyes is a valid outcome; the feature
//! extractor represents it as zeroed ocular ratios.

use image::GrayImage;

/// Bounding box of a located eye, in normalized-face pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl EyeBox {
    /// Center of the box.
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Pixel area of the box.
    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }
}

/// Pluggable eye detection backend.
///
/// The default implementation is classical; implement this trait to supply a
/// model-backed locator without touching the feature extractor.
pub trait EyeLocator: Send + Sync + std::fmt::Debug {
    /// Locate candidate eyes in a normalized grayscale face, ordered by
    /// horizontal position.
    fn locate_eyes(&self, face: &GrayImage) -> Vec<EyeBox>;
}

/// A window's mean must fall below this fraction of the face mean to count
/// as an eye.
const DARKNESS_RATIO: f32 = 0.78;
/// Pixels below this fraction of the face mean are treated as part of the
/// eye when refining the box.
const PIXEL_RATIO: f32 = 0.70;

/// Default classical eye locator: darkest-window search over the upper band.
#[derive(Debug, Default, Clone, Copy)]
pub struct DarkRegionEyeLocator;

impl EyeLocator for DarkRegionEyeLocator {
    fn locate_eyes(&self, face: &GrayImage) -> Vec<EyeBox> {
        let (w, h) = face.dimensions();
        if w < 20 || h < 20 {
            return Vec::new();
        }

        let face_mean = mean_intensity(face, 0, 0, w, h);
        if face_mean <= 0.0 {
            return Vec::new();
        }

        // Eye band: 25%..50% of face height; halves keep a margin from the
        // face border and the nose line.
        let band_top = h / 4;
        let band_bottom = h / 2;
        let margin = w / 10;
        let center_gap = w / 20;

        let win_w = (w * 3 / 20).max(4);
        let win_h = ((band_bottom - band_top) / 2).max(3);

        let mut eyes = Vec::with_capacity(2);
        let halves = [
            (margin, w / 2 - center_gap),
            (w / 2 + center_gap, w - margin),
        ];
        for (x_start, x_end) in halves {
            if x_end <= x_start + win_w {
                continue;
            }
            if let Some(eye) = darkest_window(
                face,
                face_mean,
                x_start,
                x_end,
                band_top,
                band_bottom,
                win_w,
                win_h,
            ) {
                eyes.push(eye);
            }
        }

        eyes.sort_by_key(|eye| eye.x);
        eyes
    }
}

/// Scan a half-band for its darkest window and refine it to the dark pixel
/// extent. Returns `None` when nothing reads clearly darker than the face.
#[allow(clippy::too_many_arguments)]
fn darkest_window(
    face: &GrayImage,
    face_mean: f32,
    x_start: u32,
    x_end: u32,
    y_start: u32,
    y_end: u32,
    win_w: u32,
    win_h: u32,
) -> Option<EyeBox> {
    let step = 2u32;
    let mut best: Option<(f32, u32, u32)> = None;

    let mut y = y_start;
    while y + win_h <= y_end {
        let mut x = x_start;
        while x + win_w <= x_end {
            let mean = mean_intensity(face, x, y, win_w, win_h);
            if best.is_none_or(|(m, _, _)| mean < m) {
                best = Some((mean, x, y));
            }
            x += step;
        }
        y += step;
    }

    let (mean, x, y) = best?;
    if mean >= face_mean * DARKNESS_RATIO {
        return None;
    }

    Some(refine_box(face, face_mean, x, y, win_w, win_h))
}

/// Shrink a window to the bounding box of its dark pixels; falls back to the
/// window itself when no pixel crosses the threshold.
fn refine_box(face: &GrayImage, face_mean: f32, x: u32, y: u32, win_w: u32, win_h: u32) -> EyeBox {
    let threshold = face_mean * PIXEL_RATIO;
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut found = false;

    for py in y..y + win_h {
        for px in x..x + win_w {
            if (face.get_pixel(px, py)[0] as f32) < threshold {
                min_x = min_x.min(px);
                min_y = min_y.min(py);
                max_x = max_x.max(px);
                max_y = max_y.max(py);
                found = true;
            }
        }
    }

    if found {
        EyeBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    } else {
        EyeBox {
            x,
            y,
            width: win_w,
            height: win_h,
        }
    }
}

fn mean_intensity(face: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> f32 {
    let mut sum = 0u64;
    for py in y..y + h {
        for px in x..x + w {
            sum += face.get_pixel(px, py)[0] as u64;
        }
    }
    sum as f32 / (w as f32 * h as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agelens_utils::fixtures::synthetic_face;
    use agelens_utils::image_utils::normalize_face;

    #[test]
    fn finds_two_eyes_on_synthetic_face() {
        let face = synthetic_face(200, 200);
        let norm = normalize_face(&face, 200).expect("normalize");

        let locator = DarkRegionEyeLocator;
        let eyes = locator.locate_eyes(&norm);
        assert_eq!(eyes.len(), 2, "expected both eye patches: {eyes:?}");
        // Left eye is reported first.
        assert!(eyes[0].x < eyes[1].x);
        // Both sit in the upper band.
        for eye in &eyes {
            assert!(eye.y >= 50 && eye.y < 100, "eye outside band: {eye:?}");
        }
    }

    #[test]
    fn flat_face_has_no_eyes() {
        let norm = GrayImage::from_pixel(200, 200, image::Luma([128]));
        let locator = DarkRegionEyeLocator;
        assert!(locator.locate_eyes(&norm).is_empty());
    }

    #[test]
    fn tiny_faces_are_skipped() {
        let norm = GrayImage::from_pixel(10, 10, image::Luma([60]));
        let locator = DarkRegionEyeLocator;
        assert!(locator.locate_eyes(&norm).is_empty());
    }

    #[test]
    fn eye_boxes_are_idempotent() {
        let face = synthetic_face(200, 200);
        let norm = normalize_face(&face, 200).expect("normalize");
        let locator = DarkRegionEyeLocator;
        assert_eq!(locator.locate_eyes(&norm), locator.locate_eyes(&norm));
    }
}
