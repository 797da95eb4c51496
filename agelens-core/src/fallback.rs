//! Feature-light fallback scorer and the unconditional safety net.
//!
//! When primary scoring fails, a face can still be mapped to an age from
//! nothing more than its intensity statistics and edge density. The
//! perturbation here is seeded from a pixel checksum so the same crop always
//! produces the same fallback age. The final tier gives up on the pixels
//! entirely and returns a plausible random age.

use anyhow::Result;
use image::DynamicImage;
use imageproc::edges::canny;
use log::debug;
use rand::{Rng, SeedableRng, rngs::StdRng};

use agelens_utils::image_utils::intensity_stats;

const BASELINE_AGE: f32 = 35.0;
const MIN_AGE: f32 = 18.0;
const MAX_AGE: f32 = 75.0;
/// Half-range of the checksum-seeded perturbation, in years.
const FALLBACK_NOISE_RANGE: f32 = 7.0;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 100.0;

/// Wrapping sum of all grayscale pixel bytes.
///
/// Used to seed the fallback perturbation so identical crops get identical
/// fallback ages.
pub fn pixel_checksum(image: &DynamicImage) -> u64 {
    image
        .to_luma8()
        .as_raw()
        .iter()
        .fold(0u64, |acc, &p| acc.wrapping_add(p as u64))
}

/// Estimate an age from intensity statistics alone.
///
/// Deterministic for a given crop: the perturbation RNG is seeded from the
/// crop's pixel checksum. The result is clamped to `[18, 75]`, a slightly
/// narrower band than the primary scorer because this estimate carries less
/// evidence.
pub fn fallback_score(face: &DynamicImage) -> Result<u32> {
    let gray = face.to_luma8();
    anyhow::ensure!(
        gray.width() >= 3 && gray.height() >= 3,
        "face crop too small for fallback scoring ({}x{})",
        gray.width(),
        gray.height()
    );

    let (mean, stddev) = intensity_stats(&gray);
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let edge_pixels = edges.as_raw().iter().filter(|&&p| p > 0).count();
    let density = edge_pixels as f32 / (gray.width() as f32 * gray.height() as f32);

    let mut rng = StdRng::seed_from_u64(pixel_checksum(face));
    let perturbation = rng.gen_range(-FALLBACK_NOISE_RANGE..=FALLBACK_NOISE_RANGE);

    let age = BASELINE_AGE
        + (mean - 128.0) * -0.04
        + (stddev - 40.0) * 0.10
        + density * 400.0 * 0.25
        + perturbation;

    debug!("fallback score: mean {mean:.1}, stddev {stddev:.1}, density {density:.4} -> {age:.1}");
    Ok(age.clamp(MIN_AGE, MAX_AGE).round() as u32)
}

/// Last-resort age when even fallback scoring fails.
///
/// Uniformly random over the central adult range so downstream consumers
/// always receive a value.
pub fn unconditional_age() -> u32 {
    rand::thread_rng().gen_range(25..=65)
}
