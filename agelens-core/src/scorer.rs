//! Primary weighted age scorer.
//!
//! Maps a [`FeatureVector`] to an age by summing weighted heuristic terms on
//! top of a fixed baseline, optionally perturbing the result with bounded
//! noise, and clamping into the supported age range.

use anyhow::Result;
use log::trace;
use rand::Rng;

use crate::features::{FeatureVector, TEXTURE_BINS};

/// Baseline age every term adjusts from.
const BASELINE_AGE: f32 = 35.0;
/// Final clamp range of the primary scorer.
const MIN_AGE: f32 = 18.0;
const MAX_AGE: f32 = 80.0;
/// Half-range of the randomized perturbation, in years.
const PRIMARY_NOISE_RANGE: f32 = 4.0;

/// Term weights.
const TEXTURE_WEIGHT: f32 = 0.2;
const WRINKLE_WEIGHT: f32 = 0.3;
const GEOMETRY_WEIGHT: f32 = 0.8;
const OCULAR_WEIGHT: f32 = 1.0;
const GRADIENT_WEIGHT: f32 = 0.15;

/// Source of the scorer's bounded random perturbation.
///
/// Injecting this keeps the scorer testable while production runs stay
/// unseeded.
pub trait NoiseSource: Send + Sync + std::fmt::Debug {
    /// Sample a value in `[-half_range, half_range]`.
    fn sample(&self, half_range: f32) -> f32;
}

/// Thread-local RNG noise, the production default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngNoise;

impl NoiseSource for ThreadRngNoise {
    fn sample(&self, half_range: f32) -> f32 {
        if half_range <= 0.0 {
            return 0.0;
        }
        rand::thread_rng().gen_range(-half_range..=half_range)
    }
}

/// Constant noise for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedNoise(pub f32);

impl NoiseSource for FixedNoise {
    fn sample(&self, _half_range: f32) -> f32 {
        self.0
    }
}

/// Weighted heuristic age scorer.
#[derive(Debug)]
pub struct AgeScorer {
    noise: Box<dyn NoiseSource>,
    noise_enabled: bool,
}

impl AgeScorer {
    /// Scorer with the production thread-RNG noise source.
    pub fn new(noise_enabled: bool) -> Self {
        Self::with_noise_source(Box::new(ThreadRngNoise), noise_enabled)
    }

    /// Scorer with a caller-supplied noise source.
    pub fn with_noise_source(noise: Box<dyn NoiseSource>, noise_enabled: bool) -> Self {
        Self {
            noise,
            noise_enabled,
        }
    }

    /// Map a feature vector to an age in `[18, 80]`.
    pub fn score(&self, features: &FeatureVector) -> Result<u32> {
        anyhow::ensure!(
            features.texture_histogram.len() == TEXTURE_BINS,
            "texture histogram must have {TEXTURE_BINS} bins (got {})",
            features.texture_histogram.len()
        );

        let texture = texture_term(&features.texture_histogram);
        let wrinkle = features.edge_density * 700.0;
        let geometry = geometry_term(features.aspect_ratio);
        let ocular = ocular_term(features);
        let gradient = features.mean_gradient * 0.5;

        let mut age = BASELINE_AGE
            + texture * TEXTURE_WEIGHT
            + wrinkle * WRINKLE_WEIGHT
            + geometry * GEOMETRY_WEIGHT
            + ocular * OCULAR_WEIGHT
            + gradient * GRADIENT_WEIGHT;

        if self.noise_enabled {
            age += self.noise.sample(PRIMARY_NOISE_RANGE);
        }

        anyhow::ensure!(age.is_finite(), "age score is not finite");
        trace!(
            "score terms: texture {texture:.2}, wrinkle {wrinkle:.2}, geometry {geometry:.2}, \
             ocular {ocular:.2}, gradient {gradient:.2} -> {age:.2}"
        );

        Ok(age.clamp(MIN_AGE, MAX_AGE).round() as u32)
    }
}

/// Texture term: histogram mass weighted toward high-pattern bins.
fn texture_term(histogram: &[f32]) -> f32 {
    histogram
        .iter()
        .enumerate()
        .map(|(i, &mass)| {
            let position = i as f32 / (TEXTURE_BINS - 1) as f32;
            mass * position * position
        })
        .sum::<f32>()
        * 100.0
}

/// Geometry term: narrow faces read older, wide faces read younger.
fn geometry_term(aspect_ratio: f32) -> f32 {
    if aspect_ratio < 0.75 {
        5.0
    } else if aspect_ratio > 0.85 {
        -8.0
    } else {
        0.0
    }
}

/// Ocular term: large or widely-spaced eyes read younger.
fn ocular_term(features: &FeatureVector) -> f32 {
    let mut term = 0.0;
    if features.eye_area_ratio > 0.03 {
        term -= 5.0;
    }
    if features.inter_eye_ratio > 0.4 {
        term -= 3.0;
    }
    term
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_features() -> FeatureVector {
        FeatureVector {
            texture_histogram: vec![0.0; TEXTURE_BINS],
            edge_density: 0.0,
            aspect_ratio: 0.8,
            mean_gradient: 0.0,
            intensity_mean: 128.0,
            intensity_stddev: 40.0,
            eye_count: 0,
            eye_area_ratio: 0.0,
            inter_eye_ratio: 0.0,
        }
    }

    fn silent_scorer() -> AgeScorer {
        AgeScorer::with_noise_source(Box::new(FixedNoise(0.0)), true)
    }

    #[test]
    fn zero_features_score_the_baseline() {
        let age = silent_scorer().score(&base_features()).expect("score");
        assert_eq!(age, 35);
    }

    #[test]
    fn edge_density_raises_the_age() {
        let mut features = base_features();
        features.edge_density = 0.1;
        // 35 + 0.1 * 700 * 0.3 = 56.
        let age = silent_scorer().score(&features).expect("score");
        assert_eq!(age, 56);
    }

    #[test]
    fn aspect_ratio_shifts_in_both_directions() {
        let mut narrow = base_features();
        narrow.aspect_ratio = 0.7;
        // 35 + 5 * 0.8 = 39.
        assert_eq!(silent_scorer().score(&narrow).expect("score"), 39);

        let mut wide = base_features();
        wide.aspect_ratio = 0.9;
        // 35 - 8 * 0.8 = 28.6 -> 29.
        assert_eq!(silent_scorer().score(&wide).expect("score"), 29);
    }

    #[test]
    fn prominent_eyes_lower_the_age() {
        let mut features = base_features();
        features.eye_count = 2;
        features.eye_area_ratio = 0.05;
        features.inter_eye_ratio = 0.45;
        // 35 - 5 - 3 = 27.
        assert_eq!(silent_scorer().score(&features).expect("score"), 27);
    }

    #[test]
    fn result_is_clamped_to_supported_range() {
        let mut old = base_features();
        old.edge_density = 1.0;
        old.mean_gradient = 300.0;
        assert_eq!(silent_scorer().score(&old).expect("score"), 80);

        let mut young = base_features();
        young.aspect_ratio = 0.9;
        young.eye_area_ratio = 0.05;
        young.inter_eye_ratio = 0.45;
        let scorer = AgeScorer::with_noise_source(Box::new(FixedNoise(-30.0)), true);
        assert_eq!(scorer.score(&young).expect("score"), 18);
    }

    #[test]
    fn disabling_noise_ignores_the_source() {
        let scorer = AgeScorer::with_noise_source(Box::new(FixedNoise(4.0)), false);
        assert_eq!(scorer.score(&base_features()).expect("score"), 35);
    }

    #[test]
    fn thread_rng_noise_stays_in_range() {
        let noise = ThreadRngNoise;
        for _ in 0..200 {
            let sample = noise.sample(4.0);
            assert!((-4.0..=4.0).contains(&sample));
        }
        assert_eq!(noise.sample(0.0), 0.0);
    }

    #[test]
    fn wrong_histogram_size_is_rejected() {
        let mut features = base_features();
        features.texture_histogram = vec![0.0; 16];
        assert!(silent_scorer().score(&features).is_err());
    }

    #[test]
    fn uniform_texture_adds_a_third() {
        let mut features = base_features();
        features.texture_histogram = vec![1.0 / TEXTURE_BINS as f32; TEXTURE_BINS];
        // Mean of position^2 over a uniform histogram is ~1/3, so the term is
        // ~33.4 and the weighted contribution ~6.7.
        let age = silent_scorer().score(&features).expect("score");
        assert_eq!(age, 42);
    }
}
