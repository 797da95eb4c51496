//! Shared configuration types consumed across the agelens workspace.
//!
//! These structures provide a common representation for detector, extraction,
//! and scoring settings that can be serialized to disk and reused by the CLI
//! and by embedding callers.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::Path,
    str::FromStr,
};

/// Shared detection parameters for the locator tiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum confidence score for a DNN detection to be considered valid.
    pub score_threshold: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
        }
    }
}

/// Resize filter preference controlling the quality vs speed trade-off.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// Preserve visual quality when resizing (default, Triangle filter).
    #[default]
    Quality,
    /// Prioritize throughput for batch processing (Nearest filter).
    Speed,
}

impl fmt::Display for ResizeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ResizeQuality::Quality => "quality",
                ResizeQuality::Speed => "speed",
            }
        )
    }
}

impl FromStr for ResizeQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(ResizeQuality::Quality),
            "speed" => Ok(ResizeQuality::Speed),
            other => Err(format!(
                "invalid resize quality '{other}'; expected 'quality' or 'speed'"
            )),
        }
    }
}

/// DNN input resolution in pixels (width x height).
///
/// The input image is resized to these dimensions before being packed into
/// the detector blob.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
    /// Choose between quality-focused or speed-focused resizing.
    pub resize_quality: ResizeQuality,
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            resize_quality: ResizeQuality::Speed,
        }
    }
}

/// Settings for per-face feature extraction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Side length of the normalized square face crop, in pixels.
    pub face_size: u32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self { face_size: 200 }
    }
}

/// Which scoring formula maps a feature vector to an age.
///
/// The weighted heuristic is the default; the intensity-only formula is the
/// feature-light fallback promoted to a first-class strategy so alternative
/// scorers (including a future trained model) plug in at this boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// Weighted texture/wrinkle/geometry/ocular/gradient combination.
    #[default]
    Weighted,
    /// Intensity statistics and edge density only, deterministic perturbation.
    IntensityOnly,
}

impl fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ScoringStrategy::Weighted => "weighted",
                ScoringStrategy::IntensityOnly => "intensity_only",
            }
        )
    }
}

impl FromStr for ScoringStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted" => Ok(ScoringStrategy::Weighted),
            "intensity_only" | "intensity-only" | "intensity" => Ok(ScoringStrategy::IntensityOnly),
            other => Err(format!(
                "invalid scoring strategy '{other}'; expected 'weighted' or 'intensity_only'"
            )),
        }
    }
}

/// Settings for the age scorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringSettings {
    /// The scoring formula to use.
    pub strategy: ScoringStrategy,
    /// Whether the primary scorer adds its randomized perturbation.
    ///
    /// Disabling noise makes the weighted strategy fully deterministic, which
    /// trades result diversity for reproducibility.
    pub noise_enabled: bool,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            strategy: ScoringStrategy::default(),
            noise_enabled: true,
        }
    }
}

/// Paths to the pre-trained detector artifacts.
///
/// Either path may point at a missing file: an absent artifact disables that
/// detector tier and the locator falls through to the next one. This is a
/// handled condition, never a startup failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelPaths {
    /// ONNX face detector (SSD, 300x300 input). `None` disables the tier.
    pub face_model: Option<String>,
    /// SeetaFace cascade model for the classical fallback tier.
    pub cascade_model: Option<String>,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            face_model: Some("models/res10_300x300_ssd_iter_140000.onnx".into()),
            cascade_model: Some("models/seeta_fd_frontal_v1.0.bin".into()),
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent application settings consumed by the CLI and embedding callers.
///
/// Aggregates all user-configurable parameters so they can be loaded from and
/// saved to a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppSettings {
    /// Detector artifact locations.
    pub models: ModelPaths,
    /// The input dimensions for DNN inference.
    pub input: InputDimensions,
    /// Detection post-processing parameters.
    pub detection: DetectionSettings,
    /// Per-face feature extraction parameters.
    pub extraction: ExtractionSettings,
    /// Age scoring parameters.
    pub scoring: ScoringSettings,
    /// Telemetry and diagnostics preferences.
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// Missing sections fall back to their defaults; a missing or unparsable
    /// file is an error.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON.
    ///
    /// This will overwrite the file if it already exists.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}
