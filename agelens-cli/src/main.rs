use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use agelens_core::{AgeEstimator, EstimationResult, ManualRegion};
use agelens_utils::{
    config::{AppSettings, ScoringStrategy},
    init_logging, normalize_path, telemetry,
};

/// Estimate ages for faces in images or directories of images.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct EstimateArgs {
    /// Path to an image file or a directory containing images.
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the SSD face detection ONNX model (defaults to settings).
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Path to the SeetaFace cascade model (defaults to settings).
    #[arg(long)]
    cascade_model: Option<PathBuf>,

    /// Optional settings JSON (defaults to built-in parameters).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Manual face region as `x,y,width,height`, bypassing detection.
    #[arg(long, value_name = "X,Y,W,H")]
    manual: Option<String>,

    /// Override the DNN detection score threshold.
    #[arg(long)]
    score_threshold: Option<f32>,

    /// Override the scoring strategy (`weighted` or `intensity_only`).
    #[arg(long, value_name = "STRATEGY")]
    strategy: Option<ScoringStrategy>,

    /// Disable the randomized perturbation for reproducible output.
    #[arg(long, action = ArgAction::SetTrue)]
    no_noise: bool,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    telemetry_level: Option<String>,

    /// Write estimates to a JSON file instead of stdout.
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PositionRecord {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct FaceRecord {
    age: u32,
    position: PositionRecord,
    confidence: f32,
    manual: bool,
}

#[derive(Debug, Serialize)]
struct ImageEstimates {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<FaceRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = EstimateArgs::parse();

    let input_path = normalize_path(&args.input)?;
    let manual = args
        .manual
        .as_deref()
        .map(parse_manual_region)
        .transpose()?;

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    telemetry::configure(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    info!(
        "Building age estimation pipeline (strategy: {}, noise: {})",
        settings.scoring.strategy,
        if settings.scoring.noise_enabled {
            "on"
        } else {
            "off"
        }
    );
    let estimator = AgeEstimator::from_settings(&settings)?;

    let images = collect_images(&input_path)?;
    if images.is_empty() {
        anyhow::bail!(
            "no images found at {} (supported extensions: jpg, jpeg, png, bmp, webp)",
            input_path.display()
        );
    }

    info!("Processing {} image(s)...", images.len());
    let mut results = Vec::with_capacity(images.len());
    for image_path in images {
        results.push(estimate_one(&estimator, &image_path, manual.as_ref()));
    }

    if let Some(json_path) = args.json.as_ref() {
        if let Some(dir) = json_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, &results)
            .with_context(|| format!("failed to write estimate JSON to {}", json_path.display()))?;
        info!("Wrote estimates to {}", json_path.display());
    } else {
        let json =
            serde_json::to_string_pretty(&results).context("failed to serialize estimates")?;
        println!("{json}");
    }

    Ok(())
}

fn estimate_one(
    estimator: &AgeEstimator,
    image_path: &Path,
    manual: Option<&ManualRegion>,
) -> ImageEstimates {
    let image_name = image_path.display().to_string();
    let image = match agelens_utils::image_utils::load_image(image_path) {
        Ok(image) => image,
        Err(err) => {
            warn!("Failed to load {image_name}: {err:#}");
            return ImageEstimates {
                image: image_name,
                results: None,
                error: Some(format!("{err:#}")),
            };
        }
    };

    match estimator.estimate_ages(&image, manual) {
        Ok(estimates) => {
            info!("{image_name} -> {} face(s)", estimates.len());
            ImageEstimates {
                image: image_name,
                results: Some(estimates.iter().map(FaceRecord::from).collect()),
                error: None,
            }
        }
        Err(err) => {
            warn!("No estimate for {image_name}: {err}");
            ImageEstimates {
                image: image_name,
                results: None,
                error: Some(err.to_string()),
            }
        }
    }
}

fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        AppSettings::load_from_path(&resolved)
    } else {
        Ok(AppSettings::default())
    }
}

fn apply_cli_overrides(settings: &mut AppSettings, args: &EstimateArgs) {
    if let Some(model) = args.model.as_ref() {
        settings.models.face_model = Some(model.display().to_string());
    }
    if let Some(cascade) = args.cascade_model.as_ref() {
        settings.models.cascade_model = Some(cascade.display().to_string());
    }
    if let Some(score) = args.score_threshold {
        settings.detection.score_threshold = score;
    }
    if let Some(strategy) = args.strategy {
        settings.scoring.strategy = strategy;
    }
    if args.no_noise {
        settings.scoring.noise_enabled = false;
    }
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        settings.telemetry.level = level.clone();
    }
}

/// Parse an `x,y,width,height` manual region argument.
fn parse_manual_region(raw: &str) -> Result<ManualRegion> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    anyhow::ensure!(
        parts.len() == 4,
        "manual region must be `x,y,width,height` (got `{raw}`)"
    );

    let mut values = [0i64; 4];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part
            .parse()
            .with_context(|| format!("invalid manual region component `{part}`"))?;
    }

    Ok(ManualRegion {
        x: values[0],
        y: values[1],
        width: values[2],
        height: values[3],
    })
}

fn collect_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        anyhow::bail!(
            "input path is neither file nor directory: {}",
            path.display()
        );
    }

    let exts = ["jpg", "jpeg", "png", "bmp", "webp"];
    let mut images = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
            let ext_lower = ext.to_ascii_lowercase();
            if exts.contains(&ext_lower.as_str()) {
                images.push(entry.path().to_path_buf());
            } else {
                debug!("Skipping non-image file {}", entry.path().display());
            }
        }
    }
    images.sort();
    Ok(images)
}

impl From<&EstimationResult> for FaceRecord {
    fn from(result: &EstimationResult) -> Self {
        Self {
            age: result.age,
            position: PositionRecord {
                x: result.region.x,
                y: result.region.y,
                width: result.region.width,
                height: result.region.height,
            },
            confidence: result.region.confidence,
            manual: result.region.is_manual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_manual_region_accepts_whitespace() {
        let region = parse_manual_region("10, 20, 30, 40").expect("parse");
        assert_eq!(
            region,
            ManualRegion {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            }
        );
    }

    #[test]
    fn parse_manual_region_accepts_negative_origin() {
        let region = parse_manual_region("-5,-5,50,50").expect("parse");
        assert_eq!(region.x, -5);
        assert_eq!(region.y, -5);
    }

    #[test]
    fn parse_manual_region_rejects_malformed_input() {
        assert!(parse_manual_region("10,20,30").is_err());
        assert!(parse_manual_region("10,20,30,forty").is_err());
        assert!(parse_manual_region("").is_err());
    }
}
