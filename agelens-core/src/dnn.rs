//! ONNX SSD face detector tier.
//!
//! Loads a 300x300 SSD face detection graph with `tract-onnx` and decodes its
//! `[1, 1, N, 7]` output rows (`image_id, label, confidence, x1, y1, x2, y2`,
//! box coordinates normalized to `[0, 1]`) into clamped pixel-space regions.

use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use image::DynamicImage;
use log::{debug, warn};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, Tensor, TypedFact, TypedOp, tvec,
    tract_ndarray::ArrayView2,
};

use crate::region::FaceRegion;
use agelens_utils::config::InputDimensions;
use agelens_utils::image_utils::{resize_filter, resize_image, rgb_to_bgr_chw_mean};
use agelens_utils::timing_guard;

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const OUTPUT_COLS: usize = 7;
/// Per-channel BGR means matching OpenCV's `blobFromImage` for SSD face models.
const BLOB_MEANS: [f32; 3] = [104.0, 177.0, 123.0];

/// Wrapper around the SSD face detection ONNX runnable model.
#[derive(Debug)]
pub struct SsdFaceModel {
    runnable: RunnableModel,
    input: InputDimensions,
}

impl SsdFaceModel {
    /// Load and optimize the SSD ONNX graph.
    pub fn load<P: AsRef<Path>>(model_path: P, input: InputDimensions) -> Result<Self> {
        let path = model_path.as_ref();
        anyhow::ensure!(path.exists(), "model file not found: {}", path.display());
        anyhow::ensure!(
            input.width > 0 && input.height > 0,
            "input dimensions must be greater than zero"
        );

        let runnable = match load_runnable_model(path, true) {
            Ok(model) => {
                debug!(
                    "SSD face model {} optimized successfully ({}x{})",
                    path.display(),
                    input.width,
                    input.height
                );
                model
            }
            Err(opt_err) => {
                let optimize_msg = format!("{opt_err}");
                let mut chain_msg = String::new();
                for cause in opt_err.chain() {
                    let _ = writeln!(&mut chain_msg, "  - {cause}");
                }
                warn!(
                    "SSD face model {} failed optimized load ({}); falling back to decluttered graph.\nError chain:\n{}",
                    path.display(),
                    optimize_msg,
                    chain_msg.trim_end()
                );
                load_runnable_model(path, false).with_context(|| {
                    format!(
                        "fallback to decluttered SSD graph failed after optimize error: {optimize_msg}"
                    )
                })?
            }
        };

        Ok(Self { runnable, input })
    }

    /// Run the detector over an image and return clamped face regions.
    ///
    /// Rows with confidence at or below `score_threshold` and boxes that
    /// clamp to nothing are discarded. The result is ordered as emitted by
    /// the model (descending confidence for SSD graphs).
    pub fn detect(&self, image: &DynamicImage, score_threshold: f32) -> Result<Vec<FaceRegion>> {
        let _guard = timing_guard("agelens_core::dnn_detect", log::Level::Debug);

        let (orig_w, orig_h) = (image.width(), image.height());
        anyhow::ensure!(
            orig_w > 0 && orig_h > 0,
            "source image dimensions must be greater than zero"
        );

        let resized = resize_image(
            image,
            self.input.width,
            self.input.height,
            resize_filter(self.input.resize_quality),
        );
        let chw = rgb_to_bgr_chw_mean(&resized, BLOB_MEANS);
        let shape = [
            1usize,
            3,
            self.input.height as usize,
            self.input.width as usize,
        ];
        let (data, offset) = chw.into_raw_vec_and_offset();
        debug_assert_eq!(offset, Some(0), "expected contiguous array");
        let tensor = Tensor::from_shape(&shape, &data)
            .map_err(|e| anyhow::anyhow!("failed to build input tensor: {e}"))?;

        let output = self.run(tensor)?;
        decode_detections(&output, score_threshold, (orig_w, orig_h))
    }

    /// Execute the graph with a prepared tensor and return the raw output.
    fn run(&self, input: Tensor) -> Result<Tensor> {
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| anyhow::anyhow!("SSD execution failed: {e}"))?;

        let mut tensors: Vec<Tensor> = outputs
            .into_iter()
            .map(|value| value.into_tensor())
            .collect();

        match tensors.len() {
            0 => anyhow::bail!("SSD model produced no outputs"),
            _ => Ok(tensors.remove(0)),
        }
    }
}

fn load_runnable_model(path: &Path, optimized: bool) -> Result<RunnableModel> {
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?;

    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize SSD graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make SSD graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check SSD graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter SSD graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make SSD graph runnable: {e}"))
    }
}

/// Decode SSD output rows into filtered, clamped face regions.
pub fn decode_detections(
    output: &Tensor,
    score_threshold: f32,
    image_size: (u32, u32),
) -> Result<Vec<FaceRegion>> {
    let rows = detection_rows(output)?;
    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);

    let mut regions = Vec::with_capacity(rows.nrows());
    for row in rows.rows() {
        let confidence = row[2];
        if !confidence.is_finite() || confidence <= score_threshold {
            continue;
        }

        let x1 = row[3] * img_w;
        let y1 = row[4] * img_h;
        let x2 = row[5] * img_w;
        let y2 = row[6] * img_h;

        if let Some(region) = FaceRegion::from_detection(
            x1,
            y1,
            x2 - x1,
            y2 - y1,
            confidence,
            image_size,
        ) {
            regions.push(region);
        }
    }

    Ok(regions)
}

/// Extract the detection rows from the model's output tensor.
fn detection_rows(output: &Tensor) -> Result<ArrayView2<'_, f32>> {
    let shape = output.shape();
    let rows = match shape {
        [rows, OUTPUT_COLS] => *rows,
        [1, rows, OUTPUT_COLS] => *rows,
        [1, 1, rows, OUTPUT_COLS] => *rows,
        other => anyhow::bail!(
            "SSD output must have shape [N, 7], [1, N, 7] or [1, 1, N, 7] (got {:?})",
            other
        ),
    };

    let slice = output
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("SSD output is not f32: {e}"))?;

    ArrayView2::from_shape((rows, OUTPUT_COLS), slice)
        .map_err(|_| anyhow::anyhow!("SSD output data is not contiguous"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as IoWrite;
    use tempfile::NamedTempFile;

    fn tensor_from_rows(rows: &[[f32; 7]]) -> Tensor {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::from_shape(&[1, 1, rows.len(), 7], &flat).unwrap()
    }

    #[test]
    fn decode_filters_by_confidence_and_scales_boxes() {
        let tensor = tensor_from_rows(&[
            [0.0, 1.0, 0.92, 0.10, 0.20, 0.30, 0.60],
            [0.0, 1.0, 0.20, 0.50, 0.50, 0.70, 0.70],
        ]);

        let regions = decode_detections(&tensor, 0.5, (200, 100)).expect("decode");
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.x, 20);
        assert_eq!(region.y, 20);
        assert_eq!(region.width, 40);
        assert_eq!(region.height, 40);
        assert!((region.confidence - 0.92).abs() < f32::EPSILON);
        assert!(!region.is_manual);
    }

    #[test]
    fn decode_clamps_boxes_to_image_bounds() {
        let tensor = tensor_from_rows(&[[0.0, 1.0, 0.8, -0.10, 0.80, 0.40, 1.30]]);

        let regions = decode_detections(&tensor, 0.5, (100, 100)).expect("decode");
        assert_eq!(regions.len(), 1);
        assert!(regions[0].contained_in((100, 100)));
    }

    #[test]
    fn decode_discards_degenerate_boxes() {
        let tensor = tensor_from_rows(&[[0.0, 1.0, 0.9, 0.50, 0.50, 0.50, 0.50]]);
        let regions = decode_detections(&tensor, 0.5, (100, 100)).expect("decode");
        assert!(regions.is_empty());
    }

    #[test]
    fn decode_handles_flat_output_shape() {
        let flat = [0.0f32, 1.0, 0.9, 0.1, 0.1, 0.2, 0.2];
        let tensor = Tensor::from_shape(&[1, 7], &flat).unwrap();
        let regions = decode_detections(&tensor, 0.5, (100, 100)).expect("decode");
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn decode_rejects_unexpected_shape() {
        let tensor = Tensor::from_shape(&[2, 5], &[0f32; 10]).unwrap();
        assert!(decode_detections(&tensor, 0.5, (100, 100)).is_err());
    }

    #[test]
    fn loading_missing_model_fails() {
        let result = SsdFaceModel::load("missing.onnx", InputDimensions::default());
        assert!(result.is_err());
    }

    #[test]
    fn invalid_model_produces_useful_error() {
        let mut temp = NamedTempFile::new().expect("temp file");
        temp.write_all(b"not a real onnx file")
            .expect("write mock model");

        let err = SsdFaceModel::load(temp.path(), InputDimensions::default())
            .expect_err("invalid ONNX should fail");
        let message = format!("{err}");
        assert!(
            message.contains("failed to parse ONNX") || message.contains("unable to optimize"),
            "Unexpected error message: {message}"
        );
    }
}
