#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::classify::backend::OccupancyClassifier;
use crate::frame::{Crop, PixelLayout};

/// Tract-based backend for ONNX spot classifiers.
///
/// The model takes a `1x3xHxW` float tensor in `0..1` and produces occupancy
/// scores; the highest score is compared against the threshold. Crops are
/// resampled to the model input with nearest-neighbour lookup.
pub struct TractClassifier {
    model: TypedSimplePlan<TypedModel>,
    width: u32,
    height: u32,
    threshold: f32,
}

impl TractClassifier {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if width == 0 || height == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            threshold: 0.5,
        })
    }

    /// Override the default score threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    fn build_input(&self, crop: &Crop<'_>) -> Tensor {
        let rows: Vec<&[u8]> = crop.rows().collect();
        let channels = crop.layout().channels();
        let (crop_w, crop_h) = (crop.width() as usize, crop.height() as usize);
        let (model_w, model_h) = (self.width as usize, self.height as usize);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, model_h, model_w),
            |(_, channel, y, x)| {
                let src_y = y * crop_h / model_h;
                let src_x = x * crop_w / model_w;
                let src_c = match crop.layout() {
                    PixelLayout::Gray8 => 0,
                    PixelLayout::Rgb8 => channel,
                };
                rows[src_y][src_x * channels + src_c] as f32 / 255.0
            },
        );
        input.into_tensor()
    }

    fn extract_score(&self, outputs: TVec<TValue>) -> Result<f32> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let max_score = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        if max_score.is_finite() {
            Ok(max_score)
        } else {
            Ok(0.0)
        }
    }
}

impl OccupancyClassifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classify(&self, crop: &Crop<'_>) -> Result<bool> {
        let input = self.build_input(crop);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let score = self.extract_score(outputs)?;
        Ok(score >= self.threshold)
    }
}
