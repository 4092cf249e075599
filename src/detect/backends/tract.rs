#![cfg(feature = "backend-tract")]

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::EmotionClassifier;
use crate::detect::result::{AnalysisRequest, ClassifierOutput, Emotion};
use crate::detect::subject_visible;
use crate::frame::Frame;

/// Input/output layout of an ONNX emotion model.
#[derive(Clone, Debug)]
pub struct TractModelSpec {
    pub width: u32,
    pub height: u32,
    /// Feed a single luma channel instead of RGB.
    pub grayscale: bool,
    /// Multiplier applied to 0..=255 pixel values.
    pub pixel_scale: f32,
    /// Label for each output index; `None` marks classes outside the label set.
    pub labels: Vec<Option<Emotion>>,
}

impl Default for TractModelSpec {
    /// FER+ layout: 64x64 luma, raw pixel values, eight logits.
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            grayscale: true,
            pixel_scale: 1.0,
            labels: vec![
                Some(Emotion::Neutral),
                Some(Emotion::Happy),
                Some(Emotion::Surprise),
                Some(Emotion::Sad),
                Some(Emotion::Angry),
                Some(Emotion::Disgust),
                Some(Emotion::Fear),
                None,
            ],
        }
    }
}

/// Tract-based classifier for ONNX emotion models.
///
/// The whole frame is treated as the subject; a blank frame counts as no subject.
/// No network I/O and no disk writes beyond model loading.
pub struct TractClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    spec: TractModelSpec,
}

impl TractClassifier {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, spec: TractModelSpec) -> Result<Self> {
        let model_path = model_path.as_ref();
        let channels = if spec.grayscale { 1 } else { 3 };
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, channels, spec.height as usize, spec.width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, spec })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let resized = imageops::resize(
            frame.image(),
            self.spec.width,
            self.spec.height,
            FilterType::Triangle,
        );
        let channels = if self.spec.grayscale { 1 } else { 3 };
        let scale = self.spec.pixel_scale;
        let grayscale = self.spec.grayscale;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, channels, self.spec.height as usize, self.spec.width as usize),
            |(_, channel, y, x)| {
                let [r, g, b] = resized.get_pixel(x as u32, y as u32).0;
                let value = if grayscale {
                    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
                } else {
                    [r, g, b][channel] as f32
                };
                value * scale
            },
        );
        input.into_tensor()
    }

    fn extract_scores(&self, outputs: TVec<TValue>) -> Result<ClassifierOutput> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let logits: Vec<f32> = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .iter()
            .copied()
            .collect();
        if logits.len() != self.spec.labels.len() {
            return Err(anyhow!(
                "model produced {} scores, expected {}",
                logits.len(),
                self.spec.labels.len()
            ));
        }

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f64> = logits.iter().map(|v| ((v - max) as f64).exp()).collect();
        let total: f64 = exp.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(anyhow!("model produced non-finite scores"));
        }

        let mut scores = BTreeMap::new();
        for (label, value) in self.spec.labels.iter().zip(exp) {
            if let Some(emotion) = label {
                *scores.entry(*emotion).or_insert(0.0) += value / total * 100.0;
            }
        }
        ClassifierOutput::from_scores(scores)
    }
}

impl EmotionClassifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn analyze(&mut self, frame: &Frame, request: &AnalysisRequest) -> Result<ClassifierOutput> {
        if !subject_visible(frame) {
            if request.enforce_detection {
                return Err(anyhow!("no face detected in frame"));
            }
            return Ok(ClassifierOutput::neutral());
        }
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_scores(outputs)
    }
}
