//! Emotion classification seam.
//!
//! The classifier is an external collaborator. This module fixes its contract
//! (`EmotionClassifier`), the closed label set, and the backends that ship
//! with the crate.

mod backend;
pub mod backends;
mod result;
mod timeout;

use anyhow::{anyhow, Result};

pub use backend::EmotionClassifier;
pub use backends::StubClassifier;
#[cfg(feature = "backend-tract")]
pub use backends::{TractClassifier, TractModelSpec};
pub use result::{AnalysisAxis, AnalysisRequest, ClassifierOutput, Emotion, EmotionResult};
pub use timeout::TimedClassifier;

use crate::config::InferenceSettings;
use crate::frame::Frame;

/// Luma variance below which a frame is treated as having no subject.
pub const MIN_SUBJECT_VARIANCE: f64 = 20.0;

pub(crate) fn subject_visible(frame: &Frame) -> bool {
    frame.luma_variance() >= MIN_SUBJECT_VARIANCE
}

/// Build the configured classifier, wrapped in a timeout when one is set.
pub fn build_classifier(settings: &InferenceSettings) -> Result<Box<dyn EmotionClassifier>> {
    let mut inner: Box<dyn EmotionClassifier> = match settings.classifier.as_str() {
        "stub" => Box::new(StubClassifier::new()),
        "tract" => build_tract(settings)?,
        other => {
            return Err(anyhow!(
                "unknown classifier '{}'; expected stub or tract",
                other
            ))
        }
    };
    inner.warm_up()?;
    log::info!("classifier backend: {}", inner.name());

    match settings.timeout {
        Some(timeout) => Ok(Box::new(TimedClassifier::spawn(inner, timeout)?)),
        None => Ok(inner),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &InferenceSettings) -> Result<Box<dyn EmotionClassifier>> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("tract classifier requires a model path"))?;
    Ok(Box::new(TractClassifier::new(
        model_path,
        TractModelSpec::default(),
    )?))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(_settings: &InferenceSettings) -> Result<Box<dyn EmotionClassifier>> {
    Err(anyhow!(
        "tract classifier requires the backend-tract feature"
    ))
}
