use anyhow::Result;

use crate::detect::result::{AnalysisRequest, ClassifierOutput};
use crate::frame::Frame;

/// Emotion classifier trait.
///
/// Implementations are slow relative to frame decode; callers gate them with
/// `InferenceThrottle` and may wrap them in `TimedClassifier`.
///
/// Implementations MUST NOT:
/// - Retain the frame beyond the `analyze` call
/// - Write frames to disk
pub trait EmotionClassifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Classify the first subject in `frame`.
    ///
    /// With `request.enforce_detection == false` a frame without a subject
    /// returns a best-effort (neutral) output instead of an error.
    fn analyze(&mut self, frame: &Frame, request: &AnalysisRequest) -> Result<ClassifierOutput>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<C: EmotionClassifier + ?Sized> EmotionClassifier for Box<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn analyze(&mut self, frame: &Frame, request: &AnalysisRequest) -> Result<ClassifierOutput> {
        (**self).analyze(frame, request)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
