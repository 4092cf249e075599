use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::backend::EmotionClassifier;
use crate::detect::result::{AnalysisRequest, ClassifierOutput, Emotion};
use crate::detect::subject_visible;
use crate::frame::Frame;

/// Stub classifier for dry runs and tests.
///
/// Scripted answers are returned in order. Once the script is exhausted the
/// fallback answer repeats; without a fallback, a visible subject reads as
/// neutral and a blank frame follows the `enforce_detection` rules.
pub struct StubClassifier {
    script: VecDeque<std::result::Result<ClassifierOutput, String>>,
    fallback: Option<ClassifierOutput>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: None,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answer `emotion` at `score` percent.
    pub fn fixed(emotion: Emotion, score: f64) -> Self {
        Self::new().with_fallback(ClassifierOutput::single(emotion, score))
    }

    pub fn with_fallback(mut self, output: ClassifierOutput) -> Self {
        self.fallback = Some(output);
        self
    }

    /// Queue a successful answer.
    pub fn then_answer(mut self, emotion: Emotion, score: f64) -> Self {
        self.script
            .push_back(Ok(ClassifierOutput::single(emotion, score)));
        self
    }

    /// Queue a failure.
    pub fn then_fail(mut self, reason: &str) -> Self {
        self.script.push_back(Err(reason.to_string()));
        self
    }

    /// Sleep for `delay` inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared counter of `analyze` calls, readable after the stub is moved.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionClassifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn analyze(&mut self, frame: &Frame, request: &AnalysisRequest) -> Result<ClassifierOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        if let Some(next) = self.script.pop_front() {
            return next.map_err(|reason| anyhow!(reason));
        }
        if let Some(fallback) = &self.fallback {
            return Ok(fallback.clone());
        }
        if !subject_visible(frame) && request.enforce_detection {
            return Err(anyhow!("no face detected in frame"));
        }
        Ok(ClassifierOutput::neutral())
    }
}
