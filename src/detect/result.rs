use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Closed set of emotion labels the classifier can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// Every label, in classifier output order.
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Lowercase tag used on the device link and for asset file names.
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Emotion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|emotion| emotion.label() == wanted)
            .ok_or_else(|| anyhow!("unknown emotion label '{}'", s))
    }
}

/// Analysis axes a classifier can be asked for. Only emotion is used here.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisAxis {
    Emotion,
}

/// What the caller wants from one classifier call.
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub actions: Vec<AnalysisAxis>,
    /// When false, a frame with no detectable face yields a neutral result
    /// instead of an error.
    pub enforce_detection: bool,
}

impl AnalysisRequest {
    pub fn emotion(enforce_detection: bool) -> Self {
        Self {
            actions: vec![AnalysisAxis::Emotion],
            enforce_detection,
        }
    }
}

/// Per-label scores (percent) plus the dominant label for the first subject.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierOutput {
    pub scores: BTreeMap<Emotion, f64>,
    pub dominant: Emotion,
}

impl ClassifierOutput {
    /// Build an output whose dominant label is the highest score.
    pub fn from_scores(scores: BTreeMap<Emotion, f64>) -> Result<Self> {
        let dominant = scores
            .iter()
            .filter(|(_, score)| score.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(emotion, _)| *emotion)
            .ok_or_else(|| anyhow!("classifier produced no finite scores"))?;
        Ok(Self { scores, dominant })
    }

    /// A single label at the given score, everything else at zero.
    pub fn single(emotion: Emotion, score: f64) -> Self {
        let scores = Emotion::ALL
            .into_iter()
            .map(|e| (e, if e == emotion { score } else { 0.0 }))
            .collect();
        Self {
            scores,
            dominant: emotion,
        }
    }

    /// Best-effort answer when no subject is visible and detection is not enforced.
    pub fn neutral() -> Self {
        Self::single(Emotion::Neutral, 100.0)
    }

    pub fn score(&self, emotion: Emotion) -> Option<f64> {
        self.scores.get(&emotion).copied()
    }
}

/// The current emotion as shown on screen and sent to the device.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmotionResult {
    pub label: Emotion,
    /// Percentage in [0, 100], rounded to two decimals.
    pub confidence: f64,
}

impl EmotionResult {
    pub fn new(label: Emotion, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            label,
            confidence: (confidence * 100.0).round() / 100.0,
        }
    }

    pub fn from_output(output: &ClassifierOutput) -> Self {
        Self::new(output.dominant, output.score(output.dominant).unwrap_or(0.0))
    }
}
