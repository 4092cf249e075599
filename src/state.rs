//! Mutable UI state: current emotion and flash toggle.
//!
//! Owned by the main loop. Input events reach it through the input queue, so
//! every mutation happens on the loop thread.

use crate::detect::{Emotion, EmotionResult};

/// Label shown before the first successful classification.
pub const UNKNOWN_LABEL: &str = "...";
/// Accuracy shown before the first successful classification.
pub const UNKNOWN_SCORE: &str = "0";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UiState {
    /// `None` until the classifier has succeeded once.
    pub emotion: Option<EmotionResult>,
    pub flash_on: bool,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, result: EmotionResult) {
        self.emotion = Some(result);
    }

    /// Flip the flash flag and return the new value.
    pub fn toggle_flash(&mut self) -> bool {
        self.flash_on = !self.flash_on;
        self.flash_on
    }

    /// Emotion whose emoji should be shown, if any.
    pub fn emoji_key(&self) -> Option<Emotion> {
        self.emotion.map(|result| result.label)
    }

    /// Upper-cased label for display.
    pub fn display_label(&self) -> String {
        match &self.emotion {
            Some(result) => result.label.label().to_uppercase(),
            None => UNKNOWN_LABEL.to_string(),
        }
    }

    /// Confidence for display, without the percent sign. Whole numbers keep
    /// one decimal (`90.0`); others show up to two (`87.5`, `33.33`).
    pub fn display_score(&self) -> String {
        match &self.emotion {
            Some(result) if result.confidence.fract() == 0.0 => {
                format!("{:.1}", result.confidence)
            }
            Some(result) => format!("{}", result.confidence),
            None => UNKNOWN_SCORE.to_string(),
        }
    }
}
