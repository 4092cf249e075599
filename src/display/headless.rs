use std::collections::VecDeque;

use anyhow::Result;

use super::{DisplaySink, Surface};
use crate::input::{InputEvent, InputSender};

/// Display sink without a window.
///
/// Keeps the latest surface for inspection and can replay scripted input,
/// one batch per poll.
#[derive(Default)]
pub struct HeadlessDisplay {
    presented: u64,
    last: Option<Surface>,
    script: VecDeque<Vec<InputEvent>>,
    closed: bool,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events to deliver on successive polls; an empty batch delivers nothing.
    pub fn with_script(mut self, batches: Vec<Vec<InputEvent>>) -> Self {
        self.script = batches.into();
        self
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn last_surface(&self) -> Option<&Surface> {
        self.last.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl DisplaySink for HeadlessDisplay {
    fn present(&mut self, surface: &Surface) -> Result<()> {
        self.presented += 1;
        self.last = Some(surface.clone());
        Ok(())
    }

    fn poll_events(&mut self, events: &InputSender) {
        if let Some(batch) = self.script.pop_front() {
            for event in batch {
                events.send(event);
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
