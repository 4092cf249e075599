//! Status display: layout table, compositor, and display sinks.
//!
//! `compose` is pure apart from reading `UiState`; sinks only present pixels
//! and translate host input into `InputEvent`s.

mod compose;
pub mod font;
mod headless;
pub mod layout;
#[cfg(feature = "window")]
mod window;

use anyhow::Result;

pub use compose::{compose, Surface, TextRole, TextSpan};
pub use headless::HeadlessDisplay;
pub use layout::{hit_test, PointerAction, Rect, BUTTONS, CANVAS_HEIGHT, CANVAS_WIDTH};
#[cfg(feature = "window")]
pub use window::WindowDisplay;

use crate::input::InputSender;

/// Where composed surfaces go.
pub trait DisplaySink {
    fn present(&mut self, surface: &Surface) -> Result<()>;

    /// Forward any pending host input.
    fn poll_events(&mut self, events: &InputSender);

    /// Release display resources. Called once on teardown.
    fn close(&mut self) {}
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn present(&mut self, surface: &Surface) -> Result<()> {
        (**self).present(surface)
    }

    fn poll_events(&mut self, events: &InputSender) {
        (**self).poll_events(events)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
