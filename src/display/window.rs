#![cfg(feature = "window")]

use anyhow::{anyhow, Result};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use super::layout::{CANVAS_HEIGHT, CANVAS_WIDTH};
use super::{DisplaySink, Surface};
use crate::input::{InputEvent, InputSender};

/// Desktop window sink backed by `minifb`.
///
/// Input state is refreshed by `present`, so `poll_events` reports what
/// happened up to the last presented frame.
pub struct WindowDisplay {
    window: Option<Window>,
    mouse_was_down: bool,
    close_reported: bool,
}

impl WindowDisplay {
    pub fn open(title: &str) -> Result<Self> {
        let window = Window::new(
            title,
            CANVAS_WIDTH as usize,
            CANVAS_HEIGHT as usize,
            WindowOptions::default(),
        )
        .map_err(|e| anyhow!("failed to open window: {}", e))?;
        Ok(Self {
            window: Some(window),
            mouse_was_down: false,
            close_reported: false,
        })
    }
}

impl DisplaySink for WindowDisplay {
    fn present(&mut self, surface: &Surface) -> Result<()> {
        let window = self
            .window
            .as_mut()
            .ok_or_else(|| anyhow!("window already closed"))?;
        window
            .update_with_buffer(
                &surface.to_rgb32(),
                CANVAS_WIDTH as usize,
                CANVAS_HEIGHT as usize,
            )
            .map_err(|e| anyhow!("window update failed: {}", e))
    }

    fn poll_events(&mut self, events: &InputSender) {
        let Some(window) = self.window.as_ref() else {
            return;
        };

        if !window.is_open() {
            if !self.close_reported {
                self.close_reported = true;
                events.send(InputEvent::WindowClosed);
            }
            return;
        }

        if window.is_key_pressed(Key::Escape, KeyRepeat::No) {
            events.send(InputEvent::QuitKey);
        }

        let down = window.get_mouse_down(MouseButton::Left);
        if down && !self.mouse_was_down {
            if let Some((x, y)) = window.get_mouse_pos(MouseMode::Discard) {
                events.send(InputEvent::PointerDown { x, y });
            }
        }
        self.mouse_was_down = down;
    }

    fn close(&mut self) {
        self.window = None;
    }
}
