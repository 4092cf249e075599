//! Input event queue.
//!
//! Host input (window clicks, key presses, Ctrl-C) is turned into
//! `InputEvent`s on a bounded queue that the main loop drains between
//! frames. Producers never touch UI state or the device link directly.
//!
//! Quit requests are also recorded in an atomic slot (first one wins) so they
//! survive a full queue.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// Primary button pressed at canvas coordinates.
    PointerDown { x: f32, y: f32 },
    QuitKey,
    WindowClosed,
    Interrupt,
}

const NO_QUIT: u8 = 0;

impl InputEvent {
    pub fn is_quit(&self) -> bool {
        !matches!(self, InputEvent::PointerDown { .. })
    }

    fn quit_code(&self) -> u8 {
        match self {
            InputEvent::PointerDown { .. } => NO_QUIT,
            InputEvent::QuitKey => 1,
            InputEvent::WindowClosed => 2,
            InputEvent::Interrupt => 3,
        }
    }

    fn from_quit_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(InputEvent::QuitKey),
            2 => Some(InputEvent::WindowClosed),
            3 => Some(InputEvent::Interrupt),
            _ => None,
        }
    }
}

/// Producer side; cheap to clone into callbacks and handler threads.
#[derive(Clone)]
pub struct InputSender {
    tx: SyncSender<InputEvent>,
    quit: Arc<AtomicU8>,
}

impl InputSender {
    /// Queue an event without blocking. Returns false if it was dropped.
    pub fn send(&self, event: InputEvent) -> bool {
        if event.is_quit() {
            // Only the first quit is remembered.
            let _ = self.quit.compare_exchange(
                NO_QUIT,
                event.quit_code(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                log::warn!("input queue full; dropping {:?}", event);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer side, owned by the main loop.
pub struct InputReceiver {
    rx: Receiver<InputEvent>,
    quit: Arc<AtomicU8>,
}

impl InputReceiver {
    /// Everything queued so far, in arrival order.
    pub fn drain(&self) -> Vec<InputEvent> {
        self.rx.try_iter().collect()
    }

    /// True once any producer has requested a quit.
    pub fn quit_requested(&self) -> bool {
        self.requested_quit().is_some()
    }

    /// The first quit event any producer sent, even if the queue dropped it.
    pub fn requested_quit(&self) -> Option<InputEvent> {
        InputEvent::from_quit_code(self.quit.load(Ordering::SeqCst))
    }
}

pub fn channel(capacity: usize) -> (InputSender, InputReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    let quit = Arc::new(AtomicU8::new(NO_QUIT));
    (
        InputSender {
            tx,
            quit: quit.clone(),
        },
        InputReceiver { rx, quit },
    )
}
