//! Emotion Relay
//!
//! Watches a camera's MJPEG stream, classifies the dominant facial emotion at a
//! throttled cadence, shows the result in an operator window, and forwards the
//! label to a microcontroller over a serial line.
//!
//! # Architecture
//!
//! One thread owns the loop and every piece of mutable state. It:
//!
//! 1. Reads the stream in small chunks and splits out JPEG frames on markers.
//! 2. Decodes each frame and, at most once per interval, asks the classifier.
//! 3. Relays a fresh label to the device, redraws, and drains operator input.
//!
//! Operator input (clicks, Escape, window close, Ctrl-C) arrives through a
//! bounded queue and is applied between frames. Every exit path tears down the
//! same way: the device receives `flash_off` exactly once.
//!
//! # Module Structure
//!
//! - `ingest`: stream connection and MJPEG demuxing
//! - `frame`: decoded rasters
//! - `throttle`: inference cadence and failure backoff
//! - `detect`: classifier trait, backends, timeout wrapper
//! - `device`: serial command channel
//! - `input`: operator input queue
//! - `state`, `assets`, `display`: what the operator sees
//! - `app`: the main loop
//! - `config`: file + environment configuration

pub mod app;
pub mod assets;
pub mod config;
pub mod detect;
pub mod device;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod input;
pub mod state;
pub mod throttle;

pub use app::{ExitReason, LoopStats, QuitSource, RelayApp};
pub use assets::EmojiTable;
pub use config::{DisplaySettings, InferenceSettings, RelayConfig};
pub use detect::{
    build_classifier, AnalysisRequest, ClassifierOutput, Emotion, EmotionClassifier,
    EmotionResult, StubClassifier, TimedClassifier,
};
pub use device::{DeviceChannel, DeviceCommand, DeviceStats, SerialSettings};
pub use display::{compose, DisplaySink, HeadlessDisplay, Surface, TextRole};
pub use frame::Frame;
pub use ingest::{FrameDemuxer, StreamSettings, StreamSource};
pub use input::{InputEvent, InputReceiver, InputSender};
pub use state::UiState;
pub use throttle::InferenceThrottle;
