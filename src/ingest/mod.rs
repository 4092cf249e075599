//! Camera stream ingestion.
//!
//! - `http`: opens the MJPEG byte stream (HTTP camera endpoint or recorded file)
//! - `mjpeg`: splits the byte stream into complete JPEG images
//!
//! The ingestion layer MUST NOT:
//! - Store frames to disk
//! - Retain frames beyond handoff to the main loop

pub mod http;
pub mod mjpeg;

pub use http::{StreamSettings, StreamSource, StreamStats};
pub use mjpeg::{DemuxStats, FrameDemuxer, MAX_JPEG_BYTES};
