//! MJPEG frame demuxer.
//!
//! Camera firmwares stream back-to-back JPEG images inside a multipart body and
//! rarely send a usable `Content-Length` per part. Framing is therefore done on
//! the JPEG markers alone:
//! - SOI (`FF D8`) opens a frame
//! - EOI (`FF D9`) closes it
//!
//! The demuxer is responsible for:
//! - Accumulating bytes across arbitrary read boundaries
//! - Emitting every complete frame, in order, byte-identical to the source
//! - Keeping its buffer bounded when the source never closes a frame
//!
//! The demuxer MUST NOT:
//! - Decode pixels (see `Frame::decode`)
//! - Discard bytes of an open frame that is still under the size cap

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Largest JPEG the demuxer will wait for before declaring the open frame junk.
pub const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

/// Counters for an MJPEG demuxer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub frames_emitted: u64,
    pub bytes_discarded: u64,
    pub oversized_dropped: u64,
}

/// Splits an unbounded MJPEG byte stream into complete JPEG images.
pub struct FrameDemuxer {
    buffer: Vec<u8>,
    /// Index to resume the EOI search from when the buffer starts with an open frame.
    scan_from: usize,
    max_frame_bytes: usize,
    stats: DemuxStats,
}

impl FrameDemuxer {
    pub fn new() -> Self {
        Self::with_max_frame_bytes(MAX_JPEG_BYTES)
    }

    /// Create a demuxer with a custom frame-size cap (minimum 4 bytes: SOI + EOI).
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(64 * 1024),
            scan_from: 0,
            max_frame_bytes: max_frame_bytes.max(SOI.len() + EOI.len()),
            stats: DemuxStats::default(),
        }
    }

    /// Append `bytes` and return every frame completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find_marker(&self.buffer, SOI, 0) else {
                self.discard_unframed();
                break;
            };
            if start > 0 {
                self.discard_front(start);
                self.scan_from = 0;
            }

            let from = self.scan_from.max(SOI.len());
            match find_marker(&self.buffer, EOI, from) {
                Some(eoi) => {
                    let end = eoi + EOI.len();
                    frames.push(self.buffer[..end].to_vec());
                    self.buffer.drain(..end);
                    self.scan_from = 0;
                    self.stats.frames_emitted += 1;
                }
                None => {
                    if self.buffer.len() > self.max_frame_bytes {
                        log::warn!(
                            "mjpeg frame exceeded {} bytes without an end marker; dropping",
                            self.max_frame_bytes
                        );
                        self.stats.oversized_dropped += 1;
                        // Skip past this SOI so the next search starts fresh.
                        self.discard_front(SOI.len());
                        self.scan_from = 0;
                        continue;
                    }
                    // A split EOI may have its 0xFF as the last byte.
                    self.scan_from = self.buffer.len().saturating_sub(1);
                    break;
                }
            }
        }

        frames
    }

    /// Bytes currently held for frames that are not yet complete.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    pub fn stats(&self) -> DemuxStats {
        self.stats
    }

    /// No SOI in the buffer: keep only a trailing 0xFF that may start one.
    fn discard_unframed(&mut self) {
        let keep = usize::from(self.buffer.last() == Some(&SOI[0]));
        let drop_len = self.buffer.len() - keep;
        self.discard_front(drop_len);
        self.scan_from = 0;
    }

    fn discard_front(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.buffer.drain(..len);
        self.stats.bytes_discarded += len as u64;
    }
}

impl Default for FrameDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

fn find_marker(buffer: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    if from >= buffer.len() {
        return None;
    }
    buffer[from..]
        .windows(2)
        .position(|pair| pair == marker.as_slice())
        .map(|pos| pos + from)
}
