//! Camera stream source.
//!
//! Opens the MJPEG byte stream and hands it to the main loop as a blocking
//! `Read`. Supported schemes:
//! - `http://` / `https://`: live camera endpoint (e.g. `http://192.168.4.1:81/stream`)
//! - `file://`: a recorded MJPEG capture, read once to EOF
//!
//! The source does no framing; see `FrameDemuxer`.

use std::fs::File;
use std::io::{self, Read};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use url::Url;

/// Configuration for the camera stream.
#[derive(Clone, Debug)]
pub struct StreamSettings {
    pub url: String,
    pub connect_timeout: Duration,
    /// A read that stalls this long fails the stream.
    pub read_timeout: Duration,
    /// Bytes requested per read.
    pub chunk_size: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: "http://192.168.4.1:81/stream".to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            chunk_size: 1024,
        }
    }
}

/// Statistics for a stream source.
#[derive(Clone, Debug)]
pub struct StreamStats {
    pub bytes_read: u64,
    pub source: String,
    pub uptime: Duration,
}

pub struct StreamSource {
    reader: Box<dyn Read + Send>,
    source: String,
    bytes_read: u64,
    connected_at: Instant,
}

impl StreamSource {
    /// Connect to the configured stream. Failure here is a startup error.
    pub fn connect(settings: &StreamSettings) -> Result<Self> {
        let url = Url::parse(&settings.url).context("parse stream url")?;
        let reader: Box<dyn Read + Send> = match url.scheme() {
            "http" | "https" => open_http(settings)?,
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow!("invalid file url '{}'", settings.url))?;
                Box::new(
                    File::open(&path)
                        .with_context(|| format!("open recorded stream {}", path.display()))?,
                )
            }
            other => {
                return Err(anyhow!(
                    "unsupported stream scheme '{}'; expected http(s) or file",
                    other
                ))
            }
        };
        log::info!("camera stream connected: {}", settings.url);
        Ok(Self::from_reader(reader, settings.url.clone()))
    }

    /// Wrap an already-open byte stream.
    pub fn from_reader(reader: Box<dyn Read + Send>, source: impl Into<String>) -> Self {
        Self {
            reader,
            source: source.into(),
            bytes_read: 0,
            connected_at: Instant::now(),
        }
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            bytes_read: self.bytes_read,
            source: self.source.clone(),
            uptime: self.connected_at.elapsed(),
        }
    }
}

impl Read for StreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.reader.read(buf)?;
        self.bytes_read += read as u64;
        Ok(read)
    }
}

fn open_http(settings: &StreamSettings) -> Result<Box<dyn Read + Send>> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(settings.connect_timeout)
        .timeout_read(settings.read_timeout)
        .build();
    let response = agent
        .get(&settings.url)
        .call()
        .with_context(|| format!("connect to camera stream {}", settings.url))?;
    let content_type = response.header("Content-Type").unwrap_or("");
    if !content_type.to_lowercase().contains("multipart") {
        log::warn!(
            "camera stream content type '{}' is not multipart; framing on jpeg markers anyway",
            content_type
        );
    }
    Ok(Box::new(response.into_reader()))
}
