use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::SerialSettings;
use crate::ingest::StreamSettings;
use crate::input::DEFAULT_QUEUE_CAPACITY;

const DEFAULT_EMOJI_DIR: &str = "./emojis";
const DEFAULT_INTERVAL_MS: u64 = 1_000;
const DEFAULT_FAILURE_BACKOFF_MS: u64 = 500;
const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CLASSIFIER: &str = "stub";
const DEFAULT_WINDOW_TITLE: &str = "Emotion Recognition";

#[derive(Debug, Deserialize, Default)]
struct RelayConfigFile {
    stream: Option<StreamConfigFile>,
    serial: Option<SerialConfigFile>,
    inference: Option<InferenceConfigFile>,
    assets: Option<AssetsConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    url: Option<String>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    chunk_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SerialConfigFile {
    port: Option<String>,
    baud: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct InferenceConfigFile {
    interval_ms: Option<u64>,
    failure_backoff_ms: Option<u64>,
    /// 0 disables the timeout.
    timeout_ms: Option<u64>,
    enforce_detection: Option<bool>,
    classifier: Option<String>,
    model_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct AssetsConfigFile {
    emoji_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    headless: Option<bool>,
    title: Option<String>,
    input_queue: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub stream: StreamSettings,
    pub serial: SerialSettings,
    pub inference: InferenceSettings,
    pub emoji_dir: PathBuf,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub interval: Duration,
    pub failure_backoff: Duration,
    pub timeout: Option<Duration>,
    pub enforce_detection: bool,
    pub classifier: String,
    pub model_path: Option<PathBuf>,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            failure_backoff: Duration::from_millis(DEFAULT_FAILURE_BACKOFF_MS),
            timeout: Some(Duration::from_millis(DEFAULT_CLASSIFIER_TIMEOUT_MS)),
            enforce_detection: false,
            classifier: DEFAULT_CLASSIFIER.to_string(),
            model_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub headless: bool,
    pub title: String,
    pub input_queue: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            headless: false,
            title: DEFAULT_WINDOW_TITLE.to_string(),
            input_queue: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RelayConfig {
    /// File named by `RELAY_CONFIG` (if any), then environment overrides, validated.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RELAY_CONFIG").ok();
        let mut cfg = Self::load_from(config_path.as_deref().map(Path::new))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load an explicit config file (if any), then environment overrides.
    ///
    /// Not validated: callers layer their own overrides first, then call `validate`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => RelayConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: RelayConfigFile) -> Self {
        let stream_defaults = StreamSettings::default();
        let stream_file = file.stream.unwrap_or_default();
        let stream = StreamSettings {
            url: stream_file.url.unwrap_or(stream_defaults.url),
            connect_timeout: stream_file
                .connect_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(stream_defaults.connect_timeout),
            read_timeout: stream_file
                .read_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(stream_defaults.read_timeout),
            chunk_size: stream_file.chunk_size.unwrap_or(stream_defaults.chunk_size),
        };

        let serial_defaults = SerialSettings::default();
        let serial_file = file.serial.unwrap_or_default();
        let serial = SerialSettings {
            port: serial_file.port.unwrap_or(serial_defaults.port),
            baud: serial_file.baud.unwrap_or(serial_defaults.baud),
        };

        let inference_defaults = InferenceSettings::default();
        let inference_file = file.inference.unwrap_or_default();
        let inference = InferenceSettings {
            interval: inference_file
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(inference_defaults.interval),
            failure_backoff: inference_file
                .failure_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(inference_defaults.failure_backoff),
            timeout: match inference_file.timeout_ms {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => inference_defaults.timeout,
            },
            enforce_detection: inference_file
                .enforce_detection
                .unwrap_or(inference_defaults.enforce_detection),
            classifier: inference_file
                .classifier
                .unwrap_or(inference_defaults.classifier),
            model_path: inference_file.model_path,
        };

        let emoji_dir = file
            .assets
            .and_then(|assets| assets.emoji_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EMOJI_DIR));

        let display_defaults = DisplaySettings::default();
        let display_file = file.display.unwrap_or_default();
        let display = DisplaySettings {
            headless: display_file.headless.unwrap_or(display_defaults.headless),
            title: display_file.title.unwrap_or(display_defaults.title),
            input_queue: display_file
                .input_queue
                .unwrap_or(display_defaults.input_queue),
        };

        Self {
            stream,
            serial,
            inference,
            emoji_dir,
            display,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("RELAY_STREAM_URL") {
            if !url.trim().is_empty() {
                self.stream.url = url;
            }
        }
        if let Ok(port) = std::env::var("RELAY_SERIAL_PORT") {
            if !port.trim().is_empty() {
                self.serial.port = port;
            }
        }
        if let Ok(baud) = std::env::var("RELAY_SERIAL_BAUD") {
            self.serial.baud = baud
                .trim()
                .parse()
                .map_err(|_| anyhow!("RELAY_SERIAL_BAUD must be an integer baud rate"))?;
        }
        if let Ok(dir) = std::env::var("RELAY_EMOJI_DIR") {
            if !dir.trim().is_empty() {
                self.emoji_dir = PathBuf::from(dir);
            }
        }
        if let Ok(interval) = std::env::var("RELAY_INFERENCE_INTERVAL_MS") {
            let ms: u64 = interval.trim().parse().map_err(|_| {
                anyhow!("RELAY_INFERENCE_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.inference.interval = Duration::from_millis(ms);
        }
        if let Ok(classifier) = std::env::var("RELAY_CLASSIFIER") {
            if !classifier.trim().is_empty() {
                self.inference.classifier = classifier.trim().to_lowercase();
            }
        }
        if let Ok(model) = std::env::var("RELAY_MODEL_PATH") {
            if !model.trim().is_empty() {
                self.inference.model_path = Some(PathBuf::from(model));
            }
        }
        Ok(())
    }

    /// Reject settings the loop cannot run with.
    pub fn validate(&mut self) -> Result<()> {
        url::Url::parse(&self.stream.url)
            .map_err(|e| anyhow!("invalid stream url '{}': {}", self.stream.url, e))?;
        if self.stream.chunk_size == 0 {
            return Err(anyhow!("stream chunk size must be greater than zero"));
        }
        if self.inference.interval.is_zero() {
            return Err(anyhow!("inference interval must be greater than zero"));
        }
        if self.serial.port.trim().is_empty() {
            return Err(anyhow!("serial port must not be empty"));
        }
        if self.serial.baud == 0 {
            return Err(anyhow!("serial baud rate must be greater than zero"));
        }
        self.inference.classifier = self.inference.classifier.to_lowercase();
        if self.inference.classifier == "tract" && self.inference.model_path.is_none() {
            return Err(anyhow!("classifier 'tract' requires a model path"));
        }
        if self.display.input_queue == 0 {
            return Err(anyhow!("input queue capacity must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<RelayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
