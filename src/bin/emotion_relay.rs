//! emotion_relay - camera emotion relay.
//!
//! Startup:
//! 1. Loads configuration (file, environment, then CLI flags)
//! 2. Opens the serial device, emoji assets, classifier, camera stream, display
//! 3. Runs the main loop until the operator quits or the stream ends
//!
//! The device receives `flash_off` on every exit, including startup failures
//! and Ctrl-C that happen after it was opened.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

#[path = "../ui.rs"]
mod ui;

use emotion_relay::{
    build_classifier, input, DeviceChannel, DisplaySink, EmojiTable, EmotionClassifier,
    ExitReason, InputEvent, InputReceiver, QuitSource, RelayApp, RelayConfig, StreamSource,
};
use ui::{Ui, UiMode};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Relay the dominant facial emotion from an MJPEG camera to a serial device"
)]
struct Args {
    /// Config file (.toml, otherwise JSON).
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// MJPEG stream URL (http, https, or file).
    #[arg(long)]
    stream_url: Option<String>,

    /// Serial device path, or stub:// to log commands instead.
    #[arg(long)]
    serial_port: Option<String>,

    #[arg(long)]
    baud: Option<u32>,

    /// Directory holding <label>.png emoji images.
    #[arg(long)]
    emoji_dir: Option<PathBuf>,

    /// Classifier backend: stub or tract.
    #[arg(long)]
    classifier: Option<String>,

    /// Model file for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Run without a window.
    #[arg(long)]
    headless: bool,

    #[arg(long, value_enum, env = "RELAY_UI", default_value = "auto")]
    ui: UiMode,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::new(args.ui, std::io::stderr().is_terminal());

    let stage = ui.stage("Load configuration");
    let cfg = load_config(&args)?;
    stage.done_with(cfg.stream.url.clone());

    // Installed before the device opens so Ctrl-C during startup still unwinds
    // through `DeviceChannel::drop`.
    let (input_tx, input_rx) = input::channel(cfg.display.input_queue);
    let interrupt = input_tx.clone();
    ctrlc::set_handler(move || {
        interrupt.send(InputEvent::Interrupt);
    })
    .context("failed to install Ctrl-C handler")?;

    let stage = ui.stage("Open device");
    let device = DeviceChannel::open(&cfg.serial)?;
    stage.done_with(format!("{} @ {}", cfg.serial.port, cfg.serial.baud));
    if let Some(code) = interrupted(&input_rx) {
        return Ok(code);
    }

    let stage = ui.stage("Load emoji");
    let emojis = EmojiTable::load(&cfg.emoji_dir)?;
    stage.done_with(format!("{} images", emojis.len()));
    if let Some(code) = interrupted(&input_rx) {
        return Ok(code);
    }

    let stage = ui.stage("Load classifier");
    let classifier = build_classifier(&cfg.inference)?;
    stage.done_with(classifier.name());
    if let Some(code) = interrupted(&input_rx) {
        return Ok(code);
    }

    let stage = ui.stage("Connect stream");
    let source = StreamSource::connect(&cfg.stream)?;
    stage.done();
    if let Some(code) = interrupted(&input_rx) {
        return Ok(code);
    }

    let stage = ui.stage("Open display");
    let display = open_display(&cfg)?;
    stage.done();

    let mut app = RelayApp::new(source, classifier, device, display, emojis, &cfg.inference)
        .with_chunk_size(cfg.stream.chunk_size)
        .with_input_channel(input_tx, input_rx);

    let reason = app.run();
    log::info!("exit: {:?}", reason);
    Ok(ExitCode::from(reason.exit_code()))
}

/// Exit status for a Ctrl-C that arrived during startup. Anything already
/// opened is released by its `Drop` on the way out.
fn interrupted(input: &InputReceiver) -> Option<ExitCode> {
    if !input.quit_requested() {
        return None;
    }
    log::warn!("interrupted during startup");
    Some(ExitCode::from(
        ExitReason::Quit(QuitSource::Interrupt).exit_code(),
    ))
}

fn load_config(args: &Args) -> Result<RelayConfig> {
    let mut cfg = RelayConfig::load_from(args.config.as_deref())?;
    if let Some(url) = &args.stream_url {
        cfg.stream.url = url.clone();
    }
    if let Some(port) = &args.serial_port {
        cfg.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        cfg.serial.baud = baud;
    }
    if let Some(dir) = &args.emoji_dir {
        cfg.emoji_dir = dir.clone();
    }
    if let Some(classifier) = &args.classifier {
        cfg.inference.classifier = classifier.clone();
    }
    if let Some(model) = &args.model {
        cfg.inference.model_path = Some(model.clone());
    }
    if args.headless {
        cfg.display.headless = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn open_display(cfg: &RelayConfig) -> Result<Box<dyn DisplaySink>> {
    if cfg.display.headless {
        return Ok(Box::new(emotion_relay::HeadlessDisplay::new()));
    }
    open_window(&cfg.display.title)
}

#[cfg(feature = "window")]
fn open_window(title: &str) -> Result<Box<dyn DisplaySink>> {
    Ok(Box::new(emotion_relay::display::WindowDisplay::open(title)?))
}

#[cfg(not(feature = "window"))]
fn open_window(_title: &str) -> Result<Box<dyn DisplaySink>> {
    log::warn!("built without the window feature; running headless");
    Ok(Box::new(emotion_relay::HeadlessDisplay::new()))
}
