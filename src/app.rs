//! Main loop.
//!
//! `RelayApp` owns every piece of mutable state: demuxer, throttle,
//! classifier, device link, UI state and display. Other threads reach it only
//! through the input queue, so flash toggles and quits are applied between
//! frames, in order, on the loop thread.
//!
//! Every exit path (quit button, Escape, window close, Ctrl-C, end of stream,
//! stream failure) runs the same teardown, which leaves the device safe.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use crate::assets::EmojiTable;
use crate::config::InferenceSettings;
use crate::detect::{AnalysisRequest, EmotionClassifier, EmotionResult};
use crate::device::{DeviceChannel, DeviceCommand, DeviceStats};
use crate::display::{compose, hit_test, DisplaySink, PointerAction};
use crate::frame::Frame;
use crate::ingest::{DemuxStats, FrameDemuxer};
use crate::input::{self, InputEvent, InputReceiver, InputSender, DEFAULT_QUEUE_CAPACITY};
use crate::state::UiState;
use crate::throttle::InferenceThrottle;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_CHUNK_SIZE: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuitSource {
    Key,
    Button,
    Interrupt,
    WindowClosed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Quit(QuitSource),
    StreamEnded,
    StreamFailed(String),
}

impl ExitReason {
    /// True for exits the operator asked for or a stream that closed cleanly.
    pub fn is_graceful(&self) -> bool {
        !matches!(self, ExitReason::StreamFailed(_))
    }

    /// Process exit status: 0 for graceful exits, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_graceful() {
            0
        } else {
            1
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopPhase {
    Running,
    Terminated,
}

/// Counters for the main loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub classifier_calls: u64,
    pub classifier_failures: u64,
}

pub struct RelayApp<S: Read, D: DisplaySink> {
    source: S,
    demuxer: FrameDemuxer,
    throttle: InferenceThrottle,
    classifier: Box<dyn EmotionClassifier>,
    request: AnalysisRequest,
    device: DeviceChannel,
    state: UiState,
    emojis: EmojiTable,
    display: D,
    input_tx: InputSender,
    input_rx: InputReceiver,
    chunk: Vec<u8>,
    phase: LoopPhase,
    exit: Option<ExitReason>,
    torn_down: bool,
    stats: LoopStats,
    last_health_log: Instant,
}

impl<S: Read, D: DisplaySink> RelayApp<S, D> {
    pub fn new(
        source: S,
        classifier: Box<dyn EmotionClassifier>,
        device: DeviceChannel,
        display: D,
        emojis: EmojiTable,
        inference: &InferenceSettings,
    ) -> Self {
        let (input_tx, input_rx) = input::channel(DEFAULT_QUEUE_CAPACITY);
        Self {
            source,
            demuxer: FrameDemuxer::new(),
            throttle: InferenceThrottle::with_backoff(inference.interval, inference.failure_backoff),
            classifier,
            request: AnalysisRequest::emotion(inference.enforce_detection),
            device,
            state: UiState::new(),
            emojis,
            display,
            input_tx,
            input_rx,
            chunk: vec![0u8; DEFAULT_CHUNK_SIZE],
            phase: LoopPhase::Running,
            exit: None,
            torn_down: false,
            stats: LoopStats::default(),
            last_health_log: Instant::now(),
        }
    }

    /// Bytes requested from the stream per read.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk = vec![0u8; chunk_size.max(1)];
        self
    }

    /// Replace the input queue. Senders handed out earlier stop working.
    pub fn with_input_queue(mut self, capacity: usize) -> Self {
        let (input_tx, input_rx) = input::channel(capacity);
        self.input_tx = input_tx;
        self.input_rx = input_rx;
        self
    }

    /// Use a queue created before the app, e.g. one a Ctrl-C handler
    /// already feeds during startup. Events queued so far are kept.
    pub fn with_input_channel(mut self, input_tx: InputSender, input_rx: InputReceiver) -> Self {
        self.input_tx = input_tx;
        self.input_rx = input_rx;
        self
    }

    /// Handle for other threads (Ctrl-C handler, host callbacks).
    pub fn input_sender(&self) -> InputSender {
        self.input_tx.clone()
    }

    /// Run until a quit, end of stream, or stream failure. Always tears down.
    pub fn run(&mut self) -> ExitReason {
        if self.phase == LoopPhase::Running {
            log::info!(
                "relay running: classifier={} interval={}ms",
                self.classifier.name(),
                self.throttle.interval().as_millis()
            );
        }

        while self.phase == LoopPhase::Running {
            self.drain_inputs();
            if self.phase != LoopPhase::Running {
                break;
            }

            let read = match self.source.read(&mut self.chunk) {
                Ok(0) => {
                    log::info!("camera stream ended");
                    self.terminate(ExitReason::StreamEnded);
                    break;
                }
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("camera stream read failed: {}", e);
                    self.terminate(ExitReason::StreamFailed(e.to_string()));
                    break;
                }
            };

            let jpegs = self.demuxer.feed(&self.chunk[..read]);
            for jpeg in jpegs {
                self.process_jpeg(&jpeg);
                if self.phase != LoopPhase::Running {
                    break;
                }
            }

            self.log_health_if_due();
        }

        self.teardown();
        self.exit
            .clone()
            .unwrap_or(ExitReason::Quit(QuitSource::Interrupt))
    }

    /// Apply one input event. Only quit events end the loop.
    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown { x, y } => match hit_test(x, y) {
                PointerAction::Quit => {
                    log::info!("quit button clicked");
                    self.terminate(ExitReason::Quit(QuitSource::Button));
                }
                PointerAction::FlashToggle => {
                    let on = self.state.toggle_flash();
                    self.device.send(DeviceCommand::flash(on));
                    log::info!("flash {}", if on { "on" } else { "off" });
                }
                PointerAction::None => {}
            },
            InputEvent::QuitKey => self.terminate(ExitReason::Quit(QuitSource::Key)),
            InputEvent::WindowClosed => self.terminate(ExitReason::Quit(QuitSource::WindowClosed)),
            InputEvent::Interrupt => {
                log::warn!("interrupt received");
                self.terminate(ExitReason::Quit(QuitSource::Interrupt));
            }
        }
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn device_stats(&self) -> DeviceStats {
        self.device.stats()
    }

    pub fn demux_stats(&self) -> DemuxStats {
        self.demuxer.stats()
    }

    fn process_jpeg(&mut self, jpeg: &[u8]) {
        let frame = match Frame::decode(jpeg) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.decode_failures += 1;
                log::debug!("skipping undecodable frame ({} bytes): {:#}", jpeg.len(), e);
                return;
            }
        };
        self.stats.frames_decoded += 1;

        self.refresh_emotion(&frame, Instant::now());

        let surface = compose(Some(&frame), &self.state, &self.emojis);
        if let Err(e) = self.display.present(&surface) {
            log::warn!("display present failed: {:#}", e);
        }
        self.display.poll_events(&self.input_tx);
        self.drain_inputs();
    }

    fn refresh_emotion(&mut self, frame: &Frame, now: Instant) {
        if !self.throttle.should_refresh(now) {
            return;
        }
        self.stats.classifier_calls += 1;
        match self.classifier.analyze(frame, &self.request) {
            Ok(output) => {
                let result = EmotionResult::from_output(&output);
                log::info!("emotion: {} ({}%)", result.label, result.confidence);
                self.state.apply(result);
                self.device.send(DeviceCommand::Emotion(result.label));
                self.throttle.record_refresh(Instant::now());
            }
            Err(e) => {
                self.stats.classifier_failures += 1;
                log::warn!("emotion detection failed: {:#}", e);
                self.throttle.record_failure(Instant::now());
            }
        }
    }

    fn drain_inputs(&mut self) {
        for event in self.input_rx.drain() {
            self.handle_input(event);
            if self.phase != LoopPhase::Running {
                return;
            }
        }
        // A quit that did not fit in the queue still ends the loop.
        if let Some(quit) = self.input_rx.requested_quit() {
            self.handle_input(quit);
        }
    }

    fn terminate(&mut self, reason: ExitReason) {
        if self.phase == LoopPhase::Running {
            self.phase = LoopPhase::Terminated;
            self.exit = Some(reason);
        }
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.device.shutdown();
        self.display.close();
        log::info!(
            "relay stopped ({:?}): frames={} decode_failures={} classifications={} failures={}",
            self.exit,
            self.stats.frames_decoded,
            self.stats.decode_failures,
            self.stats.classifier_calls,
            self.stats.classifier_failures
        );
    }

    fn log_health_if_due(&mut self) {
        if self.last_health_log.elapsed() < HEALTH_LOG_INTERVAL {
            return;
        }
        let demux = self.demuxer.stats();
        let device = self.device.stats();
        log::info!(
            "health: frames={} decode_failures={} classifications={} failures={} device_sent={} device_failures={} buffered={}B oversized={}",
            self.stats.frames_decoded,
            self.stats.decode_failures,
            self.stats.classifier_calls,
            self.stats.classifier_failures,
            device.commands_sent,
            device.write_failures,
            self.demuxer.buffered_len(),
            demux.oversized_dropped
        );
        self.last_health_log = Instant::now();
    }
}
