use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use emotion_relay::detect::ClassifierOutput;
use emotion_relay::display::TextRole;
use emotion_relay::{
    input, DeviceChannel, EmojiTable, Emotion, ExitReason, HeadlessDisplay, InferenceSettings,
    InputEvent, QuitSource, RelayApp, StubClassifier,
};

/// Device transport that stays readable after the channel takes ownership.
#[derive(Clone, Default)]
struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    fn new() -> Self {
        Self::default()
    }

    fn lines(&self) -> Vec<String> {
        let bytes = self.inner.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|line| line.to_string())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn jpeg(seed: u8) -> Vec<u8> {
    let image = RgbImage::from_fn(64, 48, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            Rgb([seed, 20, 20])
        } else {
            Rgb([230, 230, 230])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

fn multipart(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut stream = Vec::new();
    for frame in frames {
        stream.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
        stream.extend_from_slice(frame);
        stream.extend_from_slice(b"\r\n");
    }
    stream
}

fn slow_inference() -> InferenceSettings {
    InferenceSettings {
        interval: Duration::from_secs(60),
        failure_backoff: Duration::ZERO,
        timeout: None,
        ..InferenceSettings::default()
    }
}

fn count(lines: &[String], wanted: &str) -> usize {
    lines.iter().filter(|line| line.as_str() == wanted).count()
}

type TestApp<S> = RelayApp<S, HeadlessDisplay>;

fn build<S: Read>(
    source: S,
    classifier: StubClassifier,
    display: HeadlessDisplay,
) -> (TestApp<S>, SharedBuffer) {
    let wire = SharedBuffer::new();
    let device = DeviceChannel::new(Box::new(wire.clone()), "test");
    let app = RelayApp::new(
        source,
        Box::new(classifier),
        device,
        display,
        EmojiTable::empty(),
        &slow_inference(),
    );
    (app, wire)
}

/// Yields its data, then fails every read.
struct BrokenStream {
    data: Cursor<Vec<u8>>,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.data.read(buf)?;
        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "camera went away"));
        }
        Ok(read)
    }
}

#[test]
fn relays_emotion_then_stops_at_end_of_stream() {
    let stream = multipart(&[jpeg(10), jpeg(200)]);
    let (mut app, wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Happy, 87.5),
        HeadlessDisplay::new(),
    );

    let reason = app.run();
    assert_eq!(reason, ExitReason::StreamEnded);
    assert_eq!(reason.exit_code(), 0);

    let lines = wire.lines();
    assert_eq!(count(&lines, "happy"), 1);
    assert_eq!(count(&lines, "flash_off"), 1);
    assert_eq!(lines.last().map(String::as_str), Some("flash_off"));

    assert_eq!(app.stats().frames_decoded, 2);
    assert_eq!(app.stats().classifier_calls, 1);
    assert_eq!(app.display().presented(), 2);
    assert!(app.display().is_closed());

    let surface = app.display().last_surface().unwrap();
    assert_eq!(surface.text(TextRole::EmotionLabel), Some("HAPPY"));
    assert_eq!(surface.text(TextRole::Accuracy), Some("ACCURACY: 87.5%"));
}

#[test]
fn quit_key_tears_down_once() {
    let stream = multipart(&[jpeg(10), jpeg(60), jpeg(120)]);
    let display = HeadlessDisplay::new().with_script(vec![vec![InputEvent::QuitKey]]);
    let (mut app, wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Sad, 40.0),
        display,
    );

    let reason = app.run();
    assert_eq!(reason, ExitReason::Quit(QuitSource::Key));
    assert_eq!(app.display().presented(), 1);
    assert_eq!(count(&wire.lines(), "flash_off"), 1);

    // A second run does not repeat teardown.
    assert_eq!(app.run(), ExitReason::Quit(QuitSource::Key));
    assert_eq!(count(&wire.lines(), "flash_off"), 1);
}

#[test]
fn quit_button_click_stops_the_loop() {
    let stream = multipart(&[jpeg(10), jpeg(60)]);
    let display = HeadlessDisplay::new()
        .with_script(vec![vec![InputEvent::PointerDown { x: 1000.0, y: 520.0 }]]);
    let (mut app, wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Angry, 91.0),
        display,
    );

    assert_eq!(app.run(), ExitReason::Quit(QuitSource::Button));
    let lines = wire.lines();
    assert_eq!(lines, vec!["angry".to_string(), "flash_off".to_string()]);
}

#[test]
fn flash_button_toggles_device_flash() {
    let stream = multipart(&[jpeg(10), jpeg(60), jpeg(90)]);
    let click = InputEvent::PointerDown { x: 1000.0, y: 420.0 };
    let display = HeadlessDisplay::new().with_script(vec![vec![click], vec![click]]);
    let (mut app, wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Neutral, 55.0),
        display,
    );

    assert_eq!(app.run(), ExitReason::StreamEnded);
    assert_eq!(
        wire.lines(),
        vec![
            "neutral".to_string(),
            "flash_on".to_string(),
            "flash_off".to_string(),
            "flash_off".to_string(),
        ]
    );
    assert!(!app.state().flash_on);
}

#[test]
fn clicks_outside_buttons_are_ignored() {
    let stream = multipart(&[jpeg(10), jpeg(60)]);
    let display = HeadlessDisplay::new()
        .with_script(vec![vec![InputEvent::PointerDown { x: 10.0, y: 10.0 }]]);
    let (mut app, wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Fear, 12.0),
        display,
    );

    assert_eq!(app.run(), ExitReason::StreamEnded);
    assert_eq!(wire.lines(), vec!["fear".to_string(), "flash_off".to_string()]);
}

#[test]
fn undecodable_frame_is_skipped() {
    let mut stream = vec![0xFF, 0xD8, 0x00, 0x01, 0x02, 0xFF, 0xD9];
    stream.extend(multipart(&[jpeg(80)]));
    let (mut app, wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Surprise, 70.0),
        HeadlessDisplay::new(),
    );

    assert_eq!(app.run(), ExitReason::StreamEnded);
    assert_eq!(app.stats().decode_failures, 1);
    assert_eq!(app.stats().frames_decoded, 1);
    assert_eq!(count(&wire.lines(), "surprise"), 1);
}

#[test]
fn classifier_failure_keeps_previous_state_and_retries() {
    let stream = multipart(&[jpeg(10), jpeg(60)]);
    let classifier = StubClassifier::new()
        .then_fail("no face detected in frame")
        .with_fallback(ClassifierOutput::single(Emotion::Disgust, 33.333));
    let (mut app, wire) = build(Cursor::new(stream), classifier, HeadlessDisplay::new());

    assert_eq!(app.run(), ExitReason::StreamEnded);
    assert_eq!(app.stats().classifier_calls, 2);
    assert_eq!(app.stats().classifier_failures, 1);
    assert_eq!(wire.lines(), vec!["disgust".to_string(), "flash_off".to_string()]);

    let emotion = app.state().emotion.unwrap();
    assert_eq!(emotion.label, Emotion::Disgust);
    assert_eq!(emotion.confidence, 33.33);
}

#[test]
fn first_frame_shows_unknown_until_classified() {
    let stream = multipart(&[jpeg(10)]);
    let classifier = StubClassifier::new().then_fail("busy");
    let (mut app, _wire) = build(Cursor::new(stream), classifier, HeadlessDisplay::new());

    app.run();
    let surface = app.display().last_surface().unwrap();
    assert_eq!(surface.text(TextRole::EmotionLabel), Some("..."));
    assert_eq!(surface.text(TextRole::Accuracy), Some("ACCURACY: 0%"));
}

#[test]
fn stream_failure_still_sends_safety_command() {
    let stream = BrokenStream {
        data: Cursor::new(multipart(&[jpeg(10)])),
    };
    let (mut app, wire) = build(
        stream,
        StubClassifier::fixed(Emotion::Happy, 50.0),
        HeadlessDisplay::new(),
    );

    let reason = app.run();
    assert!(matches!(reason, ExitReason::StreamFailed(_)));
    assert_eq!(reason.exit_code(), 1);
    assert_eq!(wire.lines(), vec!["happy".to_string(), "flash_off".to_string()]);
}

#[test]
fn interrupt_before_first_frame() -> Result<()> {
    let stream = multipart(&[jpeg(10)]);
    let (mut app, wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Happy, 50.0),
        HeadlessDisplay::new(),
    );
    assert!(app.input_sender().send(InputEvent::Interrupt));

    assert_eq!(app.run(), ExitReason::Quit(QuitSource::Interrupt));
    assert_eq!(app.display().presented(), 0);
    assert_eq!(wire.lines(), vec!["flash_off".to_string()]);
    Ok(())
}

#[test]
fn quit_survives_a_full_input_queue() {
    let stream = multipart(&[jpeg(10), jpeg(20)]);
    let (app, wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Happy, 50.0),
        HeadlessDisplay::new(),
    );
    let mut app = app.with_input_queue(1);
    let sender = app.input_sender();
    assert!(sender.send(InputEvent::PointerDown { x: 0.0, y: 0.0 }));
    assert!(!sender.send(InputEvent::WindowClosed));

    assert_eq!(app.run(), ExitReason::Quit(QuitSource::WindowClosed));
    assert_eq!(count(&wire.lines(), "flash_off"), 1);
}

#[test]
fn interrupt_raised_before_the_app_exists_is_honoured() {
    // The binary installs its Ctrl-C handler on this queue before opening the device.
    let (sender, receiver) = input::channel(4);
    let handler = sender.clone();
    std::thread::spawn(move || handler.send(InputEvent::Interrupt))
        .join()
        .unwrap();

    let stream = multipart(&[jpeg(10)]);
    let (app, wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Happy, 50.0),
        HeadlessDisplay::new(),
    );
    let mut app = app.with_input_channel(sender, receiver);

    assert_eq!(app.run(), ExitReason::Quit(QuitSource::Interrupt));
    assert_eq!(app.display().presented(), 0);
    assert_eq!(wire.lines(), vec!["flash_off".to_string()]);
}

#[test]
fn device_opened_during_an_interrupted_startup_is_left_safe() {
    let (sender, receiver) = input::channel(4);
    let wire = SharedBuffer::new();
    let device = DeviceChannel::new(Box::new(wire.clone()), "test");

    sender.send(InputEvent::Interrupt);
    assert!(receiver.quit_requested());
    // Startup bails out here and drops whatever it already opened.
    drop(device);

    assert_eq!(wire.lines(), vec!["flash_off".to_string()]);
}

#[test]
fn window_close_is_a_quit() {
    let stream = multipart(&[jpeg(10), jpeg(20)]);
    let display = HeadlessDisplay::new().with_script(vec![vec![InputEvent::WindowClosed]]);
    let (mut app, _wire) = build(
        Cursor::new(stream),
        StubClassifier::fixed(Emotion::Happy, 50.0),
        display,
    );
    let reason = app.run();
    assert_eq!(reason, ExitReason::Quit(QuitSource::WindowClosed));
    assert_eq!(reason.exit_code(), 0);
}
