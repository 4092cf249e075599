use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use emotion_relay::config::RelayConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "RELAY_CONFIG",
        "RELAY_STREAM_URL",
        "RELAY_SERIAL_PORT",
        "RELAY_SERIAL_BAUD",
        "RELAY_EMOJI_DIR",
        "RELAY_INFERENCE_INTERVAL_MS",
        "RELAY_CLASSIFIER",
        "RELAY_MODEL_PATH",
    ] {
        std::env::remove_var(key);
    }
}

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    clear_env();
    guard
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = lock_env();

    let cfg = RelayConfig::load().expect("load defaults");

    assert_eq!(cfg.stream.url, "http://192.168.4.1:81/stream");
    assert_eq!(cfg.stream.read_timeout, Duration::from_secs(10));
    assert_eq!(cfg.stream.chunk_size, 1024);
    assert_eq!(cfg.serial.port, "/dev/ttyUSB0");
    assert_eq!(cfg.serial.baud, 115_200);
    assert_eq!(cfg.emoji_dir, PathBuf::from("./emojis"));
    assert_eq!(cfg.inference.interval, Duration::from_millis(1000));
    assert_eq!(cfg.inference.failure_backoff, Duration::from_millis(500));
    assert_eq!(cfg.inference.timeout, Some(Duration::from_millis(5000)));
    assert!(!cfg.inference.enforce_detection);
    assert_eq!(cfg.inference.classifier, "stub");
    assert_eq!(cfg.display.input_queue, 64);
    assert!(!cfg.display.headless);
}

#[test]
fn loads_json_file_with_env_overrides() {
    let _guard = lock_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "stream": { "url": "http://10.0.0.7:81/stream", "read_timeout_ms": 2500, "chunk_size": 4096 },
        "serial": { "port": "/dev/ttyACM0", "baud": 9600 },
        "inference": { "interval_ms": 750, "failure_backoff_ms": 0, "timeout_ms": 0, "enforce_detection": true },
        "assets": { "emoji_dir": "/opt/relay/emojis" },
        "display": { "headless": true, "title": "Booth 3", "input_queue": 8 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("RELAY_CONFIG", file.path());
    std::env::set_var("RELAY_SERIAL_BAUD", "57600");
    std::env::set_var("RELAY_INFERENCE_INTERVAL_MS", "2000");

    let cfg = RelayConfig::load().expect("load config");

    assert_eq!(cfg.stream.url, "http://10.0.0.7:81/stream");
    assert_eq!(cfg.stream.read_timeout, Duration::from_millis(2500));
    assert_eq!(cfg.stream.chunk_size, 4096);
    assert_eq!(cfg.serial.port, "/dev/ttyACM0");
    assert_eq!(cfg.serial.baud, 57600);
    assert_eq!(cfg.inference.interval, Duration::from_millis(2000));
    assert_eq!(cfg.inference.failure_backoff, Duration::ZERO);
    assert_eq!(cfg.inference.timeout, None);
    assert!(cfg.inference.enforce_detection);
    assert_eq!(cfg.emoji_dir, PathBuf::from("/opt/relay/emojis"));
    assert!(cfg.display.headless);
    assert_eq!(cfg.display.title, "Booth 3");
    assert_eq!(cfg.display.input_queue, 8);

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = lock_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
[stream]
url = "file:///var/captures/session.mjpeg"

[serial]
port = "stub://bench"

[inference]
classifier = "STUB"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let mut cfg = RelayConfig::load_from(Some(file.path())).expect("load toml");
    cfg.validate().expect("valid toml config");

    assert_eq!(cfg.stream.url, "file:///var/captures/session.mjpeg");
    assert_eq!(cfg.serial.port, "stub://bench");
    assert_eq!(cfg.inference.classifier, "stub");
}

#[test]
fn env_overrides_without_file() {
    let _guard = lock_env();

    std::env::set_var("RELAY_STREAM_URL", "http://cam.local/stream");
    std::env::set_var("RELAY_SERIAL_PORT", "/dev/ttyS1");
    std::env::set_var("RELAY_EMOJI_DIR", "/tmp/emojis");
    std::env::set_var("RELAY_CLASSIFIER", "stub");

    let cfg = RelayConfig::load().expect("load config");
    assert_eq!(cfg.stream.url, "http://cam.local/stream");
    assert_eq!(cfg.serial.port, "/dev/ttyS1");
    assert_eq!(cfg.emoji_dir, PathBuf::from("/tmp/emojis"));

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = lock_env();

    std::env::set_var("RELAY_SERIAL_BAUD", "fast");
    assert!(RelayConfig::load().is_err());
    clear_env();

    std::env::set_var("RELAY_STREAM_URL", "not a url");
    assert!(RelayConfig::load().is_err());
    clear_env();

    std::env::set_var("RELAY_INFERENCE_INTERVAL_MS", "0");
    assert!(RelayConfig::load().is_err());
    clear_env();

    std::env::set_var("RELAY_CLASSIFIER", "tract");
    let err = RelayConfig::load().unwrap_err();
    assert!(err.to_string().contains("model path"));
    clear_env();

    std::env::set_var("RELAY_CLASSIFIER", "magic");
    assert!(RelayConfig::load().is_ok(), "backend names are checked when the classifier is built");
    clear_env();
}

#[test]
fn overrides_applied_after_loading_can_fix_settings() {
    let _guard = lock_env();

    std::env::set_var("RELAY_CLASSIFIER", "tract");
    std::env::set_var("RELAY_STREAM_URL", "not a url");

    let mut cfg = RelayConfig::load_from(None).expect("load without validation");
    assert_eq!(cfg.inference.classifier, "tract");
    assert!(cfg.clone().validate().is_err());

    // What `--model` and `--stream-url` do in the binary.
    cfg.inference.model_path = Some(PathBuf::from("models/emotion-ferplus.onnx"));
    cfg.stream.url = "http://10.0.0.9:81/stream".to_string();
    cfg.validate().expect("valid once overrides are applied");

    // The validated entry point still rejects the same environment.
    assert!(RelayConfig::load().is_err());

    clear_env();
}

#[test]
fn malformed_file_is_an_error() {
    let _guard = lock_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ \"stream\": { \"url\": 5 } }").expect("write config");
    assert!(RelayConfig::load_from(Some(file.path())).is_err());

    assert!(RelayConfig::load_from(Some(std::path::Path::new("/nonexistent/relay.json"))).is_err());
}
