//! Outbound command link to the microcontroller.
//!
//! Protocol: one ASCII command per line, newline terminated, no response.
//! - `<emotion>` after every successful classification
//! - `flash_on` / `flash_off` on toggle
//!
//! `flash_off` is the safety command. `shutdown()` sends it exactly once and
//! seals the channel, so it is always the last line the device sees. `Drop`
//! calls `shutdown()` for unwind paths.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::detect::Emotion;

pub const DEFAULT_BAUD: u32 = 115_200;

/// A single command on the device link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceCommand {
    Emotion(Emotion),
    FlashOn,
    FlashOff,
}

impl DeviceCommand {
    pub fn flash(on: bool) -> Self {
        if on {
            DeviceCommand::FlashOn
        } else {
            DeviceCommand::FlashOff
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCommand::Emotion(emotion) => emotion.label(),
            DeviceCommand::FlashOn => "flash_on",
            DeviceCommand::FlashOff => "flash_off",
        }
    }

    pub fn to_line(self) -> String {
        format!("{}\n", self.as_str())
    }
}

/// Serial port location and speed.
#[derive(Clone, Debug)]
pub struct SerialSettings {
    /// Device path (e.g. `/dev/ttyUSB0`) or `stub://<name>` for a logging stand-in.
    pub port: String,
    pub baud: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: DEFAULT_BAUD,
        }
    }
}

/// Counters for the device link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub commands_sent: u64,
    pub write_failures: u64,
}

/// Fire-and-forget command channel with a once-only safety shutdown.
pub struct DeviceChannel {
    writer: Box<dyn Write + Send>,
    target: String,
    sealed: bool,
    stats: DeviceStats,
}

impl DeviceChannel {
    /// Wrap any writer (tests inject in-memory buffers).
    pub fn new(writer: Box<dyn Write + Send>, target: impl Into<String>) -> Self {
        Self {
            writer,
            target: target.into(),
            sealed: false,
            stats: DeviceStats::default(),
        }
    }

    /// Open the configured transport. Failure here is a startup error.
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        if let Some(name) = settings.port.strip_prefix("stub://") {
            log::warn!("device link is a stub ({}); commands are only logged", name);
            return Ok(Self::new(
                Box::new(LogWriter::new(name)),
                settings.port.clone(),
            ));
        }

        let path = Path::new(&settings.port);
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open serial device {}", path.display()))?;
        configure_port(&file, settings.baud)
            .with_context(|| format!("failed to configure serial device {}", path.display()))?;
        log::info!("device link open on {} @ {} baud", path.display(), settings.baud);
        Ok(Self::new(Box::new(file), settings.port.clone()))
    }

    /// Write one command. Errors are logged and counted, never returned.
    pub fn send(&mut self, command: DeviceCommand) {
        if self.sealed {
            log::debug!(
                "device link sealed; dropping '{}' for {}",
                command.as_str(),
                self.target
            );
            return;
        }
        self.write_line(command);
    }

    /// Send the safety command once and seal the channel. Idempotent.
    pub fn shutdown(&mut self) {
        if self.sealed {
            return;
        }
        self.write_line(DeviceCommand::FlashOff);
        self.sealed = true;
        log::info!("device link {} left in safe state", self.target);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    fn write_line(&mut self, command: DeviceCommand) {
        let line = command.to_line();
        let result = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush());
        match result {
            Ok(()) => {
                self.stats.commands_sent += 1;
                log::debug!("device <- {}", command.as_str());
            }
            Err(e) => {
                self.stats.write_failures += 1;
                log::warn!(
                    "device write '{}' to {} failed: {}",
                    command.as_str(),
                    self.target,
                    e
                );
            }
        }
    }
}

impl Drop for DeviceChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Stand-in transport for runs without hardware.
struct LogWriter {
    name: String,
    pending: Vec<u8>,
}

impl LogWriter {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pending: Vec::new(),
        }
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for line in self.pending.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
            log::info!("stub device {} <- {}", self.name, String::from_utf8_lossy(line));
        }
        self.pending.clear();
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn configure_port(file: &File, baud: u32) -> Result<()> {
    use anyhow::anyhow;
    use std::os::unix::io::AsRawFd;

    let speed = match baud {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        460_800 => libc::B460800,
        921_600 => libc::B921600,
        other => return Err(anyhow!("unsupported baud rate {}", other)),
    };

    let fd = file.as_raw_fd();
    // SAFETY: termios is plain old data and fd is a valid open descriptor.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENOTTY) {
            log::debug!("device is not a tty; skipping baud configuration");
            return Ok(());
        }
        return Err(err).context("tcgetattr");
    }
    unsafe {
        libc::cfmakeraw(&mut tio);
        libc::cfsetispeed(&mut tio, speed);
        libc::cfsetospeed(&mut tio, speed);
    }
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(io::Error::last_os_error()).context("tcsetattr");
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn configure_port(_file: &File, baud: u32) -> Result<()> {
    log::warn!(
        "baud rate configuration unsupported on this platform; assuming port is preset to {}",
        baud
    );
    Ok(())
}

/// In-memory transport that stays readable after the channel takes ownership.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer {
    inner: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[cfg(test)]
impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line written so far.
    pub fn lines(&self) -> Vec<String> {
        let bytes = match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|line| line.to_string())
            .collect()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "buffer lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
