//! evdev-based raw key event source
//!
//! Reads key transitions at the kernel level so they arrive on every
//! Wayland compositor and on the console alike. Every press and release is
//! forwarded as a canonical `KeyEvent`; combo matching happens in the
//! router, not here. Key-repeat events (value 2) are dropped, which is what
//! keeps combo firing edge-triggered.
//!
//! The user must be in the 'input' group to access /dev/input/* devices.

use super::{KeyEvent, KeyToken};
use crate::error::DeviceError;
use evdev::{Device, InputEventKind};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// Streams raw key events from every keyboard in /dev/input
pub struct EvdevSource {
    device_paths: Vec<PathBuf>,
    stop_signal: Option<oneshot::Sender<()>>,
}

impl EvdevSource {
    pub fn new() -> Result<Self, DeviceError> {
        let device_paths = find_keyboard_devices()?;

        if device_paths.is_empty() {
            return Err(DeviceError::NoKeyboard);
        }

        tracing::debug!(
            "Found {} keyboard device(s): {:?}",
            device_paths.len(),
            device_paths
        );

        Ok(Self {
            device_paths,
            stop_signal: None,
        })
    }

    /// Start the listener task and return the event channel.
    ///
    /// The stream is restartable: after `stop`, `start` may be called again.
    pub fn start(&mut self) -> mpsc::Receiver<KeyEvent> {
        let (tx, rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_signal = Some(stop_tx);

        let device_paths = self.device_paths.clone();
        tokio::task::spawn_blocking(move || {
            listener_loop(device_paths, tx, stop_rx);
        });

        rx
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop_signal.take() {
            let _ = stop.send(());
        }
    }
}

/// Main listener loop running in a blocking task
fn listener_loop(
    device_paths: Vec<PathBuf>,
    tx: mpsc::Sender<KeyEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    // Open all keyboard devices in non-blocking mode
    let mut devices: Vec<Device> = device_paths
        .iter()
        .filter_map(|path| match Device::open(path) {
            Ok(device) => {
                let fd = device.as_raw_fd();
                unsafe {
                    let flags = libc::fcntl(fd, libc::F_GETFL);
                    if flags != -1 {
                        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    }
                }
                tracing::debug!("Opened device (non-blocking): {:?}", path);
                Some(device)
            }
            Err(e) => {
                tracing::warn!("Failed to open {:?}: {}", path, e);
                None
            }
        })
        .collect();

    if devices.is_empty() {
        tracing::error!("No keyboard devices could be opened");
        return;
    }

    loop {
        // Check for stop signal (non-blocking)
        match stop_rx.try_recv() {
            Ok(_) | Err(oneshot::error::TryRecvError::Closed) => {
                tracing::debug!("Key event source stopping");
                return;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        // Poll each device (all set to non-blocking mode)
        for device in &mut devices {
            if let Ok(events) = device.fetch_events() {
                for event in events {
                    if let InputEventKind::Key(key) = event.kind() {
                        let token = token_for_key(key);
                        let sent = match event.value() {
                            1 => tx.blocking_send(KeyEvent::Pressed(token)),
                            0 => tx.blocking_send(KeyEvent::Released(token)),
                            // value 2 is key repeat
                            _ => Ok(()),
                        };
                        if sent.is_err() {
                            return; // Channel closed
                        }
                    }
                }
            }
        }

        // Small sleep to avoid busy-waiting
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

/// Canonical token for an evdev key code.
///
/// evdev debug-formats as "KEY_LEFTSHIFT"; `KeyToken::new` strips the
/// prefix and collapses the side.
fn token_for_key(key: evdev::Key) -> KeyToken {
    KeyToken::new(&format!("{key:?}"))
}

/// Find all keyboard input devices
fn find_keyboard_devices() -> Result<Vec<PathBuf>, DeviceError> {
    use evdev::Key;

    let mut keyboards = Vec::new();

    let input_dir = std::fs::read_dir("/dev/input")
        .map_err(|e| DeviceError::InputAccess(format!("/dev/input: {e}")))?;

    for entry in input_dir {
        let entry = entry.map_err(|e| DeviceError::InputAccess(e.to_string()))?;
        let path = entry.path();

        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);

        if !is_event_device {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                // A keyboard should have at least some letter keys
                let has_keys = device
                    .supported_keys()
                    .map(|keys| {
                        keys.contains(Key::KEY_A)
                            && keys.contains(Key::KEY_Z)
                            && keys.contains(Key::KEY_ENTER)
                    })
                    .unwrap_or(false);

                if has_keys {
                    tracing::debug!(
                        "Found keyboard: {:?} ({:?})",
                        path,
                        device.name().unwrap_or("unknown")
                    );
                    keyboards.push(path);
                }
            }
            Err(e) => {
                // Permission denied is common for non-input-group users
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    return Err(DeviceError::InputAccess(path.display().to_string()));
                }
                // Other errors (device busy, etc.) - just skip
                tracing::trace!("Skipping {:?}: {}", path, e);
            }
        }
    }

    Ok(keyboards)
}
