//! Audio capture and playback
//!
//! Capture runs through cpal, which works with PipeWire, PulseAudio, and
//! ALSA backends. Everything downstream of capture speaks one format: raw
//! little-endian PCM16, mono, 16 kHz.

pub mod capture;
pub mod feedback;

use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait};

/// Sample rate the whole pipeline runs at
pub const SAMPLE_RATE: u32 = 16_000;

/// Raw little-endian PCM16 mono samples at 16 kHz.
///
/// Owned by the capture session until handed to the dispatcher; nothing
/// else holds a reference to the bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBuffer {
    bytes: Vec<u8>,
}

impl AudioBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_samples(samples: &[i16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Duration in seconds: two bytes per sample at 16 kHz
    pub fn duration_secs(&self) -> f32 {
        self.bytes.len() as f32 / 2.0 / SAMPLE_RATE as f32
    }

    /// Decode to normalized f32 samples in [-1.0, 1.0] (sample / 32768.0),
    /// the format local speech engines consume
    pub fn to_f32(&self) -> Vec<f32> {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect()
    }
}

/// Names of all available input devices, for `clipspeak devices` and
/// `default_microphone = "list"`
pub fn list_input_devices() -> Result<Vec<String>, DeviceError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| DeviceError::Backend(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Resolve a configured microphone name to a concrete device name.
///
/// Matching strategy (in order): exact, exact case-insensitive, substring
/// case-insensitive. "default" resolves to the system default input.
/// Runs once at daemon startup; failure here is fatal.
pub fn resolve_device_name(configured: &str) -> Result<String, DeviceError> {
    let host = cpal::default_host();

    if configured == "default" {
        let device = host
            .default_input_device()
            .ok_or(DeviceError::NoDefault)?;
        return device.name().map_err(|e| DeviceError::Backend(e.to_string()));
    }

    let names: Vec<String> = host
        .input_devices()
        .map_err(|e| DeviceError::Backend(e.to_string()))?
        .filter_map(|d| d.name().ok())
        .collect();

    let search_lower = configured.to_lowercase();

    let matched = names
        .iter()
        .find(|n| n.as_str() == configured)
        .or_else(|| names.iter().find(|n| n.to_lowercase() == search_lower))
        .or_else(|| names.iter().find(|n| n.to_lowercase().contains(&search_lower)));

    match matched {
        Some(name) => {
            tracing::info!("Using audio device: {}", name);
            Ok(name.clone())
        }
        None => Err(DeviceError::NoMatch(configured.to_string())),
    }
}

/// Open the named input device (exact name, as produced by
/// `resolve_device_name`)
pub(crate) fn open_input_device(name: &str) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();

    if name == "default" {
        return host.default_input_device().ok_or(DeviceError::NoDefault);
    }

    host.input_devices()
        .map_err(|e| DeviceError::Backend(e.to_string()))?
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| DeviceError::NoMatch(name.to_string()))
}
