//! Phrase-bounded microphone capture
//!
//! A capture session records until the speaker pauses. Audio accumulates as
//! PCM16 while 20 ms frames are scored by RMS energy against the configured
//! threshold; once speech has been heard and the trailing frames stay quiet
//! for `phrase_timeout`, the phrase is over. `hard_timeout` caps the whole
//! recording either way.
//!
//! `capture` blocks its calling thread for the full recording and owns the
//! input stream exclusively while it runs. The daemon calls it through
//! `spawn_blocking`, which is also what serializes invocations: no second
//! capture can start until the first returns.

use super::{open_input_device, AudioBuffer, SAMPLE_RATE};
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Samples per 20 ms energy frame
const FRAME_SIZE: usize = (SAMPLE_RATE as usize) * 20 / 1000;

/// One microphone recording, bounded by silence or the hard timeout
pub struct CaptureSession {
    device_name: String,
    energy_threshold: f32,
}

impl CaptureSession {
    /// `device_name` must already be resolved (see
    /// `audio::resolve_device_name`); `energy_threshold` is RMS on the
    /// 16-bit sample scale.
    pub fn new(device_name: String, energy_threshold: u32) -> Self {
        Self {
            device_name,
            energy_threshold: energy_threshold as f32,
        }
    }

    /// Record until `phrase_timeout` of near-silence follows speech, or
    /// `hard_timeout` elapses, whichever comes first. Returns every sample
    /// recorded during the session.
    pub fn capture(
        &self,
        phrase_timeout: Duration,
        hard_timeout: Duration,
    ) -> Result<AudioBuffer, DeviceError> {
        let device = open_input_device(&self.device_name)?;

        let supported = device
            .default_input_config()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        let channels = supported.channels() as usize;
        let sample_format = supported.sample_format();

        // Ask the backend for 16 kHz directly; PipeWire/PulseAudio insert
        // their own converter, so the pipeline never resamples.
        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        tracing::debug!(
            "Capture config: {} channel(s), format {:?}, {} Hz",
            channels,
            sample_format,
            SAMPLE_RATE
        );

        let samples: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));

        let err_fn = |err| tracing::error!("Audio stream error: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, samples.clone(), channels, err_fn)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, samples.clone(), channels, err_fn)
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, samples.clone(), channels, err_fn)
            }
            format => {
                return Err(DeviceError::Stream(format!(
                    "unsupported sample format: {format:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        self.wait_for_phrase_end(&samples, phrase_timeout, hard_timeout);

        // Dropping the stream stops the callback; nothing appends after this
        drop(stream);

        let collected = {
            let mut guard = samples.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };

        let buffer = AudioBuffer::from_samples(&collected);
        tracing::debug!(
            "Capture finished: {} samples ({:.2}s)",
            collected.len(),
            buffer.duration_secs()
        );

        Ok(buffer)
    }

    /// Block until the phrase boundary: scan complete 20 ms frames as they
    /// arrive and track when the last voiced frame was seen.
    fn wait_for_phrase_end(
        &self,
        samples: &Arc<Mutex<Vec<i16>>>,
        phrase_timeout: Duration,
        hard_timeout: Duration,
    ) {
        let started = Instant::now();
        let mut scanned = 0usize;
        let mut speech_seen = false;
        let mut last_voiced = started;

        loop {
            std::thread::sleep(Duration::from_millis(20));
            let now = Instant::now();

            {
                let guard = match samples.lock() {
                    Ok(g) => g,
                    Err(p) => p.into_inner(),
                };
                while guard.len() - scanned >= FRAME_SIZE {
                    let frame = &guard[scanned..scanned + FRAME_SIZE];
                    if rms(frame) >= self.energy_threshold {
                        speech_seen = true;
                        last_voiced = now;
                    }
                    scanned += FRAME_SIZE;
                }
            }

            if speech_seen && now.duration_since(last_voiced) >= phrase_timeout {
                tracing::debug!(
                    "Phrase ended after {:.2}s of silence",
                    phrase_timeout.as_secs_f32()
                );
                return;
            }
            if now.duration_since(started) >= hard_timeout {
                tracing::warn!(
                    "Recording timeout ({:.0}s limit), stopping",
                    hard_timeout.as_secs_f32()
                );
                return;
            }
        }
    }
}

/// RMS amplitude of a frame on the i16 scale
fn rms(frame: &[i16]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / frame.len() as f64).sqrt() as f32
}

/// Build an input stream for a specific sample type, downmixing to mono i16
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Mutex<Vec<i16>>>,
    channels: usize,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono: Vec<i16> = data
                    .chunks(channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        let avg = sum / channels as f32;
                        (avg.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                    })
                    .collect();

                if let Ok(mut guard) = samples.lock() {
                    guard.extend_from_slice(&mono);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()))?;

    Ok(stream)
}
