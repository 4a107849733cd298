//! Audio feedback cues
//!
//! After a transcript lands on the clipboard the daemon plays a short cue:
//! a language-specific sound when the spoken-language switch fired, a
//! neutral "done" sound otherwise. Cues come from `sounds_dir` as
//! `<language_code>.wav` / `.mp3` and `done.wav` / `.mp3`; when a file is
//! missing the player synthesizes a small tone instead so the feature works
//! without shipping binary assets.

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::path::PathBuf;

/// Which cue to play after a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    /// Transcript delivered, language unchanged
    Done,
    /// The spoken-language switch fired; carries the new language code
    Language(String),
}

/// Audio cue player
pub struct Feedback {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    volume: f32,
    sounds_dir: Option<PathBuf>,
}

impl Feedback {
    pub fn new(volume: f32, sounds_dir: Option<PathBuf>) -> Result<Self, String> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| format!("Failed to open audio output: {e}"))?;

        Ok(Self {
            _stream: stream,
            stream_handle,
            volume,
            sounds_dir,
        })
    }

    /// Play a cue in the background; playback problems are logged, never
    /// propagated
    pub fn play(&self, cue: &Cue) {
        let data = self.cue_data(cue);
        if let Err(e) = self.play_sound(data) {
            tracing::warn!("Failed to play feedback sound: {}", e);
        }
    }

    fn cue_data(&self, cue: &Cue) -> Vec<u8> {
        let name = match cue {
            Cue::Done => "done",
            Cue::Language(code) => code.as_str(),
        };

        if let Some(data) = self.load_sound_file(name) {
            return data;
        }

        match cue {
            // Falling two-tone: completion
            Cue::Done => generate_two_tone_wav(880.0, 440.0, 150, 20),
            // Rising two-tone: something changed
            Cue::Language(_) => generate_two_tone_wav(440.0, 880.0, 150, 20),
        }
    }

    fn load_sound_file(&self, name: &str) -> Option<Vec<u8>> {
        let dir = self.sounds_dir.as_ref()?;
        for ext in ["wav", "mp3"] {
            let path = dir.join(format!("{name}.{ext}"));
            if path.is_file() {
                match std::fs::read(&path) {
                    Ok(data) => return Some(data),
                    Err(e) => tracing::warn!("Failed to read {:?}: {}", path, e),
                }
            }
        }
        None
    }

    fn play_sound(&self, data: Vec<u8>) -> Result<(), String> {
        let source =
            Decoder::new(Cursor::new(data)).map_err(|e| format!("Failed to decode audio: {e}"))?;

        let source = source.amplify(self.volume);

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| format!("Failed to create audio sink: {e}"))?;

        sink.append(source);
        sink.detach(); // Let it play in the background

        Ok(())
    }
}

// === Sound Generation ===

/// Generate a two-tone WAV (rising or falling) with a fade envelope
fn generate_two_tone_wav(freq1: f32, freq2: f32, duration_ms: u32, fade_ms: u32) -> Vec<u8> {
    let sample_rate = 44100u32;
    let num_samples = (sample_rate * duration_ms / 1000) as usize;
    let fade_samples = (sample_rate * fade_ms / 1000) as usize;
    let half_samples = num_samples / 2;

    let mut samples: Vec<i16> = Vec::with_capacity(num_samples);

    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let freq = if i < half_samples { freq1 } else { freq2 };
        let mut amplitude = (2.0 * std::f32::consts::PI * freq * t).sin();

        if i < fade_samples {
            amplitude *= i as f32 / fade_samples as f32;
        } else if i >= num_samples - fade_samples {
            amplitude *= (num_samples - i) as f32 / fade_samples as f32;
        }

        samples.push((amplitude * 16000.0) as i16);
    }

    encode_wav(&samples, sample_rate)
}

/// Encode samples as a mono PCM16 WAV
fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let mut wav = Vec::new();

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    let file_size = (36 + samples.len() * 2) as u32;
    wav.extend_from_slice(&file_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&((samples.len() * 2) as u32).to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_two_tone_wav() {
        let wav = generate_two_tone_wav(440.0, 880.0, 100, 10);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 100ms at 44.1kHz mono PCM16 plus the 44-byte header
        assert_eq!(wav.len(), 44 + 4410 * 2);
    }

    #[test]
    fn test_generated_wav_decodes() {
        let wav = generate_two_tone_wav(880.0, 440.0, 50, 5);
        let decoder = Decoder::new(Cursor::new(wav));
        assert!(decoder.is_ok());
    }

    #[test]
    fn test_cue_names() {
        assert_eq!(Cue::Language("ru".to_string()), Cue::Language("ru".into()));
        assert_ne!(Cue::Done, Cue::Language("en".into()));
    }
}
