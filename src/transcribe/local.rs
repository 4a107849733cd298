//! Local whisper.cpp engine adapter
//!
//! Binds the `SpeechEngine` seam to whisper-rs. Compiled only with the
//! `whisper` feature so the default build carries no native inference
//! toolchain; remote-only setups never pay for it.

use super::SpeechEngine;
use crate::config::Config;
use crate::error::{ClipspeakError, ConfigError, TranscribeError};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// whisper.cpp-backed speech engine
pub struct WhisperEngine {
    /// Whisper context (holds the model)
    ctx: WhisperContext,
    /// Number of threads to use
    threads: usize,
}

impl WhisperEngine {
    pub fn new(config: &Config) -> Result<Self, ClipspeakError> {
        let model_path = config.model.as_ref().ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "model",
                reason: "required for local transcription".to_string(),
            }
        })?;

        if !model_path.is_file() {
            return Err(ConfigError::InvalidValue {
                field: "model",
                reason: format!("model file not found: {}", model_path.display()),
            }
            .into());
        }

        tracing::info!("Loading whisper model from {:?}", model_path);
        let start = std::time::Instant::now();

        let mut params = WhisperContextParameters::default();
        params.use_gpu(config.use_gpu);

        let ctx = WhisperContext::new_with_params(
            model_path.to_str().ok_or_else(|| {
                ClipspeakError::Transcribe(TranscribeError::Engine("invalid model path".into()))
            })?,
            params,
        )
        .map_err(|e| ClipspeakError::Transcribe(TranscribeError::Engine(e.to_string())))?;

        tracing::info!("Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        let threads = num_cpus::get().min(4);

        Ok(Self { ctx, threads })
    }
}

impl SpeechEngine for WhisperEngine {
    fn transcribe(&self, samples: &[f32], language: &str) -> Result<String, TranscribeError> {
        let duration_secs = samples.len() as f32 / 16000.0;
        tracing::debug!(
            "Transcribing {:.2}s of audio ({} samples)",
            duration_secs,
            samples.len()
        );

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::Engine(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // "auto" enables whisper's own language detection
        if language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(language));
        }

        params.set_n_threads(self.threads as i32);

        // Disable output we don't need
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params.set_suppress_blank(true);
        params.set_suppress_nst(true);

        // For short recordings, use single segment mode
        if duration_secs < 30.0 {
            params.set_single_segment(true);
        }

        state
            .full(params, samples)
            .map_err(|e| TranscribeError::Engine(e.to_string()))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(
                segment
                    .to_str()
                    .map_err(|e| TranscribeError::Engine(e.to_string()))?,
            );
        }

        Ok(text.trim().to_string())
    }
}
