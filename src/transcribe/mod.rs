//! Speech-to-text dispatch
//!
//! Routes a captured `AudioBuffer` to either a local inference engine or a
//! remote HTTP relay, selected once at startup: a configured `server`
//! endpoint means remote, otherwise local. Both routes return the raw
//! recognized text plus timing telemetry; normalization happens elsewhere.

pub mod remote;

#[cfg(feature = "whisper")]
pub mod local;

use crate::audio::AudioBuffer;
use crate::config::Config;
use crate::error::{ClipspeakError, TranscribeError};
use std::time::Duration;

/// Interface to a speech-to-text engine: mono 16 kHz f32 samples in
/// [-1.0, 1.0] plus a language hint, raw text out
pub trait SpeechEngine: Send + Sync {
    fn transcribe(&self, samples: &[f32], language: &str) -> Result<String, TranscribeError>;
}

/// Outcome of one dispatch
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Raw recognized text, whitespace-trimmed, not yet normalized
    pub text: String,
    /// Processing time reported by the remote relay, in seconds
    /// (0.0 on the local route)
    pub server_time: f32,
    /// Wall-clock time of the whole dispatch
    pub total_time: Duration,
}

/// One dispatch route; implementations are interchangeable to the daemon
pub trait Dispatch: Send + Sync {
    fn dispatch(
        &self,
        audio: &AudioBuffer,
        language: &str,
    ) -> Result<TranscriptionResult, TranscribeError>;
}

/// Local dispatch: PCM16 -> f32 conversion, then a synchronous engine call
pub struct LocalDispatcher {
    engine: Box<dyn SpeechEngine>,
}

impl LocalDispatcher {
    pub fn new(engine: Box<dyn SpeechEngine>) -> Self {
        Self { engine }
    }
}

impl Dispatch for LocalDispatcher {
    fn dispatch(
        &self,
        audio: &AudioBuffer,
        language: &str,
    ) -> Result<TranscriptionResult, TranscribeError> {
        if audio.is_empty() {
            return Err(TranscribeError::AudioFormat("empty audio buffer".into()));
        }

        let start = std::time::Instant::now();
        let samples = audio.to_f32();

        tracing::debug!(
            "Dispatching {:.2}s of audio to the local engine (language: {})",
            audio.duration_secs(),
            language
        );

        let text = self.engine.transcribe(&samples, language)?;

        Ok(TranscriptionResult {
            text: text.trim().to_string(),
            server_time: 0.0,
            total_time: start.elapsed(),
        })
    }
}

/// Build the dispatcher the configuration asks for.
///
/// Fatal at startup when the local route is requested but the binary was
/// built without the `whisper` feature.
pub fn create_dispatcher(config: &Config) -> Result<Box<dyn Dispatch>, ClipspeakError> {
    if let Some(server) = &config.server {
        tracing::info!("Using remote transcription relay at {}", server);
        return Ok(Box::new(remote::RemoteDispatcher::new(server.clone())));
    }

    #[cfg(feature = "whisper")]
    {
        tracing::info!("Using local whisper engine");
        let engine = local::WhisperEngine::new(config)?;
        Ok(Box::new(LocalDispatcher::new(Box::new(engine))))
    }

    #[cfg(not(feature = "whisper"))]
    {
        Err(crate::error::ConfigError::Unsupported(
            "this build has no local speech engine (enable the 'whisper' feature) \
             and no 'server' endpoint is configured"
                .to_string(),
        )
        .into())
    }
}
