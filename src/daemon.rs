//! Daemon module - main event loop orchestration
//!
//! One task owns everything: it drains raw key events into the router and,
//! when a press completes a combo, runs the whole dictation pipeline
//! (capture → dispatch → normalize → deliver) to completion before touching
//! the next event. Capture and dispatch run on the blocking pool and are
//! awaited inline; neither can be cancelled once started, and at most one
//! invocation is ever in flight. Key events that
//! arrive mid-pipeline queue up and land in the key state, in order, as
//! soon as the invocation finishes.

use crate::audio::capture::CaptureSession;
use crate::audio::feedback::{Cue, Feedback};
use crate::audio::{self, AudioBuffer};
use crate::config::Config;
use crate::error::Result;
use crate::hotkey::{HotkeyRouter, KeyBinding, KeyCombo, KeyEvent};
use crate::output::{ClipboardSink, OutputSink};
use crate::state::State;
use crate::text::{NormalizationRules, Normalized, Normalizer};
use crate::transcribe::{self, Dispatch, TranscriptionResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    router: HotkeyRouter,
    normalizer: Normalizer,
    dispatcher: Arc<dyn Dispatch>,
    sink: Box<dyn OutputSink>,
    feedback: Option<Feedback>,
    /// Concrete microphone name, resolved once at startup
    device: String,
    /// Current dictation language, mutated only by the spoken switch
    language: String,
    /// Whether the spoken switch has ever committed; until then the
    /// triggering binding's language seeds the dispatch hint
    language_committed: bool,
    state: State,
}

impl Daemon {
    /// Build the daemon. Everything that can be validated up front happens
    /// here, and any failure is fatal: bad bindings, an unmatched
    /// microphone, a missing model.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let mut router = HotkeyRouter::new();
        for (code, combo) in &config.languages {
            router.register(KeyCombo::parse(combo)?, code.clone())?;
        }
        if router.bindings().is_empty() {
            tracing::warn!("No [languages] bindings configured; nothing will trigger dictation");
        }

        let device = audio::resolve_device_name(&config.default_microphone)?;

        let dispatcher: Arc<dyn Dispatch> = Arc::from(transcribe::create_dispatcher(&config)?);

        let rules = NormalizationRules::from_config(&config);
        let normalizer = Normalizer::new(&rules, config.capitalize);

        let feedback = match Feedback::new(config.volume, config.sounds_dir.clone()) {
            Ok(feedback) => Some(feedback),
            Err(e) => {
                tracing::warn!("Audio feedback unavailable: {}", e);
                None
            }
        };

        let language = config.default_language.clone();

        Ok(Self {
            config,
            router,
            normalizer,
            dispatcher,
            sink: Box::new(ClipboardSink),
            feedback,
            device,
            language,
            language_committed: false,
            state: State::Idle,
        })
    }

    fn set_state(&mut self, state: State) {
        tracing::debug!("State: {}", state);
        self.state = state;
    }

    /// Current pipeline state, for logging and external inspection
    pub fn state(&self) -> &State {
        &self.state
    }

    fn play_cue(&self, cue: Cue) {
        if let Some(ref feedback) = self.feedback {
            feedback.play(&cue);
        }
    }

    /// Run the daemon main loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting clipspeak daemon");

        let mut sigterm = signal(SignalKind::terminate()).map_err(crate::error::ClipspeakError::Io)?;

        let mut source = crate::hotkey::evdev_listener::EvdevSource::new()?;
        let mut key_rx = source.start();

        for binding in self.router.bindings() {
            tracing::info!(
                "Listening for {} -> dictate in '{}'",
                binding.combo,
                binding.language
            );
        }

        loop {
            tokio::select! {
                Some(event) = key_rx.recv() => {
                    match event {
                        KeyEvent::Pressed(token) => {
                            let fired = self.router.on_press(token);
                            for binding in fired {
                                self.run_invocation(&binding).await;
                            }
                        }
                        KeyEvent::Released(token) => {
                            self.router.on_release(&token);
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down...");
                    break;
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }
        }

        source.stop();
        tracing::info!("Daemon stopped");

        Ok(())
    }

    /// One full dictation: capture, dispatch, normalize, deliver.
    ///
    /// Every per-invocation failure is logged and ends back in Idle; only
    /// a successful normalization may move the language state.
    async fn run_invocation(&mut self, binding: &KeyBinding) {
        tracing::info!("Dictation triggered by {}", binding.combo);

        let audio = match self.capture_phrase().await {
            Some(audio) => audio,
            None => {
                self.set_state(State::Idle);
                return;
            }
        };

        // The committed language state drives dispatch, so a spoken switch
        // reaches the engine on the very next dictation; the triggering
        // binding only seeds the hint before the first switch (see DESIGN.md)
        let language = if self.language_committed {
            self.language.clone()
        } else {
            binding.language.clone()
        };

        let result = match self.dispatch_audio(&audio, &language).await {
            Some(result) => result,
            None => {
                self.set_state(State::Idle);
                return;
            }
        };

        self.set_state(State::Normalizing);
        let outcome = self.normalizer.normalize(&result.text, &self.language);

        // Commit the language switch before anything else can observe it
        if outcome.language_changed {
            tracing::info!("Language switched: {} -> {}", self.language, outcome.language);
            self.language = outcome.language.clone();
            self.language_committed = true;
        }

        tracing::info!(
            "[{:.1}s audio, {:.1}s total, {:.1}s server] {:?} -> {:?}",
            audio.duration_secs(),
            result.total_time.as_secs_f32(),
            result.server_time,
            result.text,
            outcome.text
        );

        if outcome.text.is_empty() {
            tracing::debug!("Transcript suppressed, nothing delivered");
            self.set_state(State::Idle);
            return;
        }

        self.deliver(&outcome).await;
        self.set_state(State::Idle);
    }

    /// Capture stage; None means the invocation is over (already logged)
    async fn capture_phrase(&mut self) -> Option<AudioBuffer> {
        self.set_state(State::Capturing {
            started_at: std::time::Instant::now(),
        });

        let session = CaptureSession::new(self.device.clone(), self.config.energy_threshold);
        let phrase_timeout = Duration::from_secs_f32(self.config.pause_timeout);
        let hard_timeout = Duration::from_secs_f32(self.config.record_timeout);

        let captured =
            tokio::task::spawn_blocking(move || session.capture(phrase_timeout, hard_timeout))
                .await;

        match captured {
            Ok(Ok(audio)) => {
                tracing::info!("Captured {:.1}s of audio", audio.duration_secs());
                Some(audio)
            }
            Ok(Err(e)) => {
                tracing::warn!("Capture failed: {}", e);
                None
            }
            Err(e) => {
                tracing::error!("Capture task failed: {}", e);
                None
            }
        }
    }

    /// Dispatch stage; None means the invocation is over (already logged)
    async fn dispatch_audio(
        &mut self,
        audio: &AudioBuffer,
        language: &str,
    ) -> Option<TranscriptionResult> {
        self.set_state(State::Dispatching {
            audio_secs: audio.duration_secs(),
        });

        let dispatcher = self.dispatcher.clone();
        let audio = audio.clone();
        let language = language.to_string();

        let dispatched =
            tokio::task::spawn_blocking(move || dispatcher.dispatch(&audio, &language)).await;

        match dispatched {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                tracing::error!("Transcription failed: {}", e);
                None
            }
            Err(e) => {
                tracing::error!("Transcription task failed: {}", e);
                None
            }
        }
    }

    /// Delivery stage: clipboard write, then the audio cue
    async fn deliver(&mut self, outcome: &Normalized) {
        if let Err(e) = self.sink.deliver(&outcome.text).await {
            tracing::error!("{} failed: {}", self.sink.name(), e);
            return;
        }

        let cue = if outcome.language_changed {
            Cue::Language(outcome.language.clone())
        } else {
            Cue::Done
        };
        self.play_cue(cue);
    }
}
