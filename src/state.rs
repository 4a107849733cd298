//! Pipeline state machine
//!
//! One dictation runs Idle → Capturing → Dispatching → Normalizing and
//! back to Idle, ending as delivered, suppressed (empty after
//! normalization), or failed. Failures never mutate the language state.

use std::time::Instant;

/// Where the current (or absent) pipeline invocation stands
#[derive(Debug, Clone)]
pub enum State {
    /// Waiting for a hotkey press
    Idle,

    /// Recording audio until the phrase ends
    Capturing {
        /// When capture started
        started_at: Instant,
    },

    /// Audio handed to the local engine or remote relay
    Dispatching {
        /// Length of the captured audio
        audio_secs: f32,
    },

    /// Raw text going through the normalization pipeline
    Normalizing,
}

impl State {
    pub fn new() -> Self {
        State::Idle
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, State::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, State::Capturing { .. })
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Capturing { started_at } => {
                write!(f, "Capturing ({:.1}s)", started_at.elapsed().as_secs_f32())
            }
            State::Dispatching { audio_secs } => {
                write!(f, "Dispatching ({audio_secs:.1}s of audio)")
            }
            State::Normalizing => write!(f, "Normalizing"),
        }
    }
}
