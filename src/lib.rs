//! Clipspeak: hotkey-triggered dictation to the clipboard
//!
//! This library provides the core functionality for:
//! - Tracking raw key events and firing per-language key combos (evdev)
//! - Capturing a phrase of microphone audio, bounded by silence (cpal)
//! - Dispatching the capture to a local whisper engine or a remote relay
//! - Normalizing the transcript (capitalization, spoken punctuation,
//!   spoken-language switching, hallucination filtering)
//! - Delivering the result to the clipboard with an audio cue (rodio)
//!
//! # Architecture
//!
//! ```text
//!   raw key events ──▶ KeyState ──▶ HotkeyRouter
//!                                       │ combo completed
//!                                       ▼
//!                                 CaptureSession ──▶ AudioBuffer (PCM16 mono 16 kHz)
//!                                       │
//!                                       ▼
//!                              TranscriptionDispatch
//!                              local engine │ remote relay
//!                                       │ raw text
//!                                       ▼
//!                                   Normalizer
//!                                       │ final text (empty = suppress)
//!                                       ▼
//!                             clipboard + audio cue
//! ```
//!
//! The daemon runs exactly one pipeline invocation at a time; key events
//! arriving mid-invocation are queued and applied afterwards.

pub mod audio;
pub mod config;
pub mod daemon;
pub mod error;
pub mod hotkey;
pub mod output;
pub mod state;
pub mod text;
pub mod transcribe;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{ClipspeakError, Result};
