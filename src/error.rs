//! Error types for clipspeak
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.
//!
//! Only configuration and startup device-resolution errors are allowed to
//! terminate the process. Everything that happens per dictation (capture,
//! dispatch, clipboard write) is caught at the pipeline boundary and logged.

use thiserror::Error;

/// Top-level error type for the clipspeak application
#[derive(Error, Debug)]
pub enum ClipspeakError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in the configuration file or the key bindings built from it
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("key combo '{0}' is bound more than once")]
    DuplicateCombo(String),

    #[error("invalid key combo '{combo}': {reason}")]
    InvalidCombo { combo: String, reason: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config: {0}")]
    Read(String),

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("{0}")]
    Unsupported(String),
}

/// Errors related to audio or input devices
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no audio input device matches '{0}'. Run 'clipspeak devices' to list them.")]
    NoMatch(String),

    #[error("no default audio input device")]
    NoDefault,

    #[error("audio backend error: {0}")]
    Backend(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    InputAccess(String),

    #[error("no keyboard device found in /dev/input/")]
    NoKeyboard,
}

/// Errors related to speech-to-text dispatch
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote server error: {0}")]
    Remote(String),

    #[error("speech engine error: {0}")]
    Engine(String),

    #[error("audio format error: {0}")]
    AudioFormat(String),
}

/// Errors related to clipboard delivery
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("wl-copy not found in PATH. Install wl-clipboard via your package manager.")]
    WlCopyNotFound,

    #[error("clipboard write failed: {0}")]
    WriteFailed(String),
}

/// Result type alias using ClipspeakError
pub type Result<T> = std::result::Result<T, ClipspeakError>;
