//! Configuration loading and types for clipspeak
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/clipspeak/config.toml)
//! 3. Environment variables (CLIPSPEAK_*)
//! 4. CLI arguments (highest priority)

use crate::error::ConfigError;
use crate::hotkey::KeyCombo;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Clipspeak Configuration
#
# Location: ~/.config/clipspeak/config.toml
# All settings can be overridden via CLI flags

# Microphone sensitivity: RMS energy (16-bit sample scale) a 20 ms frame
# must reach to count as speech
energy_threshold = 100

# Seconds of near-silence after speech that end the phrase
pause_timeout = 0.5

# Hard recording limit in seconds (safety net)
record_timeout = 30.0

# Feedback cue volume (0.0 to 1.0)
volume = 0.7

# Audio input device: "default", a device-name substring, or "list"
# to print available microphones and exit
default_microphone = "default"

# Uppercase the first character of every transcript (lowercase when false)
capitalize = true

# Language hint used until a hotkey or spoken switch selects another
default_language = "en"

# Use the GPU for local inference (requires the 'whisper' build feature)
use_gpu = true

# Path to a ggml model file for local inference
# model = "/path/to/ggml-large-v3-q5_0.bin"

# Remote relay endpoint; when set, audio is POSTed there instead of
# running local inference
# server = "http://127.0.0.1:5000/transcribe"

# Directory of cue sounds named <language_code>.wav (or .mp3) plus done.wav;
# missing files fall back to built-in tones
# sounds_dir = "/home/user/.local/share/clipspeak/sounds"

# Transcripts containing any of these substrings are dropped entirely
hallucination_parts = []

# Transcripts exactly matching any of these phrases are dropped
hallucinations = []

# Key combos that trigger dictation, one per language
[languages]
# en = "shift+l"
# ru = "ctrl+shift+r"

# Spoken phrases that switch the current language when dictated as a
# single word; unlisted languages use built-in names
[language_triggers]
# ru = ["Russian", "Rusk", "Русский"]
# en = ["English", "Англий"]

# Spoken punctuation: symbol -> trigger phrases (any spoken language)
[punctuations]
# ":" = ["colon", "двоето", "двойто"]
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// RMS energy a 20 ms frame must reach to count as speech (16-bit scale)
    pub energy_threshold: u32,

    /// Seconds of near-silence after speech that end the phrase
    pub pause_timeout: f32,

    /// Hard recording limit in seconds
    pub record_timeout: f32,

    /// Feedback cue volume (0.0 to 1.0)
    pub volume: f32,

    /// Input device name substring, "default", or "list"
    pub default_microphone: String,

    /// Use the GPU for local inference
    pub use_gpu: bool,

    /// Path to a ggml model file for local inference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<PathBuf>,

    /// Remote relay endpoint; selects the remote dispatch route when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Uppercase the first transcript character (lowercase when false)
    pub capitalize: bool,

    /// Language hint used until a hotkey or spoken switch selects another
    pub default_language: String,

    /// Directory of cue sound files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sounds_dir: Option<PathBuf>,

    // Array fields stay ahead of the map fields: TOML values must be
    // emitted before tables when the config is serialized
    /// Substrings that mark a transcript as a hallucination
    pub hallucination_parts: Vec<String>,

    /// Exact phrases that mark a transcript as a hallucination
    pub hallucinations: Vec<String>,

    /// Language code -> key combo string ("ctrl+shift+r")
    pub languages: BTreeMap<String, String>,

    /// Language code -> spoken phrases that switch to it; languages missing
    /// here fall back to built-in trigger names
    pub language_triggers: BTreeMap<String, Vec<String>>,

    /// Punctuation symbol -> spoken trigger phrases
    pub punctuations: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            energy_threshold: 100,
            pause_timeout: 0.5,
            record_timeout: 30.0,
            volume: 0.7,
            default_microphone: "default".to_string(),
            use_gpu: true,
            model: None,
            server: None,
            capitalize: true,
            default_language: "en".to_string(),
            sounds_dir: None,
            hallucination_parts: Vec::new(),
            hallucinations: Vec::new(),
            languages: BTreeMap::new(),
            language_triggers: BTreeMap::new(),
            punctuations: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "clipspeak")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Validate field ranges and key bindings.
    ///
    /// Fatal at startup; nothing past this point re-checks the config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::InvalidValue {
                field: "volume",
                reason: format!("{} is outside 0.0..=1.0", self.volume),
            });
        }
        if self.pause_timeout <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "pause_timeout",
                reason: "must be positive".to_string(),
            });
        }
        if self.record_timeout <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "record_timeout",
                reason: "must be positive".to_string(),
            });
        }
        if self.default_language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "default_language",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(server) = &self.server {
            if !server.starts_with("http://") && !server.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    field: "server",
                    reason: format!("must start with http:// or https://, got: {server}"),
                });
            }
        }

        // Combos must parse, and the same combo must not serve two languages
        let mut seen = HashSet::new();
        for combo in self.languages.values() {
            let parsed = KeyCombo::parse(combo)?;
            if !seen.insert(parsed.canonical().to_string()) {
                return Err(ConfigError::DuplicateCombo(parsed.canonical().to_string()));
            }
        }

        Ok(())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Read(e.to_string()))?;

            config = toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(server) = std::env::var("CLIPSPEAK_SERVER") {
        config.server = Some(server);
    }
    if let Ok(mic) = std::env::var("CLIPSPEAK_MICROPHONE") {
        config.default_microphone = mic;
    }

    Ok(config)
}
