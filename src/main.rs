//! Clipspeak - hotkey dictation to the clipboard
//!
//! Run with `clipspeak` or `clipspeak daemon` to start the daemon.
//! Use `clipspeak devices` to list microphones.
//! Use `clipspeak transcribe <file>` to run a WAV file through the pipeline.

use clap::{Parser, Subcommand};
use clipspeak::audio::AudioBuffer;
use clipspeak::text::{NormalizationRules, Normalizer};
use clipspeak::{config, daemon, transcribe};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clipspeak")]
#[command(author, version, about = "Hotkey dictation to the clipboard")]
#[command(long_about = "
Clipspeak is a dictation assistant. Press a configured key combo, speak a
phrase, and the transcript lands on your clipboard with a confirmation cue.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Bind key combos in ~/.config/clipspeak/config.toml ([languages])
  4. Run: clipspeak

Transcription runs locally (build with --features whisper and set `model`)
or through a remote relay (`server` in the config).
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Override the microphone (device-name substring, or "list")
    #[arg(long, value_name = "NAME")]
    microphone: Option<String>,

    /// Override the remote relay endpoint
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Override the starting language
    #[arg(long, value_name = "CODE")]
    language: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Run an audio file through dispatch and normalization (WAV, 16kHz)
    Transcribe {
        /// Path to audio file
        file: PathBuf,
    },

    /// List audio input devices
    Devices,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("clipspeak={log_level},warn"))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(microphone) = cli.microphone {
        config.default_microphone = microphone;
    }
    if let Some(server) = cli.server {
        config.server = Some(server);
    }
    if let Some(language) = cli.language {
        config.default_language = language;
    }

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            // "list" prints the device names instead of starting anything
            if config.default_microphone == "list" {
                list_devices()?;
                return Ok(());
            }

            let mut daemon = daemon::Daemon::new(config)?;
            daemon.run().await?;
        }

        Commands::Transcribe { file } => {
            transcribe_file(&config, &file)?;
        }

        Commands::Devices => {
            list_devices()?;
        }

        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Print available microphone names
fn list_devices() -> anyhow::Result<()> {
    let devices = clipspeak::audio::list_input_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found.");
    } else {
        println!("Available microphone devices are: ");
        for name in devices {
            println!("  {name}");
        }
    }
    Ok(())
}

/// Run a WAV file through dispatch and normalization
fn transcribe_file(config: &config::Config, path: &PathBuf) -> anyhow::Result<()> {
    use hound::WavReader;

    println!("Loading audio file: {path:?}");

    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    println!(
        "Audio format: {} Hz, {} channel(s), {:?}",
        spec.sample_rate, spec.channels, spec.sample_format
    );

    if spec.sample_rate != clipspeak::audio::SAMPLE_RATE {
        anyhow::bail!(
            "expected {} Hz audio, got {} Hz (the pipeline does not resample)",
            clipspeak::audio::SAMPLE_RATE,
            spec.sample_rate
        );
    }

    // Decode to i16 mono
    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let shift = spec.bits_per_sample.saturating_sub(16);
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| (s >> shift) as i16)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect(),
    };

    let mono: Vec<i16> = if spec.channels > 1 {
        samples
            .chunks(spec.channels as usize)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    } else {
        samples
    };

    let audio = AudioBuffer::from_samples(&mono);
    println!("Processing {:.2}s of audio...", audio.duration_secs());

    let dispatcher = transcribe::create_dispatcher(config)?;
    let result = dispatcher.dispatch(&audio, &config.default_language)?;

    let rules = NormalizationRules::from_config(config);
    let normalizer = Normalizer::new(&rules, config.capitalize);
    let outcome = normalizer.normalize(&result.text, &config.default_language);

    println!(
        "[{:.1}s, {:.1}s] <{}> -> <{}>",
        audio.duration_secs(),
        result.total_time.as_secs_f32(),
        result.text,
        outcome.text
    );
    Ok(())
}
