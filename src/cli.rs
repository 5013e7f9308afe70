//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "talktype",
    about = "Push-to-talk dictation: streaming voice-to-text typed into the focused window",
    version
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available audio input devices
    Devices,

    /// Capture from the microphone and report chunk/segment statistics
    ///
    /// Runs the capture pipeline with the voice gate but no recognizer:
    /// useful for checking device selection and gate thresholds.
    MicCheck {
        /// How long to capture (e.g. "5s", "1m")
        #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
        duration: Duration,

        /// Input device name (default: best available)
        #[arg(long)]
        device: Option<String>,
    },

    /// Print version information
    Version,
}

/// Load configuration honoring the --config flag and environment.
pub fn load_config(cli: &Cli) -> anyhow::Result<crate::config::Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(crate::config::Config::default_path);
    Ok(crate::config::Config::load_or_default(&path)?.with_env_overrides())
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Devices => run_devices(),
        Command::MicCheck { duration, device } => {
            run_mic_check(&cli, *duration, device.clone()).await
        }
        Command::Version => {
            println!("talktype {}", crate::version_string());
            Ok(())
        }
    }
}

#[cfg(feature = "cpal-audio")]
fn run_devices() -> anyhow::Result<()> {
    let devices = crate::audio::device::list_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found.");
    } else {
        for device in devices {
            println!("{}", device);
        }
    }
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn run_devices() -> anyhow::Result<()> {
    anyhow::bail!("built without audio support (enable the cpal-audio feature)")
}

#[cfg(feature = "cpal-audio")]
async fn run_mic_check(
    cli: &Cli,
    duration: Duration,
    device: Option<String>,
) -> anyhow::Result<()> {
    use crate::audio::capture::{CaptureConfig, CapturePipeline};
    use crate::audio::device::CpalAudioSource;
    use crate::audio::dsp;

    let mut config = load_config(cli)?;
    if device.is_some() {
        config.audio.device = device;
    }

    let source = CpalAudioSource::new(config.audio.device.as_deref())?;
    let pipeline = CapturePipeline::new(source, CaptureConfig::from_config(&config));
    let outputs = pipeline.start_streaming()?;

    println!(
        "Capturing for {}... speak to exercise the voice gate.",
        humantime::format_duration(duration)
    );

    let handle = outputs.handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        handle.stop();
    });

    let mut chunks = outputs.chunks;
    let mut segments = outputs.segments;
    let mut chunk_count: u64 = 0;
    let mut peak_level: f32 = 0.0;
    let mut segment_count: u64 = 0;

    loop {
        tokio::select! {
            maybe_chunk = chunks.recv() => match maybe_chunk {
                Some(chunk) => {
                    chunk_count += 1;
                    peak_level = peak_level.max(dsp::rms(&chunk.samples));
                }
                None => break,
            },
            maybe_segment = segments.recv() => if let Some(segment) = maybe_segment {
                segment_count += 1;
                println!(
                    "  segment {}: {}ms speech ({}ms pre-roll)",
                    segment_count,
                    segment.duration_ms(),
                    segment.pre_roll_ms
                );
            },
        }
    }

    if let Some(error) = outputs.handle.take_error() {
        return Err(error.into());
    }

    println!(
        "{} chunks, {} speech segments, peak RMS {:.3}",
        chunk_count, segment_count, peak_level
    );
    if segment_count == 0 {
        println!(
            "No speech detected. If you were speaking, lower vad.speech_threshold \
             (currently {}).",
            config.vad.speech_threshold
        );
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
async fn run_mic_check(
    _cli: &Cli,
    _duration: Duration,
    _device: Option<String>,
) -> anyhow::Result<()> {
    anyhow::bail!("built without audio support (enable the cpal-audio feature)")
}
