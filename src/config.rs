use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub typing: TypingConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub chunk_ms: u32,
}

/// Voice activity gate configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadConfig {
    pub speech_threshold: f32,
    pub pre_roll_ms: u32,
    pub silence_hang_ms: u32,
    pub min_speech_ms: u32,
}

/// Keystroke injection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TypingConfig {
    pub inter_command_delay_ms: u64,
    pub backspace_delay_ms: u64,
    pub tail_tolerance_chars: usize,
    pub focus_retries: u32,
    pub focus_retry_delay_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            chunk_ms: defaults::CHUNK_MS,
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            pre_roll_ms: defaults::PRE_ROLL_MS,
            silence_hang_ms: defaults::SILENCE_HANG_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
        }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            inter_command_delay_ms: defaults::INTER_COMMAND_DELAY_MS,
            backspace_delay_ms: defaults::BACKSPACE_DELAY_MS,
            tail_tolerance_chars: defaults::TAIL_TOLERANCE_CHARS,
            focus_retries: defaults::FOCUS_RETRIES,
            focus_retry_delay_ms: defaults::FOCUS_RETRY_DELAY_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TALKTYPE_AUDIO_DEVICE → audio.device
    /// - TALKTYPE_SPEECH_THRESHOLD → vad.speech_threshold
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("TALKTYPE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(threshold) = std::env::var("TALKTYPE_SPEECH_THRESHOLD")
            && let Ok(value) = threshold.parse::<f32>()
        {
            self.vad.speech_threshold = value;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/talktype/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("talktype")
            .join("config.toml")
    }
}
