//! Error types for talktype.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TalktypeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors (fatal to the session, no automatic recovery)
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Streaming/batch recognition errors (session-level; typed text is left as-is)
    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    #[error("Recognizer connection failed: {message}")]
    RecognizerConnection { message: String },

    // Keystroke injection errors
    #[error("Injection tool not found: {tool}")]
    InjectionToolNotFound { tool: String },

    #[error("Injection permission denied: {message}")]
    InjectionPermissionDenied { message: String },

    #[error("Keystroke injection failed: {message}")]
    InjectionFailed { message: String },

    #[error("Focus lost: could not bring window {window} to the foreground")]
    FocusLost { window: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TalktypeError>;

impl TalktypeError {
    /// Returns true if this error ends the dictation session (device or
    /// recognizer failures), as opposed to errors recovered locally by the
    /// injector (partial delivery, focus loss).
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            TalktypeError::AudioDeviceNotFound { .. }
                | TalktypeError::AudioCapture { .. }
                | TalktypeError::Recognition { .. }
                | TalktypeError::RecognizerConnection { .. }
        )
    }
}
