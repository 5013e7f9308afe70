//! talktype - push-to-talk dictation for Wayland Linux
//!
//! Real-time voice-to-text: microphone capture with voice-activity
//! gating, streaming recognition with revisable partials, incremental
//! transcript synchronization, and keystroke injection into the focused
//! window.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod input;
pub mod session;
pub mod stt;
pub mod typing;

// Core traits (source → recognize → synchronize → inject)
pub use audio::source::AudioSource;
pub use input::keys::{CommandExecutor, KeystrokeSink};
pub use input::window::{WindowId, WindowSystem};
pub use stt::batch::{BatchRecognizer, TranscriptEnhancer};
pub use stt::link::StreamingRecognizer;

// Session orchestration
pub use session::{DictationOrchestrator, DictationState};

// Pipeline pieces
pub use audio::capture::{CaptureConfig, CapturePipeline};
pub use input::injector::{InjectorConfig, RealTimeInjector};
pub use stt::events::{RecognitionEvent, TranscriptEvent, TranscriptSnapshot};
pub use stt::link::TranscriptionLink;
pub use typing::channel::CommandChannel;
pub use typing::command::TypingCommand;
pub use typing::synchronizer::TranscriptSynchronizer;

// Error handling
pub use error::{Result, TalktypeError};

// Config
pub use config::Config;

/// Build version string from the crate version.
pub fn version_string() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
