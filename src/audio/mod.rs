//! Audio capture: device input, DSP conversion, pre-roll ring buffer and
//! voice-activity gating.

pub mod capture;
#[cfg(feature = "cpal-audio")]
pub mod device;
pub mod dsp;
pub mod frame;
pub mod ring;
pub mod source;
pub mod vad;

pub use capture::{BatchCapture, CaptureConfig, CaptureHandle, CapturePipeline, StreamOutputs};
#[cfg(feature = "cpal-audio")]
pub use device::{CpalAudioSource, list_devices};
pub use frame::{AudioChunk, SpeechSegment};
pub use ring::SampleRing;
pub use source::{AudioSource, MockAudioSource};
pub use vad::{EnergyClassifier, GateEvent, SpeechClassifier, VoiceGate, VoiceGateConfig};
