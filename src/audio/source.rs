use crate::error::{Result, TalktypeError};
use std::collections::VecDeque;

/// Trait for audio input devices.
///
/// Implementations deliver device-native audio already converted to mono
/// f32 at the pipeline's target rate. The trait allows swapping the real
/// device for a scripted mock in tests.
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read whatever samples have accumulated since the last read.
    ///
    /// Never blocks; returns an empty vector when no samples are pending.
    fn read_samples(&mut self) -> Result<Vec<f32>>;

    /// Returns true when the source has a fixed amount of audio and
    /// `read_samples` returning empty means it is exhausted.
    fn is_finite(&self) -> bool {
        false
    }
}

/// Scripted audio source for tests.
///
/// Either replays a fixed queue of buffers (finite) or repeats one buffer
/// forever (infinite), with configurable failure injection.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    repeating: Option<Vec<f32>>,
    queued: VecDeque<Vec<f32>>,
    finite: bool,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Creates a mock that returns silence forever.
    pub fn new() -> Self {
        Self {
            is_started: false,
            repeating: Some(vec![0.0; 160]),
            queued: VecDeque::new(),
            finite: false,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Repeat the given buffer on every read.
    pub fn with_samples(mut self, samples: Vec<f32>) -> Self {
        self.repeating = Some(samples);
        self.queued.clear();
        self.finite = false;
        self
    }

    /// Replay the given buffers in order, then report exhaustion.
    pub fn with_buffers(mut self, buffers: Vec<Vec<f32>>) -> Self {
        self.queued = buffers.into();
        self.repeating = None;
        self.finite = true;
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read.
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started.
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(TalktypeError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<f32>> {
        if self.should_fail_read {
            return Err(TalktypeError::AudioCapture {
                message: self.error_message.clone(),
            });
        }

        if let Some(buffer) = self.queued.pop_front() {
            return Ok(buffer);
        }
        match &self.repeating {
            Some(samples) => Ok(samples.clone()),
            None => Ok(Vec::new()),
        }
    }

    fn is_finite(&self) -> bool {
        self.finite
    }
}
