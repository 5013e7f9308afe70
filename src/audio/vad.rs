//! Voice activity gate.
//!
//! Classifies fixed windows of audio as speech or silence and runs the
//! hysteresis state machine that turns window-level decisions into
//! [`SpeechSegment`]s. While idle, classified-silent windows are written
//! into the pre-roll ring so a segment can be seeded with the audio that
//! preceded its trigger.

use crate::audio::dsp;
use crate::audio::frame::SpeechSegment;
use crate::audio::ring::SampleRing;
use crate::defaults;
use crate::error::Result;
use tracing::debug;

/// Strategy trait for per-window speech classification.
///
/// Implementations return a speech probability in [0, 1] for a fixed-size
/// sample window. Stateful classifiers (recurrent models) carry hidden
/// state across calls and reset it at utterance boundaries.
pub trait SpeechClassifier: Send {
    /// Classify one window of samples.
    fn classify(&mut self, window: &[f32]) -> Result<f32>;

    /// Clear any state carried across windows.
    fn reset(&mut self) {}
}

/// RMS-energy heuristic: a clamped linear ramp between two thresholds.
#[derive(Debug, Clone, Copy)]
pub struct EnergyClassifier {
    /// RMS level mapped to probability 0.0.
    pub floor: f32,
    /// RMS level mapped to probability 1.0.
    pub ceiling: f32,
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self {
            floor: defaults::ENERGY_FLOOR,
            ceiling: defaults::ENERGY_CEILING,
        }
    }
}

impl SpeechClassifier for EnergyClassifier {
    fn classify(&mut self, window: &[f32]) -> Result<f32> {
        let level = dsp::rms(window);
        Ok(((level - self.floor) / (self.ceiling - self.floor)).clamp(0.0, 1.0))
    }
}

/// Configuration for the voice gate.
#[derive(Debug, Clone, Copy)]
pub struct VoiceGateConfig {
    /// Probability at or above which a window counts as speech.
    pub speech_threshold: f32,
    /// Continuous non-speech duration (ms) that ends an active segment.
    pub silence_hang_ms: u32,
    /// Minimum speech duration (ms) for a segment to be emitted.
    pub min_speech_ms: u32,
    /// Classifier window size in samples.
    pub window: usize,
    /// Sample rate for duration accounting.
    pub sample_rate: u32,
}

impl Default for VoiceGateConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            silence_hang_ms: defaults::SILENCE_HANG_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            window: defaults::CLASSIFIER_WINDOW,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// Events emitted by the gate as it consumes audio.
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// A speech segment has started (pre-roll already captured).
    SpeechStarted,
    /// A completed segment, emitted after the silence hang expired.
    SegmentReady(SpeechSegment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Silence,
    SpeechActive,
}

/// Hysteresis state machine over window-level speech classification.
pub struct VoiceGate {
    config: VoiceGateConfig,
    /// Optional model-backed classifier; the energy heuristic is used when
    /// it is absent or fails.
    primary: Option<Box<dyn SpeechClassifier>>,
    fallback: EnergyClassifier,
    state: GateState,
    /// Samples not yet forming a full classifier window.
    pending: Vec<f32>,
    /// Accumulated segment samples, pre-roll first.
    segment: Vec<f32>,
    /// Pre-roll samples at the start of `segment`.
    pre_roll_samples: usize,
    /// Consecutive non-speech samples inside an active segment.
    silence_run: usize,
}

impl VoiceGate {
    /// Creates a gate using the energy heuristic only.
    pub fn new(config: VoiceGateConfig) -> Self {
        Self {
            config,
            primary: None,
            fallback: EnergyClassifier::default(),
            state: GateState::Silence,
            pending: Vec::new(),
            segment: Vec::new(),
            pre_roll_samples: 0,
            silence_run: 0,
        }
    }

    /// Creates a gate backed by a model classifier, with the energy
    /// heuristic as fallback.
    pub fn with_classifier(config: VoiceGateConfig, classifier: Box<dyn SpeechClassifier>) -> Self {
        let mut gate = Self::new(config);
        gate.primary = Some(classifier);
        gate
    }

    /// Returns true while a speech segment is being accumulated.
    pub fn is_speech_active(&self) -> bool {
        self.state == GateState::SpeechActive
    }

    /// Classify one window, falling back to the heuristic on failure.
    fn classify_window(&mut self, window: &[f32]) -> f32 {
        if let Some(classifier) = self.primary.as_mut() {
            match classifier.classify(window) {
                Ok(p) if (0.0..=1.0).contains(&p) => return p,
                Ok(p) => debug!(probability = p, "classifier returned out-of-range probability"),
                Err(e) => debug!(error = %e, "classifier failed, using energy heuristic"),
            }
        }
        // The fallback ramp cannot fail.
        self.fallback.classify(window).unwrap_or(0.0)
    }

    /// Consume a chunk of samples, writing idle audio into the pre-roll
    /// ring and returning any state-machine events.
    pub fn push(&mut self, chunk: &[f32], ring: &mut SampleRing) -> Vec<GateEvent> {
        let mut events = Vec::new();

        self.pending.extend_from_slice(chunk);
        let window = self.config.window;

        while self.pending.len() >= window {
            let win: Vec<f32> = self.pending.drain(..window).collect();
            let probability = self.classify_window(&win);
            let is_speech = probability >= self.config.speech_threshold;

            match self.state {
                GateState::Silence => {
                    if is_speech {
                        // Seed the new segment with everything captured
                        // just before the trigger.
                        let pre_roll = ring.snapshot();
                        self.pre_roll_samples = pre_roll.len();
                        self.segment = pre_roll;
                        self.segment.extend_from_slice(&win);
                        self.silence_run = 0;
                        self.state = GateState::SpeechActive;
                        events.push(GateEvent::SpeechStarted);
                    } else {
                        ring.write(&win);
                    }
                }
                GateState::SpeechActive => {
                    self.segment.extend_from_slice(&win);
                    if is_speech {
                        self.silence_run = 0;
                    } else {
                        self.silence_run += win.len();
                        if self.silence_run >= self.hang_samples() {
                            if let Some(event) = self.end_segment(ring) {
                                events.push(event);
                            }
                        }
                    }
                }
            }
        }

        events
    }

    /// Flush an active segment regardless of the silence hang, e.g. when
    /// capture stops mid-speech.
    pub fn flush(&mut self, ring: &mut SampleRing) -> Option<GateEvent> {
        if self.state == GateState::SpeechActive {
            self.end_segment(ring)
        } else {
            None
        }
    }

    /// Resets the gate to idle, discarding any partial segment.
    pub fn reset(&mut self) {
        self.state = GateState::Silence;
        self.pending.clear();
        self.segment.clear();
        self.pre_roll_samples = 0;
        self.silence_run = 0;
        if let Some(classifier) = self.primary.as_mut() {
            classifier.reset();
        }
    }

    fn hang_samples(&self) -> usize {
        defaults::samples_for_ms(self.config.silence_hang_ms, self.config.sample_rate)
    }

    fn min_speech_samples(&self) -> usize {
        defaults::samples_for_ms(self.config.min_speech_ms, self.config.sample_rate)
    }

    fn end_segment(&mut self, ring: &mut SampleRing) -> Option<GateEvent> {
        self.state = GateState::Silence;
        // Speech audio must not leak into the next segment's pre-roll.
        ring.clear();

        let samples = std::mem::take(&mut self.segment);
        let active = samples
            .len()
            .saturating_sub(self.pre_roll_samples + self.silence_run);
        let pre_roll_ms =
            (self.pre_roll_samples as u64 * 1000 / self.config.sample_rate as u64) as u32;

        let too_short = active < self.min_speech_samples();
        self.pre_roll_samples = 0;
        self.silence_run = 0;

        if too_short {
            debug!(
                active_ms = active as u64 * 1000 / self.config.sample_rate as u64,
                "discarding sub-minimum speech segment"
            );
            return None;
        }

        Some(GateEvent::SegmentReady(SpeechSegment {
            samples,
            sample_rate: self.config.sample_rate,
            pre_roll_ms,
        }))
    }
}
