//! Default configuration constants for talktype.
//!
//! Shared constants used across configuration types to keep the audio,
//! recognition and injection layers in agreement.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard rate for speech recognition and what streaming
/// providers negotiate by default.
pub const SAMPLE_RATE: u32 = 16_000;

/// Duration of one streaming audio chunk in milliseconds.
///
/// 100ms keeps end-to-end latency low while staying well above the
/// per-message overhead of streaming recognition sessions.
pub const CHUNK_MS: u32 = 100;

/// Pre-roll duration in milliseconds.
///
/// Silence samples kept in the ring buffer while idle and prepended when
/// speech starts. Captures soft onsets (plosives, fricatives) that occur
/// before energy crosses the gate threshold.
pub const PRE_ROLL_MS: u32 = 400;

/// Continuous non-speech duration in milliseconds before an active speech
/// segment is considered ended.
///
/// 500ms rides out normal inter-word pauses without cutting segments short.
pub const SILENCE_HANG_MS: u32 = 500;

/// Minimum speech duration in milliseconds for a segment to be emitted.
///
/// Runs shorter than this are treated as noise blips and discarded.
pub const MIN_SPEECH_MS: u32 = 300;

/// Speech probability threshold for the voice gate.
pub const SPEECH_THRESHOLD: f32 = 0.45;

/// RMS level at which the energy classifier reports probability 0.0.
pub const ENERGY_FLOOR: f32 = 0.005;

/// RMS level at which the energy classifier reports probability 1.0.
pub const ENERGY_CEILING: f32 = 0.05;

/// Classifier window size in samples.
///
/// Both the energy heuristic and the recurrent classifier operate on fixed
/// 512-sample windows; the recurrent model carries hidden state between them.
pub const CLASSIFIER_WINDOW: usize = 512;

/// Peak level buffers are normalized to when their peak exceeds
/// [`NORMALIZE_SILENCE_FLOOR`].
pub const NORMALIZE_TARGET_PEAK: f32 = 0.9;

/// Peak level below which a buffer is left untouched by normalization.
///
/// Boosting near-silent buffers would amplify noise up to full scale.
pub const NORMALIZE_SILENCE_FLOOR: f32 = 0.01;

/// Characters of already-typed tail still eligible for correction.
///
/// A `Correction` whose deletion range ends further than this from the
/// total typed count is dropped rather than executed.
pub const TAIL_TOLERANCE_CHARS: usize = 2;

/// Delay between executed typing commands in milliseconds.
pub const INTER_COMMAND_DELAY_MS: u64 = 25;

/// Delay between individual backspace keystrokes in milliseconds.
///
/// Compositors coalesce key events delivered back-to-back; a short gap
/// keeps every backspace distinct.
pub const BACKSPACE_DELAY_MS: u64 = 8;

/// Number of focus-recovery attempts before a command is dropped.
pub const FOCUS_RETRIES: u32 = 10;

/// Delay between focus-recovery attempts in milliseconds.
pub const FOCUS_RETRY_DELAY_MS: u64 = 100;

/// Grace period in milliseconds after requesting recognizer finalize,
/// allowing in-flight transcripts to arrive before the injector stops.
pub const FINALIZE_GRACE_MS: u64 = 800;

/// Returns the number of samples covering `ms` milliseconds at `sample_rate`.
pub const fn samples_for_ms(ms: u32, sample_rate: u32) -> usize {
    (ms as usize * sample_rate as usize) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_for_ms_at_default_rate() {
        assert_eq!(samples_for_ms(CHUNK_MS, SAMPLE_RATE), 1600);
        assert_eq!(samples_for_ms(PRE_ROLL_MS, SAMPLE_RATE), 6400);
        assert_eq!(samples_for_ms(1000, SAMPLE_RATE), 16_000);
    }

    #[test]
    fn energy_ramp_is_well_ordered() {
        assert!(ENERGY_FLOOR < ENERGY_CEILING);
        assert!((0.0..=1.0).contains(&SPEECH_THRESHOLD));
    }
}
