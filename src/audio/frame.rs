//! Data types flowing out of the capture pipeline.

use crate::audio::dsp;
use crate::error::{Result, TalktypeError};
use std::time::Instant;

/// One fixed-cadence chunk of normalized mono audio.
///
/// Produced in streaming mode, consumed once by the transcription link.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Sequence number for ordering chunks.
    pub sequence: u64,
    /// Normalized samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Timestamp when the chunk was assembled.
    pub captured_at: Instant,
}

impl AudioChunk {
    /// Creates a new chunk stamped with the current time.
    pub fn new(sequence: u64, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            sequence,
            samples,
            sample_rate,
            captured_at: Instant::now(),
        }
    }

    /// Duration of this chunk in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        (self.samples.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }
}

/// A contiguous run of speech, including pre-roll audio from before the
/// gate triggered.
#[derive(Debug, Clone)]
pub struct SpeechSegment {
    /// Normalized samples in [-1, 1], pre-roll first.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Milliseconds of pre-roll at the start of `samples`.
    pub pre_roll_ms: u32,
}

impl SpeechSegment {
    /// Duration of this segment in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        (self.samples.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }

    /// Encode the segment as a 16-bit PCM mono WAV file in memory.
    ///
    /// This is the shape the batch recognizer boundary accepts.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(|e| {
                TalktypeError::AudioCapture {
                    message: format!("Failed to create WAV writer: {}", e),
                }
            })?;
            for sample in dsp::to_i16_pcm(&self.samples) {
                writer
                    .write_sample(sample)
                    .map_err(|e| TalktypeError::AudioCapture {
                        message: format!("Failed to write WAV sample: {}", e),
                    })?;
            }
            writer.finalize().map_err(|e| TalktypeError::AudioCapture {
                message: format!("Failed to finalize WAV: {}", e),
            })?;
        }

        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_chunk_duration() {
        let chunk = AudioChunk::new(0, vec![0.0; 1600], 16000);
        assert_eq!(chunk.duration_ms(), 100);
    }

    #[test]
    fn test_audio_chunk_sequence() {
        let chunk = AudioChunk::new(42, vec![0.0; 16], 16000);
        assert_eq!(chunk.sequence, 42);
    }

    #[test]
    fn test_speech_segment_duration() {
        let segment = SpeechSegment {
            samples: vec![0.0; 8000],
            sample_rate: 16000,
            pre_roll_ms: 400,
        };
        assert_eq!(segment.duration_ms(), 500);
    }

    #[test]
    fn test_segment_wav_roundtrip() {
        let segment = SpeechSegment {
            samples: vec![0.0, 0.5, -0.5, 1.0],
            sample_rate: 16000,
            pre_roll_ms: 0,
        };

        let bytes = segment.to_wav_bytes().unwrap();
        let mut reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();

        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[3], i16::MAX);
    }
}
