//! Capture pipeline: pumps an [`AudioSource`] into chunk and segment
//! streams.
//!
//! Two modes:
//! - **streaming** — samples are normalized, run through the voice gate,
//!   and accumulated into fixed-duration [`AudioChunk`]s; the remainder is
//!   flushed as a final short chunk on stop. Gate segments are advisory.
//! - **batch** — every session sample is retained verbatim and returned as
//!   one [`SpeechSegment`] on stop; nothing is transcribed until then.
//!
//! The device callback itself never blocks: it only copies into the
//! source's buffer. The pump thread here drains that buffer, so all gate
//! and chunking work happens off the callback path.

use crate::audio::dsp;
use crate::audio::frame::{AudioChunk, SpeechSegment};
use crate::audio::ring::SampleRing;
use crate::audio::source::AudioSource;
use crate::audio::vad::{GateEvent, VoiceGate, VoiceGateConfig};
use crate::config::Config;
use crate::defaults;
use crate::error::{Result, TalktypeError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Configuration for the capture pipeline.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate in Hz.
    pub sample_rate: u32,
    /// Streaming chunk duration in milliseconds.
    pub chunk_ms: u32,
    /// Pre-roll ring capacity in milliseconds.
    pub pre_roll_ms: u32,
    /// Voice gate configuration.
    pub gate: VoiceGateConfig,
    /// Polling interval when the source has no samples (ms).
    pub poll_interval_ms: u64,
    /// Chunk channel capacity.
    pub channel_buffer_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_ms: defaults::CHUNK_MS,
            pre_roll_ms: defaults::PRE_ROLL_MS,
            gate: VoiceGateConfig::default(),
            poll_interval_ms: 10,
            channel_buffer_size: 64,
        }
    }
}

impl CaptureConfig {
    /// Builds a capture configuration from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            sample_rate: config.audio.sample_rate,
            chunk_ms: config.audio.chunk_ms,
            pre_roll_ms: config.vad.pre_roll_ms,
            gate: VoiceGateConfig {
                speech_threshold: config.vad.speech_threshold,
                silence_hang_ms: config.vad.silence_hang_ms,
                min_speech_ms: config.vad.min_speech_ms,
                sample_rate: config.audio.sample_rate,
                ..VoiceGateConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Handle to a running capture pipeline.
#[derive(Clone)]
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    error: Arc<Mutex<Option<TalktypeError>>>,
}

impl CaptureHandle {
    /// Requests the pump thread to stop; the final short chunk is flushed
    /// before the chunk channel closes.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Returns true while the pump thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Takes the device error that stopped the stream, if any.
    pub fn take_error(&self) -> Option<TalktypeError> {
        self.error.lock().ok().and_then(|mut e| e.take())
    }
}

/// Output channels of a streaming capture session.
pub struct StreamOutputs {
    /// Fixed-cadence audio chunks.
    pub chunks: mpsc::Receiver<AudioChunk>,
    /// Advisory speech segments from the voice gate.
    pub segments: mpsc::Receiver<SpeechSegment>,
    /// Control handle.
    pub handle: CaptureHandle,
}

/// A batch capture session in progress.
pub struct BatchCapture {
    session: Arc<Mutex<Vec<f32>>>,
    handle: CaptureHandle,
    join: JoinHandle<()>,
    sample_rate: u32,
}

impl BatchCapture {
    /// Stops capture and returns the full session as one segment, or
    /// `None` if nothing was captured.
    pub fn stop(self) -> Result<Option<SpeechSegment>> {
        self.handle.stop();
        let _ = self.join.join();

        if let Some(err) = self.handle.take_error() {
            return Err(err);
        }

        let samples = {
            let mut guard = self.session.lock().map_err(|_| TalktypeError::AudioCapture {
                message: "session buffer poisoned".to_string(),
            })?;
            std::mem::take(&mut *guard)
        };

        if samples.is_empty() {
            return Ok(None);
        }

        Ok(Some(SpeechSegment {
            samples,
            sample_rate: self.sample_rate,
            pre_roll_ms: 0,
        }))
    }

    /// Control handle for the running capture.
    pub fn handle(&self) -> &CaptureHandle {
        &self.handle
    }
}

/// Capture pipeline over an audio source.
pub struct CapturePipeline<A: AudioSource + 'static> {
    source: A,
    config: CaptureConfig,
}

impl<A: AudioSource + 'static> CapturePipeline<A> {
    /// Creates a pipeline over the given source.
    pub fn new(source: A, config: CaptureConfig) -> Self {
        Self { source, config }
    }

    /// Starts streaming capture: chunks at fixed cadence plus advisory
    /// gate segments. The pipeline runs until the handle is stopped, the
    /// source is exhausted (finite sources), or a device error occurs.
    pub fn start_streaming(mut self) -> Result<StreamOutputs> {
        // Device start must complete before any state is observable.
        self.source.start()?;

        let (chunk_tx, chunk_rx) = mpsc::channel(self.config.channel_buffer_size);
        let (segment_tx, segment_rx) = mpsc::channel(8);

        let running = Arc::new(AtomicBool::new(true));
        let error = Arc::new(Mutex::new(None));
        let handle = CaptureHandle {
            running: running.clone(),
            error: error.clone(),
        };

        let config = self.config.clone();
        let mut source = self.source;
        let thread_handle = handle.clone();

        thread::spawn(move || {
            let chunk_samples =
                defaults::samples_for_ms(config.chunk_ms, config.sample_rate).max(1);
            let mut gate = VoiceGate::new(config.gate);
            let mut ring = SampleRing::new(defaults::samples_for_ms(
                config.pre_roll_ms,
                config.sample_rate,
            ));
            let mut chunk_buf: Vec<f32> = Vec::with_capacity(chunk_samples * 2);
            let mut sequence: u64 = 0;
            let poll = Duration::from_millis(config.poll_interval_ms);

            'pump: while running.load(Ordering::SeqCst) {
                match source.read_samples() {
                    Ok(samples) if !samples.is_empty() => {
                        let mut samples = samples;
                        dsp::peak_normalize(
                            &mut samples,
                            defaults::NORMALIZE_TARGET_PEAK,
                            defaults::NORMALIZE_SILENCE_FLOOR,
                        );

                        for event in gate.push(&samples, &mut ring) {
                            match event {
                                GateEvent::SpeechStarted => debug!("speech started"),
                                GateEvent::SegmentReady(segment) => {
                                    debug!(
                                        duration_ms = segment.duration_ms(),
                                        "segment ready"
                                    );
                                    // Advisory in streaming mode; a slow or
                                    // absent consumer must not stall capture.
                                    let _ = segment_tx.try_send(segment);
                                }
                            }
                        }

                        chunk_buf.extend_from_slice(&samples);
                        while chunk_buf.len() >= chunk_samples {
                            let chunk_data: Vec<f32> =
                                chunk_buf.drain(..chunk_samples).collect();
                            let chunk =
                                AudioChunk::new(sequence, chunk_data, config.sample_rate);
                            sequence += 1;
                            if chunk_tx.blocking_send(chunk).is_err() {
                                break 'pump;
                            }
                        }
                    }
                    Ok(_) => {
                        if source.is_finite() {
                            break;
                        }
                        thread::sleep(poll);
                    }
                    Err(e) => {
                        error!(error = %e, "audio capture error, stopping stream");
                        if let Ok(mut guard) = thread_handle.error.lock() {
                            *guard = Some(e);
                        }
                        break;
                    }
                }
            }

            // Flush the remainder as a final short chunk.
            if !chunk_buf.is_empty() {
                let chunk = AudioChunk::new(sequence, chunk_buf, config.sample_rate);
                let _ = chunk_tx.blocking_send(chunk);
            }

            // A segment cut off by stop is still worth reporting.
            if let Some(GateEvent::SegmentReady(segment)) = gate.flush(&mut ring) {
                let _ = segment_tx.try_send(segment);
            }

            running.store(false, Ordering::SeqCst);
            let _ = source.stop();
            info!(chunks = sequence, "capture stream stopped");
        });

        Ok(StreamOutputs {
            chunks: chunk_rx,
            segments: segment_rx,
            handle,
        })
    }

    /// Starts batch capture: all samples retained until [`BatchCapture::stop`].
    pub fn start_capture(mut self) -> Result<BatchCapture> {
        self.source.start()?;

        let session = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));
        let error = Arc::new(Mutex::new(None));
        let handle = CaptureHandle {
            running: running.clone(),
            error: error.clone(),
        };

        let config = self.config.clone();
        let mut source = self.source;
        let session_writer = session.clone();
        let thread_handle = handle.clone();

        let join = thread::spawn(move || {
            let poll = Duration::from_millis(config.poll_interval_ms);

            while running.load(Ordering::SeqCst) {
                match source.read_samples() {
                    Ok(samples) if !samples.is_empty() => {
                        let mut samples = samples;
                        dsp::peak_normalize(
                            &mut samples,
                            defaults::NORMALIZE_TARGET_PEAK,
                            defaults::NORMALIZE_SILENCE_FLOOR,
                        );
                        if let Ok(mut buf) = session_writer.lock() {
                            buf.extend_from_slice(&samples);
                        }
                    }
                    Ok(_) => {
                        if source.is_finite() {
                            break;
                        }
                        thread::sleep(poll);
                    }
                    Err(e) => {
                        error!(error = %e, "audio capture error, stopping recording");
                        if let Ok(mut guard) = thread_handle.error.lock() {
                            *guard = Some(e);
                        }
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            let _ = source.stop();
        });

        Ok(BatchCapture {
            session,
            handle,
            join,
            sample_rate: self.config.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MockAudioSource;

    fn drain_chunks(mut rx: mpsc::Receiver<AudioChunk>) -> Vec<AudioChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.blocking_recv() {
            chunks.push(chunk);
        }
        chunks
    }

    #[test]
    fn test_streaming_emits_fixed_chunks() {
        // 3.5 chunks of audio: 3 full + 1 short final flush.
        let source = MockAudioSource::new().with_buffers(vec![vec![0.01; 5600]]);
        let pipeline = CapturePipeline::new(source, CaptureConfig::default());

        let outputs = pipeline.start_streaming().unwrap();
        let chunks = drain_chunks(outputs.chunks);

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].samples.len(), 1600);
        assert_eq!(chunks[2].samples.len(), 1600);
        assert_eq!(chunks[3].samples.len(), 800);

        // Sequence numbers are consecutive from zero.
        let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_streaming_silence_yields_chunks_but_no_segments() {
        // 12 seconds of silence in 100ms buffers.
        let buffers: Vec<Vec<f32>> = (0..120).map(|_| vec![0.0; 1600]).collect();
        let source = MockAudioSource::new().with_buffers(buffers);
        let pipeline = CapturePipeline::new(source, CaptureConfig::default());

        let outputs = pipeline.start_streaming().unwrap();
        let chunks = drain_chunks(outputs.chunks);

        assert_eq!(chunks.len(), 120);

        let mut segments = outputs.segments;
        assert!(segments.try_recv().is_err(), "silence must produce no segments");
    }

    #[test]
    fn test_streaming_device_error_surfaces_on_handle() {
        let source = MockAudioSource::new()
            .with_read_failure()
            .with_error_message("mic unplugged");
        let pipeline = CapturePipeline::new(source, CaptureConfig::default());

        let outputs = pipeline.start_streaming().unwrap();
        let chunks = drain_chunks(outputs.chunks);
        assert!(chunks.is_empty());

        match outputs.handle.take_error() {
            Some(TalktypeError::AudioCapture { message }) => {
                assert_eq!(message, "mic unplugged");
            }
            other => panic!("expected AudioCapture error, got {:?}", other),
        }
    }

    #[test]
    fn test_streaming_start_failure_is_clean() {
        let source = MockAudioSource::new().with_start_failure();
        let pipeline = CapturePipeline::new(source, CaptureConfig::default());

        assert!(pipeline.start_streaming().is_err());
    }

    #[test]
    fn test_batch_returns_all_samples_verbatim() {
        let source = MockAudioSource::new()
            .with_buffers(vec![vec![0.25; 1600], vec![0.25; 1600], vec![0.25; 800]]);
        let pipeline = CapturePipeline::new(source, CaptureConfig::default());

        let capture = pipeline.start_capture().unwrap();
        // Wait for the finite source to drain.
        while capture.handle().is_running() {
            std::thread::sleep(Duration::from_millis(5));
        }

        let segment = capture.stop().unwrap().expect("segment expected");
        assert_eq!(segment.samples.len(), 4000);
        assert_eq!(segment.sample_rate, 16000);
        assert_eq!(segment.pre_roll_ms, 0);
    }

    #[test]
    fn test_batch_empty_session_returns_none() {
        let source = MockAudioSource::new().with_buffers(vec![]);
        let pipeline = CapturePipeline::new(source, CaptureConfig::default());

        let capture = pipeline.start_capture().unwrap();
        while capture.handle().is_running() {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(capture.stop().unwrap().is_none());
    }

    #[test]
    fn test_handle_stop_ends_stream() {
        let source = MockAudioSource::new().with_samples(vec![0.0; 1600]);
        let pipeline = CapturePipeline::new(source, CaptureConfig::default());

        let outputs = pipeline.start_streaming().unwrap();
        assert!(outputs.handle.is_running());

        outputs.handle.stop();

        // Channel closes once the pump exits.
        let chunks = drain_chunks(outputs.chunks);
        assert!(!outputs.handle.is_running());
        // The infinite source produced some chunks before stop; no
        // particular count is guaranteed.
        drop(chunks);
    }
}
