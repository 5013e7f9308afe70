//! Streaming transcription link.
//!
//! Bridges the live chunk stream to a remote streaming recognition
//! session and republishes its partial/final results as
//! [`TranscriptEvent`]s. Chunk forwarding and event republishing run in
//! one task so ordering stays auditable.

use crate::audio::dsp;
use crate::audio::frame::AudioChunk;
use crate::defaults;
use crate::error::Result;
use crate::stt::events::{RecognitionEvent, TranscriptEvent};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A streaming speech recognition session.
///
/// The wire framing is provider-specific; implementations receive 16-bit
/// PCM mono at the rate they negotiated and emit [`RecognitionEvent`]s on
/// the receiver returned from `connect`.
#[async_trait]
pub trait StreamingRecognizer: Send {
    /// Open the session. Must complete before any audio is sent.
    async fn connect(&mut self) -> Result<mpsc::Receiver<RecognitionEvent>>;

    /// Forward one chunk of 16-bit PCM mono audio.
    async fn send_audio(&mut self, pcm: &[i16]) -> Result<()>;

    /// Request the final transcript for audio sent so far.
    async fn finalize(&mut self) -> Result<()>;

    /// Tear the session down.
    async fn disconnect(&mut self) -> Result<()>;

    /// Sample rate negotiated at connect time.
    fn sample_rate(&self) -> u32 {
        defaults::SAMPLE_RATE
    }
}

/// Bridges an audio chunk stream to a [`StreamingRecognizer`].
pub struct TranscriptionLink<R: StreamingRecognizer> {
    recognizer: R,
    events: Option<mpsc::Receiver<RecognitionEvent>>,
    grace: Duration,
}

impl<R: StreamingRecognizer> TranscriptionLink<R> {
    pub fn new(recognizer: R) -> Self {
        Self {
            recognizer,
            events: None,
            grace: Duration::from_millis(defaults::FINALIZE_GRACE_MS),
        }
    }

    /// Overrides the grace period waited for in-flight transcripts after
    /// finalize.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Opens the recognition session.
    ///
    /// Callers start audio capture only after this returns, so no chunk is
    /// emitted before the session exists.
    pub async fn connect(&mut self) -> Result<()> {
        self.events = Some(self.recognizer.connect().await?);
        Ok(())
    }

    /// Runs the link until the chunk stream ends or the session fails.
    ///
    /// On chunk-stream end: requests finalize, drains in-flight events for
    /// the grace period, then disconnects.
    pub async fn run(
        mut self,
        mut chunks: mpsc::Receiver<AudioChunk>,
        output: mpsc::Sender<TranscriptEvent>,
    ) {
        let mut events = match self.events.take() {
            Some(events) => events,
            None => match self.recognizer.connect().await {
                Ok(events) => events,
                Err(e) => {
                    let _ = output
                        .send(TranscriptEvent::RecognitionError {
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            },
        };

        let target_rate = self.recognizer.sample_rate();
        let mut ended = false;

        // Phase 1: forward chunks while republishing events.
        loop {
            tokio::select! {
                maybe_chunk = chunks.recv() => match maybe_chunk {
                    Some(chunk) => {
                        let samples = if chunk.sample_rate != target_rate {
                            dsp::resample(&chunk.samples, chunk.sample_rate, target_rate)
                        } else {
                            chunk.samples
                        };
                        let pcm = dsp::to_i16_pcm(&samples);
                        if let Err(e) = self.recognizer.send_audio(&pcm).await {
                            warn!(error = %e, "failed to forward audio to recognizer");
                            let _ = output
                                .send(TranscriptEvent::RecognitionError {
                                    message: e.to_string(),
                                })
                                .await;
                            ended = true;
                            break;
                        }
                    }
                    // Capture stopped; move on to finalize.
                    None => break,
                },
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        let failed = matches!(event, RecognitionEvent::Error { .. });
                        if output.send(event.into()).await.is_err() || failed {
                            ended = true;
                            break;
                        }
                    }
                    None => {
                        // Provider closed the session on its own.
                        ended = true;
                        break;
                    }
                }
            }
        }

        // Phase 2: request the final transcript and give in-flight events
        // a bounded window to arrive.
        if !ended {
            match self.recognizer.finalize().await {
                Ok(()) => loop {
                    match tokio::time::timeout(self.grace, events.recv()).await {
                        Ok(Some(event)) => {
                            let done = matches!(
                                event,
                                RecognitionEvent::Final { .. } | RecognitionEvent::Error { .. }
                            );
                            if output.send(event.into()).await.is_err() || done {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(_) => {
                            debug!("no final transcript within grace period");
                            break;
                        }
                    }
                },
                Err(e) => {
                    let _ = output
                        .send(TranscriptEvent::RecognitionError {
                            message: e.to_string(),
                        })
                        .await;
                }
            }
        }

        let _ = self.recognizer.disconnect().await;
    }
}

/// When a scripted event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// After this many chunks of audio have been received.
    AfterChunks(usize),
    /// When finalize is requested.
    OnFinalize,
}

/// Scripted recognizer for tests.
///
/// Emits configured events as audio arrives or on finalize, and records
/// the PCM chunk sizes it was sent.
pub struct MockRecognizer {
    script: Vec<(Trigger, RecognitionEvent)>,
    tx: Option<mpsc::Sender<RecognitionEvent>>,
    chunks_seen: usize,
    fail_connect: bool,
    fail_send: bool,
    sample_rate: u32,
    sent_sizes: std::sync::Arc<std::sync::Mutex<Vec<usize>>>,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            tx: None,
            chunks_seen: 0,
            fail_connect: false,
            fail_send: false,
            sample_rate: defaults::SAMPLE_RATE,
            sent_sizes: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Emit a partial transcript once `chunks` chunks have arrived.
    pub fn partial_after(mut self, chunks: usize, text: &str) -> Self {
        self.script.push((
            Trigger::AfterChunks(chunks),
            RecognitionEvent::Partial {
                text: text.to_string(),
                offset_ms: 0,
            },
        ));
        self
    }

    /// Emit a provider error once `chunks` chunks have arrived.
    pub fn error_after(mut self, chunks: usize, message: &str) -> Self {
        self.script.push((
            Trigger::AfterChunks(chunks),
            RecognitionEvent::Error {
                message: message.to_string(),
            },
        ));
        self
    }

    /// Emit a final transcript when finalize is requested.
    pub fn final_on_finalize(mut self, text: &str, confidence: f32) -> Self {
        self.script.push((
            Trigger::OnFinalize,
            RecognitionEvent::Final {
                text: text.to_string(),
                confidence,
                offset_ms: 0,
                duration_ms: 0,
            },
        ));
        self
    }

    pub fn with_connect_failure(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn with_send_failure(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Shared handle to the recorded per-chunk PCM sizes.
    pub fn sent_sizes(&self) -> std::sync::Arc<std::sync::Mutex<Vec<usize>>> {
        self.sent_sizes.clone()
    }

    async fn fire(&mut self, finalize: bool) {
        let Some(tx) = self.tx.clone() else { return };

        let mut i = 0;
        while i < self.script.len() {
            let due = match self.script[i].0 {
                Trigger::AfterChunks(n) => !finalize && self.chunks_seen >= n,
                Trigger::OnFinalize => finalize,
            };
            if due {
                let (_, event) = self.script.remove(i);
                let _ = tx.send(event).await;
            } else {
                i += 1;
            }
        }
    }
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamingRecognizer for MockRecognizer {
    async fn connect(&mut self) -> Result<mpsc::Receiver<RecognitionEvent>> {
        if self.fail_connect {
            return Err(crate::error::TalktypeError::RecognizerConnection {
                message: "mock connect failure".to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(32);
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn send_audio(&mut self, pcm: &[i16]) -> Result<()> {
        if self.fail_send {
            return Err(crate::error::TalktypeError::Recognition {
                message: "mock send failure".to_string(),
            });
        }
        if let Ok(mut sizes) = self.sent_sizes.lock() {
            sizes.push(pcm.len());
        }
        self.chunks_seen += 1;
        self.fire(false).await;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.fire(true).await;
        // Closing the event channel tells the link the session is done.
        self.tx = None;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
