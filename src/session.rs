//! Dictation session orchestration.
//!
//! The outer state machine wiring capture, recognition, synchronization
//! and injection together. Session start is multi-step-async: the
//! recognizer session is connected before audio capture starts, so no
//! chunk is emitted into the void. Stop flushes remaining audio, asks the
//! recognizer to finalize, lets in-flight transcripts drain, then stops
//! the injector. Cancel discards queued commands without executing them.

use crate::audio::capture::{BatchCapture, CaptureConfig, CapturePipeline};
use crate::audio::source::AudioSource;
use crate::config::Config;
use crate::error::{Result, TalktypeError};
use crate::input::injector::{InjectorConfig, InjectorHandle, InjectorStats, RealTimeInjector};
use crate::input::keys::KeystrokeSink;
use crate::input::window::{WindowId, WindowSystem};
use crate::stt::batch::{BatchRecognizer, TranscriptEnhancer, enhance_or_passthrough};
use crate::stt::events::TranscriptEvent;
use crate::stt::link::{StreamingRecognizer, TranscriptionLink};
use crate::typing::channel::CommandChannel;
use crate::typing::synchronizer::TranscriptSynchronizer;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Externally observable session state. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictationState {
    /// Created, no session run yet.
    Idle,
    /// Ready to start a session.
    Ready,
    /// Batch recording in progress.
    Recording,
    /// Streaming session in progress (capture + recognition + typing).
    Streaming,
    /// Waiting for the final transcript.
    Transcribing,
    /// Cleaning up the transcript.
    Enhancing,
    /// Draining typing commands.
    Injecting,
    /// A session-fatal failure occurred; awaiting reset.
    Error,
}

/// A streaming session's moving parts.
struct ActiveStream {
    capture: crate::audio::capture::CaptureHandle,
    injector: InjectorHandle,
    link_task: JoinHandle<()>,
    sync_task: JoinHandle<()>,
    segment_task: JoinHandle<()>,
    recognition_failed: Arc<std::sync::atomic::AtomicBool>,
}

/// Outer session state machine for push-to-talk dictation.
pub struct DictationOrchestrator {
    config: Config,
    state_tx: watch::Sender<DictationState>,
    channel: Arc<CommandChannel>,
    stream: Option<ActiveStream>,
    batch: Option<BatchCapture>,
}

impl DictationOrchestrator {
    pub fn new(config: Config) -> Self {
        let (state_tx, _) = watch::channel(DictationState::Idle);
        Self {
            config,
            state_tx,
            channel: Arc::new(CommandChannel::new()),
            stream: None,
            batch: None,
        }
    }

    /// Current session state.
    pub fn state(&self) -> DictationState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<DictationState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: DictationState) {
        debug!(?state, "session state");
        let _ = self.state_tx.send(state);
    }

    /// Clear an `Error` state back to `Ready`.
    pub fn reset(&mut self) {
        self.channel.reset();
        self.set_state(DictationState::Ready);
    }

    /// Start a live dictation session: capture streams chunks into the
    /// recognizer, transcripts are synchronized into typing commands, and
    /// the injector types them into `target`.
    ///
    /// The recognizer connection completes before capture starts; on any
    /// failure nothing is left half-started.
    pub async fn start_streaming_session<A, R>(
        &mut self,
        source: A,
        recognizer: R,
        windows: Box<dyn WindowSystem>,
        sink: Box<dyn KeystrokeSink>,
        target: WindowId,
    ) -> Result<()>
    where
        A: AudioSource + 'static,
        R: StreamingRecognizer + 'static,
    {
        if self.stream.is_some() || self.batch.is_some() {
            return Err(TalktypeError::Other(
                "a session is already active".to_string(),
            ));
        }

        // Step 1: recognition session first.
        let mut link = TranscriptionLink::new(recognizer);
        link.connect().await?;

        // Step 2: audio capture.
        let capture = CapturePipeline::new(source, CaptureConfig::from_config(&self.config));
        let outputs = capture.start_streaming()?;

        // Step 3: injector on a fresh channel.
        self.channel.reset();
        let injector = RealTimeInjector::new(
            InjectorConfig::from_config(&self.config),
            self.channel.clone(),
            windows,
            sink,
        )
        .start(target);

        // Step 4: link task republishing transcripts.
        let (transcript_tx, mut transcript_rx) = mpsc::channel(64);
        let link_task = tokio::spawn(link.run(outputs.chunks, transcript_tx));

        // Step 5: recognition-result context. Runs the synchronizer
        // synchronously and enqueues commands; never blocks on typing.
        let channel = self.channel.clone();
        let state_tx = self.state_tx.clone();
        let recognition_failed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let failed_flag = recognition_failed.clone();
        let sync_task = tokio::spawn(async move {
            let mut synchronizer = TranscriptSynchronizer::new();
            while let Some(event) = transcript_rx.recv().await {
                match event {
                    TranscriptEvent::Snapshot(snapshot) => {
                        let commands = if snapshot.is_final {
                            synchronizer.finalize(&snapshot.text)
                        } else {
                            synchronizer.push_partial(&snapshot.text)
                        };
                        for command in commands {
                            channel.enqueue(command);
                        }
                    }
                    TranscriptEvent::RecognitionError { message } => {
                        // Typed text stays as-is; the session surfaces the
                        // failure and waits for stop/reset.
                        error!(%message, "recognition failed");
                        failed_flag.store(true, std::sync::atomic::Ordering::SeqCst);
                        let _ = state_tx.send(DictationState::Error);
                    }
                }
            }
        });

        // Gate segments are advisory while streaming; log and move on.
        let mut segments = outputs.segments;
        let segment_task = tokio::spawn(async move {
            while let Some(segment) = segments.recv().await {
                debug!(
                    duration_ms = segment.duration_ms(),
                    pre_roll_ms = segment.pre_roll_ms,
                    "speech segment (advisory)"
                );
            }
        });

        self.stream = Some(ActiveStream {
            capture: outputs.handle,
            injector,
            link_task,
            sync_task,
            segment_task,
            recognition_failed,
        });
        self.set_state(DictationState::Streaming);
        info!("streaming session started");
        Ok(())
    }

    /// Stop the streaming session: flush audio, finalize recognition,
    /// drain typing, return the injector's account of what happened.
    pub async fn stop_streaming_session(&mut self) -> Result<InjectorStats> {
        let active = self.stream.take().ok_or_else(|| {
            TalktypeError::Other("no streaming session active".to_string())
        })?;

        if self.state() != DictationState::Error {
            self.set_state(DictationState::Transcribing);
        }

        // Stopping capture flushes the final short chunk and closes the
        // chunk channel; the link then finalizes and drains in-flight
        // transcripts within its grace period.
        active.capture.stop();
        let _ = active.link_task.await;
        let _ = active.sync_task.await;
        let _ = active.segment_task.await;

        if let Some(device_error) = active.capture.take_error() {
            self.channel.clear();
            self.channel.complete();
            active.injector.stop();
            let _ = active.injector.join().await;
            self.set_state(DictationState::Error);
            return Err(device_error);
        }

        // The sync task has finished by now, so the flag is settled.
        let recognition_failed = active
            .recognition_failed
            .load(std::sync::atomic::Ordering::SeqCst);

        if !recognition_failed {
            self.set_state(DictationState::Injecting);
        }
        self.channel.complete();
        let stats = active.injector.join().await;

        if recognition_failed {
            self.set_state(DictationState::Error);
        } else {
            self.set_state(DictationState::Ready);
        }

        info!(typed = %stats.typed_text, "streaming session stopped");
        Ok(stats)
    }

    /// Abort the session: stop chunk emission, discard queued commands,
    /// and exit the injector promptly. Nothing queued is typed.
    pub async fn cancel_session(&mut self) {
        if let Some(active) = self.stream.take() {
            active.capture.stop();
            self.channel.clear();
            self.channel.complete();
            active.injector.stop();
            let _ = active.injector.join().await;
            active.link_task.abort();
            active.sync_task.abort();
            active.segment_task.abort();
            info!("streaming session cancelled");
        }

        if let Some(batch) = self.batch.take() {
            batch.handle().stop();
            let _ = batch.stop();
            info!("batch recording cancelled");
        }

        self.channel.reset();
        self.set_state(DictationState::Ready);
    }

    /// Start a batch recording session; samples are retained until stop.
    pub fn start_batch_session<A>(&mut self, source: A) -> Result<()>
    where
        A: AudioSource + 'static,
    {
        if self.stream.is_some() || self.batch.is_some() {
            return Err(TalktypeError::Other(
                "a session is already active".to_string(),
            ));
        }

        let capture = CapturePipeline::new(source, CaptureConfig::from_config(&self.config));
        self.batch = Some(capture.start_capture()?);
        self.set_state(DictationState::Recording);
        Ok(())
    }

    /// Stop batch recording, transcribe the clip, optionally enhance it,
    /// and type the result into `target`. Returns the typed text.
    pub async fn stop_batch_session(
        &mut self,
        recognizer: &dyn BatchRecognizer,
        enhancer: Option<&dyn TranscriptEnhancer>,
        windows: Box<dyn WindowSystem>,
        sink: Box<dyn KeystrokeSink>,
        target: WindowId,
    ) -> Result<String> {
        let batch = self.batch.take().ok_or_else(|| {
            TalktypeError::Other("no batch session active".to_string())
        })?;

        self.set_state(DictationState::Transcribing);
        let segment = match batch.stop() {
            Ok(Some(segment)) => segment,
            Ok(None) => {
                self.set_state(DictationState::Ready);
                return Ok(String::new());
            }
            Err(e) => {
                self.set_state(DictationState::Error);
                return Err(e);
            }
        };

        let wav = segment.to_wav_bytes()?;
        let transcript = match recognizer.transcribe(&wav).await {
            Ok(transcript) => transcript,
            Err(e) => {
                self.set_state(DictationState::Error);
                return Err(e);
            }
        };

        let text = match enhancer {
            Some(enhancer) => {
                self.set_state(DictationState::Enhancing);
                enhance_or_passthrough(enhancer, &transcript.text).await
            }
            None => transcript.text,
        };

        // Inject through the same synchronizer/channel/injector path as
        // streaming, as one final transcript.
        self.set_state(DictationState::Injecting);
        self.channel.reset();
        let injector = RealTimeInjector::new(
            InjectorConfig::from_config(&self.config),
            self.channel.clone(),
            windows,
            sink,
        )
        .start(target);

        let mut synchronizer = TranscriptSynchronizer::new();
        for command in synchronizer.finalize(&text) {
            self.channel.enqueue(command);
        }
        self.channel.complete();
        let stats = injector.join().await;

        self.set_state(DictationState::Ready);
        Ok(stats.typed_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MockAudioSource;
    use crate::input::keys::MockKeystrokeSink;
    use crate::input::window::MockWindowSystem;
    use crate::stt::batch::{MockBatchRecognizer, MockEnhancer};
    use crate::stt::link::MockRecognizer;
    use crate::typing::TypingCommand;

    fn target() -> WindowId {
        WindowId("42".to_string())
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.typing.inter_command_delay_ms = 1;
        config.typing.backspace_delay_ms = 1;
        config.typing.focus_retry_delay_ms = 1;
        config
    }

    fn speech_buffers(count: usize) -> Vec<Vec<f32>> {
        (0..count).map(|_| vec![0.1; 1600]).collect()
    }

    #[tokio::test]
    async fn test_streaming_session_types_final_transcript() {
        let mut orchestrator = DictationOrchestrator::new(fast_config());
        assert_eq!(orchestrator.state(), DictationState::Idle);

        let source = MockAudioSource::new().with_buffers(speech_buffers(10));
        let recognizer = MockRecognizer::new()
            .partial_after(2, "he")
            .partial_after(4, "hello")
            .partial_after(8, "hello world")
            .final_on_finalize("hello world", 0.97);
        let windows = MockWindowSystem::new().with_foreground(target());
        let sink = MockKeystrokeSink::new();

        orchestrator
            .start_streaming_session(
                source,
                recognizer,
                Box::new(windows),
                Box::new(sink.clone()),
                target(),
            )
            .await
            .unwrap();
        assert_eq!(orchestrator.state(), DictationState::Streaming);

        // The finite source drains on its own; give the pipeline a moment
        // before stopping the session.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let stats = orchestrator.stop_streaming_session().await.unwrap();

        assert_eq!(stats.typed_text, "hello world");
        assert_eq!(sink.screen_text(), "hello world");
        assert_eq!(orchestrator.state(), DictationState::Ready);
    }

    #[tokio::test]
    async fn test_streaming_session_connect_failure_leaves_ready() {
        let mut orchestrator = DictationOrchestrator::new(fast_config());
        orchestrator.reset();

        let source = MockAudioSource::new().with_buffers(vec![]);
        let recognizer = MockRecognizer::new().with_connect_failure();
        let windows = MockWindowSystem::new().with_foreground(target());
        let sink = MockKeystrokeSink::new();

        let result = orchestrator
            .start_streaming_session(
                source,
                recognizer,
                Box::new(windows),
                Box::new(sink),
                target(),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(orchestrator.state(), DictationState::Ready);
    }

    #[tokio::test]
    async fn test_recognition_error_surfaces_as_error_state() {
        let mut orchestrator = DictationOrchestrator::new(fast_config());

        let source = MockAudioSource::new().with_buffers(speech_buffers(6));
        let recognizer = MockRecognizer::new()
            .partial_after(1, "hello")
            .error_after(3, "provider exploded");
        let windows = MockWindowSystem::new().with_foreground(target());
        let sink = MockKeystrokeSink::new();

        orchestrator
            .start_streaming_session(
                source,
                recognizer,
                Box::new(windows),
                Box::new(sink.clone()),
                target(),
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let stats = orchestrator.stop_streaming_session().await.unwrap();

        // Already-typed text is left as-is; the error state is visible
        // until reset.
        assert_eq!(stats.typed_text, "hello");
        assert_eq!(orchestrator.state(), DictationState::Error);

        orchestrator.reset();
        assert_eq!(orchestrator.state(), DictationState::Ready);
    }

    #[tokio::test]
    async fn test_cancel_discards_queued_commands() {
        // An injector throttled hard enough that commands stay queued
        // when cancel arrives.
        let mut config = fast_config();
        config.typing.inter_command_delay_ms = 250;
        let mut orchestrator = DictationOrchestrator::new(config);

        let source = MockAudioSource::new().with_samples(vec![0.1; 1600]);
        let recognizer = MockRecognizer::new()
            .partial_after(1, "one two three four five six seven eight");
        let windows = MockWindowSystem::new().with_foreground(target());
        let sink = MockKeystrokeSink::new();

        orchestrator
            .start_streaming_session(
                source,
                recognizer,
                Box::new(windows),
                Box::new(sink.clone()),
                target(),
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        orchestrator.cancel_session().await;

        // Only the command in flight before cancel can have been typed.
        let typed_words = sink.screen_text().split_whitespace().count();
        assert!(
            typed_words < 8,
            "cancel must not drain the queue (typed {} words)",
            typed_words
        );
        assert_eq!(orchestrator.state(), DictationState::Ready);
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let mut orchestrator = DictationOrchestrator::new(fast_config());

        let windows = MockWindowSystem::new().with_foreground(target());
        orchestrator
            .start_streaming_session(
                MockAudioSource::new().with_samples(vec![0.0; 1600]),
                MockRecognizer::new(),
                Box::new(windows.clone()),
                Box::new(MockKeystrokeSink::new()),
                target(),
            )
            .await
            .unwrap();

        let result = orchestrator
            .start_streaming_session(
                MockAudioSource::new(),
                MockRecognizer::new(),
                Box::new(windows),
                Box::new(MockKeystrokeSink::new()),
                target(),
            )
            .await;

        assert!(result.is_err());
        orchestrator.cancel_session().await;
    }

    #[tokio::test]
    async fn test_batch_session_transcribes_enhances_and_types() {
        let mut orchestrator = DictationOrchestrator::new(fast_config());

        let source = MockAudioSource::new().with_buffers(speech_buffers(5));
        orchestrator.start_batch_session(source).unwrap();
        assert_eq!(orchestrator.state(), DictationState::Recording);

        // Let the finite source drain.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let recognizer = MockBatchRecognizer::new("hello world");
        let enhancer = MockEnhancer::new("Hello, world.");
        let windows = MockWindowSystem::new().with_foreground(target());
        let sink = MockKeystrokeSink::new();

        let typed = orchestrator
            .stop_batch_session(
                &recognizer,
                Some(&enhancer),
                Box::new(windows),
                Box::new(sink.clone()),
                target(),
            )
            .await
            .unwrap();

        assert_eq!(typed, "Hello, world.");
        assert_eq!(sink.screen_text(), "Hello, world.");
        assert_eq!(orchestrator.state(), DictationState::Ready);
    }

    #[tokio::test]
    async fn test_batch_enhancer_failure_degrades_to_raw_transcript() {
        let mut orchestrator = DictationOrchestrator::new(fast_config());

        let source = MockAudioSource::new().with_buffers(speech_buffers(5));
        orchestrator.start_batch_session(source).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let recognizer = MockBatchRecognizer::new("hello world");
        let enhancer = MockEnhancer::failing();
        let windows = MockWindowSystem::new().with_foreground(target());
        let sink = MockKeystrokeSink::new();

        let typed = orchestrator
            .stop_batch_session(
                &recognizer,
                Some(&enhancer),
                Box::new(windows),
                Box::new(sink.clone()),
                target(),
            )
            .await
            .unwrap();

        assert_eq!(typed, "hello world");
        assert_eq!(orchestrator.state(), DictationState::Ready);
    }

    #[tokio::test]
    async fn test_batch_recognizer_failure_sets_error_state() {
        let mut orchestrator = DictationOrchestrator::new(fast_config());

        let source = MockAudioSource::new().with_buffers(speech_buffers(5));
        orchestrator.start_batch_session(source).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let recognizer = MockBatchRecognizer::new("ignored").with_failure();
        let windows = MockWindowSystem::new().with_foreground(target());

        let result = orchestrator
            .stop_batch_session(
                &recognizer,
                None,
                Box::new(windows),
                Box::new(MockKeystrokeSink::new()),
                target(),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(orchestrator.state(), DictationState::Error);
    }

    #[tokio::test]
    async fn test_state_transitions_observable() {
        let mut orchestrator = DictationOrchestrator::new(fast_config());
        let mut states = orchestrator.subscribe();

        let source = MockAudioSource::new().with_buffers(speech_buffers(3));
        let recognizer = MockRecognizer::new().final_on_finalize("ok", 0.9);
        let windows = MockWindowSystem::new().with_foreground(target());

        orchestrator
            .start_streaming_session(
                source,
                recognizer,
                Box::new(windows),
                Box::new(MockKeystrokeSink::new()),
                target(),
            )
            .await
            .unwrap();

        assert!(states.changed().await.is_ok());
        assert_eq!(*states.borrow_and_update(), DictationState::Streaming);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        orchestrator.stop_streaming_session().await.unwrap();
        assert_eq!(orchestrator.state(), DictationState::Ready);
    }

    #[tokio::test]
    async fn test_commands_reach_channel_in_order() {
        // The sync path preserves FIFO: snapshot order in, command order out.
        let channel = CommandChannel::new();
        let mut synchronizer = TranscriptSynchronizer::new();

        for command in synchronizer.push_partial("a b c") {
            channel.enqueue(command);
        }
        channel.complete();

        let mut words = Vec::new();
        while let Some(command) = channel.dequeue().await {
            if let TypingCommand::TypeWord { word } = command {
                words.push(word);
            }
        }
        assert_eq!(words, vec!["a", "b", "c"]);
    }
}
