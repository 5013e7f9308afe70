//! Real-time keystroke injector.
//!
//! The single consumer of the command channel and the only execution
//! context that touches the keyboard. Every command is executed only
//! after confirming the target window holds focus; focus is actively
//! recovered with bounded retries, and commands whose window never
//! returns are dropped in order, never requeued.
//!
//! The typed-text shadow buffer (spacing and tail-tolerance decisions)
//! lives exclusively inside the injector loop; producers never see it.

use crate::config::Config;
use crate::defaults;
use crate::input::keys::KeystrokeSink;
use crate::input::window::{WindowId, WindowSystem};
use crate::typing::channel::CommandChannel;
use crate::typing::command::{TypingCommand, needs_leading_space};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the injector loop.
#[derive(Debug, Clone)]
pub struct InjectorConfig {
    /// Delay after every executed command.
    pub inter_command_delay: Duration,
    /// Delay between individual backspace keystrokes.
    pub backspace_delay: Duration,
    /// How far (in chars) a correction's range end may lag behind the
    /// typed count and still execute.
    pub tail_tolerance: usize,
    /// Focus-recovery attempts before a command is dropped.
    pub focus_retries: u32,
    /// Delay between focus-recovery attempts.
    pub focus_retry_delay: Duration,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            inter_command_delay: Duration::from_millis(defaults::INTER_COMMAND_DELAY_MS),
            backspace_delay: Duration::from_millis(defaults::BACKSPACE_DELAY_MS),
            tail_tolerance: defaults::TAIL_TOLERANCE_CHARS,
            focus_retries: defaults::FOCUS_RETRIES,
            focus_retry_delay: Duration::from_millis(defaults::FOCUS_RETRY_DELAY_MS),
        }
    }
}

impl InjectorConfig {
    /// Builds an injector configuration from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            inter_command_delay: Duration::from_millis(config.typing.inter_command_delay_ms),
            backspace_delay: Duration::from_millis(config.typing.backspace_delay_ms),
            tail_tolerance: config.typing.tail_tolerance_chars,
            focus_retries: config.typing.focus_retries,
            focus_retry_delay: Duration::from_millis(config.typing.focus_retry_delay_ms),
        }
    }
}

/// Counters and final state returned when the loop exits.
#[derive(Debug, Clone, Default)]
pub struct InjectorStats {
    /// Commands fully executed.
    pub executed: u64,
    /// Commands dropped because focus never returned.
    pub dropped_focus: u64,
    /// Corrections dropped for falling outside the tail window.
    pub dropped_stale: u64,
    /// The injector's shadow of what it typed.
    pub typed_text: String,
}

/// Handle to a running injector loop.
pub struct InjectorHandle {
    stopping: Arc<AtomicBool>,
    notify: Arc<Notify>,
    join: JoinHandle<InjectorStats>,
}

impl InjectorHandle {
    /// Requests the loop to stop. Dequeue waits, focus-retry waits and
    /// inter-command delays all exit promptly.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Waits for the loop to exit and returns its stats.
    pub async fn join(self) -> InjectorStats {
        self.join.await.unwrap_or_default()
    }
}

/// Consumes the command channel and synthesizes keystrokes against one
/// target window.
pub struct RealTimeInjector {
    config: InjectorConfig,
    channel: Arc<CommandChannel>,
    windows: Box<dyn WindowSystem>,
    sink: Box<dyn KeystrokeSink>,
}

impl RealTimeInjector {
    pub fn new(
        config: InjectorConfig,
        channel: Arc<CommandChannel>,
        windows: Box<dyn WindowSystem>,
        sink: Box<dyn KeystrokeSink>,
    ) -> Self {
        Self {
            config,
            channel,
            windows,
            sink,
        }
    }

    /// Spawns the injection loop targeting `target`.
    pub fn start(self, target: WindowId) -> InjectorHandle {
        let stopping = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());

        let join = tokio::spawn(run_loop(
            self.config,
            self.channel,
            self.windows,
            self.sink,
            target,
            stopping.clone(),
            notify.clone(),
        ));

        InjectorHandle {
            stopping,
            notify,
            join,
        }
    }
}

async fn run_loop(
    config: InjectorConfig,
    channel: Arc<CommandChannel>,
    mut windows: Box<dyn WindowSystem>,
    mut sink: Box<dyn KeystrokeSink>,
    target: WindowId,
    stopping: Arc<AtomicBool>,
    notify: Arc<Notify>,
) -> InjectorStats {
    let mut stats = InjectorStats::default();
    // Shadow of the text typed so far; owned by this loop alone.
    let mut typed = String::new();

    loop {
        if stopping.load(Ordering::SeqCst) {
            break;
        }

        let command = tokio::select! {
            _ = notify.notified() => break,
            maybe = channel.dequeue() => match maybe {
                Some(command) => command,
                None => break,
            },
        };

        if !ensure_focus(&mut windows, &target, &config, &stopping, &notify).await {
            if stopping.load(Ordering::SeqCst) {
                break;
            }
            warn!(%target, ?command, "focus not recovered, dropping command");
            stats.dropped_focus += 1;
            continue;
        }

        match command {
            TypingCommand::TypeWord { word } => {
                execute_type_word(
                    &mut sink,
                    &mut windows,
                    &mut typed,
                    &word,
                    &target,
                    &config,
                    &stopping,
                    &notify,
                )
                .await;
                stats.executed += 1;
            }
            TypingCommand::Correction {
                position,
                chars_to_delete,
                new_text,
            } => {
                let typed_chars = typed.chars().count();
                let range_end = position + chars_to_delete;
                let in_window = range_end <= typed_chars
                    && typed_chars - range_end <= config.tail_tolerance;

                if !in_window {
                    debug!(
                        position,
                        chars_to_delete, typed_chars, "correction outside tail window, dropped"
                    );
                    stats.dropped_stale += 1;
                    continue;
                }

                execute_correction(
                    &mut sink,
                    &mut typed,
                    position,
                    &new_text,
                    &config,
                    &stopping,
                )
                .await;
                stats.executed += 1;
            }
        }

        // Throttle delivery rate, but leave immediately on stop.
        tokio::select! {
            _ = tokio::time::sleep(config.inter_command_delay) => {}
            _ = notify.notified() => break,
        }
    }

    info!(
        executed = stats.executed,
        dropped_focus = stats.dropped_focus,
        dropped_stale = stats.dropped_stale,
        "injector stopped"
    );
    stats.typed_text = typed;
    stats
}

/// Confirm the target is foreground, requesting focus with bounded
/// retries when it is not. Returns false once retries are exhausted or
/// stop was requested.
async fn ensure_focus(
    windows: &mut Box<dyn WindowSystem>,
    target: &WindowId,
    config: &InjectorConfig,
    stopping: &AtomicBool,
    notify: &Notify,
) -> bool {
    for attempt in 0..=config.focus_retries {
        if stopping.load(Ordering::SeqCst) {
            return false;
        }

        match windows.foreground_window() {
            Ok(Some(window)) if window == *target => return true,
            Ok(_) => {}
            Err(e) => debug!(error = %e, "foreground window query failed"),
        }

        if attempt == config.focus_retries {
            break;
        }

        if let Err(e) = windows.request_focus(target) {
            debug!(error = %e, "focus request failed");
        }

        tokio::select! {
            _ = tokio::time::sleep(config.focus_retry_delay) => {}
            _ = notify.notified() => return false,
        }
    }

    false
}

#[allow(clippy::too_many_arguments)]
async fn execute_type_word(
    sink: &mut Box<dyn KeystrokeSink>,
    windows: &mut Box<dyn WindowSystem>,
    typed: &mut String,
    word: &str,
    target: &WindowId,
    config: &InjectorConfig,
    stopping: &AtomicBool,
    notify: &Notify,
) {
    let text = if needs_leading_space(typed.chars().last(), word) {
        format!(" {}", word)
    } else {
        word.to_string()
    };

    let requested = text.chars().count();
    match sink.send_text(&text) {
        Ok(delivered) => {
            typed.extend(text.chars().take(delivered));

            if delivered < requested {
                // One bounded retry of the undelivered suffix after
                // re-confirming focus.
                warn!(delivered, requested, "partial keystroke delivery, retrying suffix");
                let suffix: String = text.chars().skip(delivered).collect();
                if ensure_focus(windows, target, config, stopping, notify).await {
                    match sink.send_text(&suffix) {
                        Ok(more) => typed.extend(suffix.chars().take(more)),
                        Err(e) => warn!(error = %e, "suffix retry failed"),
                    }
                }
            }
        }
        Err(e) => warn!(error = %e, word, "keystroke synthesis failed"),
    }
}

async fn execute_correction(
    sink: &mut Box<dyn KeystrokeSink>,
    typed: &mut String,
    position: usize,
    new_text: &str,
    config: &InjectorConfig,
    stopping: &AtomicBool,
) {
    // Backspace from the end down to `position`, one keystroke per
    // character so the compositor cannot coalesce them.
    let backspaces = typed.chars().count().saturating_sub(position);
    for _ in 0..backspaces {
        if stopping.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = sink.backspace() {
            warn!(error = %e, "backspace failed mid-correction");
            return;
        }
        typed.pop();
        tokio::time::sleep(config.backspace_delay).await;
    }

    if !new_text.is_empty() {
        match sink.send_text(new_text) {
            Ok(delivered) => typed.extend(new_text.chars().take(delivered)),
            Err(e) => warn!(error = %e, "replacement text failed"),
        }
    }
}
