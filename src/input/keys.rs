//! Keystroke synthesis with testable command execution.
//!
//! Production injection goes through Wayland tools (wtype); the
//! `CommandExecutor` trait keeps every code path testable without them.

use crate::error::{Result, TalktypeError};
use std::collections::VecDeque;
use std::process::Command;
use std::sync::{Arc, Mutex};

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments, returning its stdout on success.
    fn execute(&self, command: &str, args: &[&str]) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TalktypeError::InjectionToolNotFound {
                    tool: command.to_string(),
                }
            } else if e.kind() == std::io::ErrorKind::PermissionDenied {
                TalktypeError::InjectionPermissionDenied {
                    message: format!("Permission denied executing {}: {}", command, e),
                }
            } else {
                TalktypeError::InjectionFailed {
                    message: format!("Failed to execute {}: {}", command, e),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TalktypeError::InjectionFailed {
                message: format!(
                    "{} failed with status {:?}: {}",
                    command, output.status, stderr
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Keystroke synthesis boundary.
///
/// `send_text` synthesizes all keystrokes for `text` in one OS call and
/// returns the delivered-character count the OS reports, which may be
/// less than requested. The caller decides whether to retry the suffix.
pub trait KeystrokeSink: Send {
    /// Type `text`, returning how many characters were delivered.
    fn send_text(&mut self, text: &str) -> Result<usize>;

    /// Emit one backspace keystroke.
    fn backspace(&mut self) -> Result<()>;
}

/// Keystroke sink backed by wtype.
///
/// wtype reports success or failure for the whole batch, so a successful
/// call counts as full delivery; a failed call as zero.
pub struct WtypeKeystrokeSink<E: CommandExecutor> {
    executor: E,
}

impl<E: CommandExecutor> WtypeKeystrokeSink<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl WtypeKeystrokeSink<SystemCommandExecutor> {
    /// Sink using the system command executor.
    pub fn system() -> Self {
        Self::new(SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> KeystrokeSink for WtypeKeystrokeSink<E> {
    fn send_text(&mut self, text: &str) -> Result<usize> {
        self.executor
            .execute("wtype", &["--", text])
            .map_err(|e| match &e {
                TalktypeError::InjectionToolNotFound { tool } if tool == "wtype" => {
                    TalktypeError::InjectionFailed {
                        message: "wtype not found. Install it:\n\
                            Ubuntu/Debian: sudo apt install wtype\n\
                            Arch: sudo pacman -S wtype"
                            .to_string(),
                    }
                }
                _ => e,
            })?;
        Ok(text.chars().count())
    }

    fn backspace(&mut self) -> Result<()> {
        self.executor.execute("wtype", &["-k", "BackSpace"])?;
        Ok(())
    }
}

/// Recorded operation on a [`MockKeystrokeSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOp {
    Text(String),
    Backspace,
}

/// Recording keystroke sink for tests.
///
/// Applies operations to an internal buffer so tests can assert the
/// resulting screen text; supports scripted partial delivery and
/// failures.
#[derive(Clone, Default)]
pub struct MockKeystrokeSink {
    state: Arc<Mutex<MockSinkState>>,
}

#[derive(Default)]
struct MockSinkState {
    ops: Vec<SinkOp>,
    screen: String,
    /// Delivered-count overrides for upcoming send_text calls.
    deliveries: VecDeque<usize>,
    fail_next: bool,
}

impl MockKeystrokeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the delivered count of upcoming `send_text` calls (clamped
    /// to the requested length). Calls beyond the script deliver fully.
    pub fn with_deliveries(self, counts: Vec<usize>) -> Self {
        self.state
            .lock()
            .unwrap()
            .deliveries
            .extend(counts);
        self
    }

    /// Fail the next sink operation.
    pub fn fail_next(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    /// All recorded operations.
    pub fn ops(&self) -> Vec<SinkOp> {
        self.state.lock().unwrap().ops.clone()
    }

    /// The text a focused application would display.
    pub fn screen_text(&self) -> String {
        self.state.lock().unwrap().screen.clone()
    }
}

impl KeystrokeSink for MockKeystrokeSink {
    fn send_text(&mut self, text: &str) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next {
            state.fail_next = false;
            return Err(TalktypeError::InjectionFailed {
                message: "mock sink failure".to_string(),
            });
        }

        let requested = text.chars().count();
        let delivered = state
            .deliveries
            .pop_front()
            .map(|n| n.min(requested))
            .unwrap_or(requested);

        let delivered_text: String = text.chars().take(delivered).collect();
        state.screen.push_str(&delivered_text);
        state.ops.push(SinkOp::Text(delivered_text));
        Ok(delivered)
    }

    fn backspace(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next {
            state.fail_next = false;
            return Err(TalktypeError::InjectionFailed {
                message: "mock sink failure".to_string(),
            });
        }
        state.screen.pop();
        state.ops.push(SinkOp::Backspace);
        Ok(())
    }
}
