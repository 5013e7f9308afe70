//! Foreground-window detection and focus control.
//!
//! The injector only types while a specific target window holds keyboard
//! focus. The `WindowSystem` trait abstracts the compositor; the
//! production implementation queries Sway (swaymsg JSON) and the mock
//! scripts focus changes for tests.

use crate::error::Result;
use crate::input::keys::CommandExecutor;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Opaque window handle (compositor container id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowId(pub String);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "con_id={}", self.0)
    }
}

/// OS window/focus boundary.
pub trait WindowSystem: Send {
    /// The window currently holding keyboard focus, if any.
    fn foreground_window(&mut self) -> Result<Option<WindowId>>;

    /// Ask the compositor to focus `window`. Returns true if the request
    /// was accepted (focus is re-checked by the caller either way).
    fn request_focus(&mut self, window: &WindowId) -> Result<bool>;
}

/// Sway/i3-compatible window system via swaymsg.
pub struct SwayWindowSystem<E: CommandExecutor> {
    executor: E,
}

impl<E: CommandExecutor> SwayWindowSystem<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl SwayWindowSystem<crate::input::keys::SystemCommandExecutor> {
    /// Window system using the system command executor.
    pub fn system() -> Self {
        Self::new(crate::input::keys::SystemCommandExecutor::new())
    }
}

/// Depth-first search of a swaymsg tree for the focused container id.
fn find_focused(node: &serde_json::Value) -> Option<u64> {
    if node.get("focused").and_then(|f| f.as_bool()) == Some(true) {
        return node.get("id").and_then(|id| id.as_u64());
    }

    for key in ["nodes", "floating_nodes"] {
        if let Some(children) = node.get(key).and_then(|n| n.as_array()) {
            for child in children {
                if let Some(id) = find_focused(child) {
                    return Some(id);
                }
            }
        }
    }

    None
}

impl<E: CommandExecutor> WindowSystem for SwayWindowSystem<E> {
    fn foreground_window(&mut self) -> Result<Option<WindowId>> {
        let json = self.executor.execute("swaymsg", &["-t", "get_tree", "-r"])?;
        let tree: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| crate::error::TalktypeError::Other(
                format!("Failed to parse swaymsg tree: {}", e),
            ))?;

        Ok(find_focused(&tree).map(|id| WindowId(id.to_string())))
    }

    fn request_focus(&mut self, window: &WindowId) -> Result<bool> {
        let reply = self
            .executor
            .execute("swaymsg", &[&format!("[con_id={}] focus", window.0)])?;
        // swaymsg replies with a JSON success array; a failed criteria
        // match reports success:false without a non-zero exit.
        Ok(!reply.contains("\"success\": false") && !reply.contains("\"success\":false"))
    }
}

/// Scripted window system for tests.
///
/// The foreground window is shared state a test can change mid-run to
/// simulate focus loss; focus requests are recorded and honored or
/// refused per configuration.
#[derive(Clone, Default)]
pub struct MockWindowSystem {
    state: Arc<Mutex<MockWindowState>>,
}

#[derive(Default)]
struct MockWindowState {
    foreground: Option<WindowId>,
    focus_requests: Vec<WindowId>,
    /// Outcomes for upcoming focus requests; when exhausted, requests are
    /// honored.
    refusals: VecDeque<bool>,
}

impl MockWindowSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given window focused.
    pub fn with_foreground(self, window: WindowId) -> Self {
        self.state.lock().unwrap().foreground = Some(window);
        self
    }

    /// Refuse the next `n` focus requests (foreground left unchanged).
    pub fn refuse_next_focus_requests(&self, n: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..n {
            state.refusals.push_back(true);
        }
    }

    /// Change the focused window, as if the user switched apps.
    pub fn set_foreground(&self, window: Option<WindowId>) {
        self.state.lock().unwrap().foreground = window;
    }

    /// Windows focus was requested for, in order.
    pub fn focus_requests(&self) -> Vec<WindowId> {
        self.state.lock().unwrap().focus_requests.clone()
    }
}

impl WindowSystem for MockWindowSystem {
    fn foreground_window(&mut self) -> Result<Option<WindowId>> {
        Ok(self.state.lock().unwrap().foreground.clone())
    }

    fn request_focus(&mut self, window: &WindowId) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.focus_requests.push(window.clone());

        let refused = state.refusals.pop_front().unwrap_or(false);
        if refused {
            Ok(false)
        } else {
            state.foreground = Some(window.clone());
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TalktypeError;

    struct CannedExecutor {
        stdout: String,
    }

    impl CommandExecutor for CannedExecutor {
        fn execute(&self, _command: &str, _args: &[&str]) -> Result<String> {
            Ok(self.stdout.clone())
        }
    }

    const SWAY_TREE: &str = r#"{
        "id": 1,
        "focused": false,
        "nodes": [
            {
                "id": 10,
                "focused": false,
                "nodes": [
                    { "id": 42, "focused": true, "nodes": [] },
                    { "id": 43, "focused": false, "nodes": [] }
                ]
            }
        ],
        "floating_nodes": []
    }"#;

    #[test]
    fn test_find_focused_in_tree() {
        let mut system = SwayWindowSystem::new(CannedExecutor {
            stdout: SWAY_TREE.to_string(),
        });

        let focused = system.foreground_window().unwrap();
        assert_eq!(focused, Some(WindowId("42".to_string())));
    }

    #[test]
    fn test_no_focused_window() {
        let mut system = SwayWindowSystem::new(CannedExecutor {
            stdout: r#"{"id": 1, "focused": false, "nodes": []}"#.to_string(),
        });

        assert_eq!(system.foreground_window().unwrap(), None);
    }

    #[test]
    fn test_focused_in_floating_nodes() {
        let tree = r#"{
            "id": 1,
            "focused": false,
            "nodes": [],
            "floating_nodes": [ { "id": 77, "focused": true } ]
        }"#;
        let mut system = SwayWindowSystem::new(CannedExecutor {
            stdout: tree.to_string(),
        });

        assert_eq!(
            system.foreground_window().unwrap(),
            Some(WindowId("77".to_string()))
        );
    }

    #[test]
    fn test_malformed_tree_is_an_error() {
        let mut system = SwayWindowSystem::new(CannedExecutor {
            stdout: "not json".to_string(),
        });

        assert!(matches!(
            system.foreground_window(),
            Err(TalktypeError::Other(_))
        ));
    }

    #[test]
    fn test_request_focus_parses_success_reply() {
        let mut system = SwayWindowSystem::new(CannedExecutor {
            stdout: r#"[ { "success": true } ]"#.to_string(),
        });
        assert!(system.request_focus(&WindowId("42".to_string())).unwrap());

        let mut system = SwayWindowSystem::new(CannedExecutor {
            stdout: r#"[ { "success": false } ]"#.to_string(),
        });
        assert!(!system.request_focus(&WindowId("42".to_string())).unwrap());
    }

    #[test]
    fn test_mock_honors_focus_requests() {
        let mut mock = MockWindowSystem::new().with_foreground(WindowId("1".to_string()));

        let target = WindowId("2".to_string());
        assert!(mock.request_focus(&target).unwrap());
        assert_eq!(mock.foreground_window().unwrap(), Some(target.clone()));
        assert_eq!(mock.focus_requests(), vec![target]);
    }

    #[test]
    fn test_mock_refusals_leave_foreground_unchanged() {
        let mut mock = MockWindowSystem::new().with_foreground(WindowId("1".to_string()));
        mock.refuse_next_focus_requests(2);

        let target = WindowId("2".to_string());
        assert!(!mock.request_focus(&target).unwrap());
        assert!(!mock.request_focus(&target).unwrap());
        assert_eq!(
            mock.foreground_window().unwrap(),
            Some(WindowId("1".to_string()))
        );

        // Third request is honored.
        assert!(mock.request_focus(&target).unwrap());
        assert_eq!(mock.foreground_window().unwrap(), Some(target));
    }

    #[test]
    fn test_window_id_display() {
        assert_eq!(WindowId("42".to_string()).to_string(), "con_id=42");
    }
}
