//! Keystroke injection: OS window/keyboard bindings and the real-time
//! injector loop.

pub mod injector;
pub mod keys;
pub mod window;

pub use injector::{InjectorConfig, InjectorHandle, InjectorStats, RealTimeInjector};
pub use keys::{
    CommandExecutor, KeystrokeSink, MockKeystrokeSink, SystemCommandExecutor, WtypeKeystrokeSink,
};
pub use window::{MockWindowSystem, SwayWindowSystem, WindowId, WindowSystem};
