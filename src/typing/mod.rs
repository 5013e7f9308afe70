//! Transcript-to-keystroke translation: the synchronizer that diffs
//! transcript snapshots into typing commands, and the ordered channel
//! carrying them to the injector.

pub mod channel;
pub mod command;
pub mod synchronizer;

pub use channel::CommandChannel;
pub use command::{TypingCommand, needs_leading_space, replay};
pub use synchronizer::TranscriptSynchronizer;
