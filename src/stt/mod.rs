//! Speech-to-text boundary: the streaming recognition link and the
//! batch recognizer / transcript enhancer collaborators.

pub mod batch;
pub mod events;
pub mod link;

pub use batch::{BatchRecognizer, BatchTranscript, TranscriptEnhancer, enhance_or_passthrough};
pub use events::{RecognitionEvent, TranscriptEvent, TranscriptSnapshot};
pub use link::{MockRecognizer, StreamingRecognizer, TranscriptionLink};
