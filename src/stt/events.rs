//! Event types crossing the recognition boundary.

/// Raw event emitted by a streaming recognition session.
///
/// Partials are provisional and NOT monotonic: a later partial may revise
/// or drop words from an earlier one.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// Provisional transcript for the in-progress utterance.
    Partial { text: String, offset_ms: u64 },
    /// Authoritative transcript for a completed utterance segment.
    Final {
        text: String,
        confidence: f32,
        offset_ms: u64,
        duration_ms: u64,
    },
    /// Provider or transport failure.
    Error { message: String },
}

/// One transcript state for the current utterance, as republished by the
/// transcription link.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSnapshot {
    pub text: String,
    pub is_final: bool,
    /// Provider confidence; only present on finals.
    pub confidence: Option<f32>,
}

impl TranscriptSnapshot {
    /// A provisional snapshot.
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            confidence: None,
        }
    }

    /// A final snapshot with the provider's confidence.
    pub fn final_with_confidence(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            confidence: Some(confidence),
        }
    }
}

/// Output of the transcription link.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// A new transcript snapshot for the current utterance.
    Snapshot(TranscriptSnapshot),
    /// The recognition session failed; typed text is left as-is.
    RecognitionError { message: String },
}

impl From<RecognitionEvent> for TranscriptEvent {
    fn from(event: RecognitionEvent) -> Self {
        match event {
            RecognitionEvent::Partial { text, .. } => {
                TranscriptEvent::Snapshot(TranscriptSnapshot::partial(text))
            }
            RecognitionEvent::Final {
                text, confidence, ..
            } => TranscriptEvent::Snapshot(TranscriptSnapshot::final_with_confidence(
                text, confidence,
            )),
            RecognitionEvent::Error { message } => TranscriptEvent::RecognitionError { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_snapshot_has_no_confidence() {
        let snapshot = TranscriptSnapshot::partial("hello");
        assert_eq!(snapshot.text, "hello");
        assert!(!snapshot.is_final);
        assert!(snapshot.confidence.is_none());
    }

    #[test]
    fn test_final_snapshot_carries_confidence() {
        let snapshot = TranscriptSnapshot::final_with_confidence("hello world", 0.93);
        assert!(snapshot.is_final);
        assert_eq!(snapshot.confidence, Some(0.93));
    }

    #[test]
    fn test_partial_event_converts_to_snapshot() {
        let event = RecognitionEvent::Partial {
            text: "turn le".to_string(),
            offset_ms: 120,
        };

        match TranscriptEvent::from(event) {
            TranscriptEvent::Snapshot(s) => {
                assert_eq!(s.text, "turn le");
                assert!(!s.is_final);
            }
            _ => panic!("expected snapshot"),
        }
    }

    #[test]
    fn test_error_event_converts_to_recognition_error() {
        let event = RecognitionEvent::Error {
            message: "socket closed".to_string(),
        };

        assert_eq!(
            TranscriptEvent::from(event),
            TranscriptEvent::RecognitionError {
                message: "socket closed".to_string()
            }
        );
    }
}
