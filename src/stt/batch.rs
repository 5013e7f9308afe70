//! Batch recognition and transcript-cleanup collaborators.
//!
//! Both are single request → single response boundaries. Enhancement
//! failures degrade to the unmodified input; they never fail a session.

use crate::error::Result;
use async_trait::async_trait;
use tracing::warn;

/// Result of a batch transcription request.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTranscript {
    pub text: String,
    pub confidence: f32,
}

/// One-shot transcription of a finished clip.
#[async_trait]
pub trait BatchRecognizer: Send + Sync {
    /// Transcribe a complete WAV-encoded clip.
    async fn transcribe(&self, wav: &[u8]) -> Result<BatchTranscript>;
}

/// LLM-backed transcript cleanup.
#[async_trait]
pub trait TranscriptEnhancer: Send + Sync {
    /// Return a cleaned-up version of the transcript.
    async fn enhance(&self, text: &str) -> Result<String>;
}

/// Run the enhancer, falling back to the unmodified input on failure.
pub async fn enhance_or_passthrough(enhancer: &dyn TranscriptEnhancer, text: &str) -> String {
    match enhancer.enhance(text).await {
        Ok(enhanced) => enhanced,
        Err(e) => {
            warn!(error = %e, "transcript enhancement failed, using raw transcript");
            text.to_string()
        }
    }
}

/// Scripted batch recognizer for tests.
pub struct MockBatchRecognizer {
    response: String,
    confidence: f32,
    should_fail: bool,
}

impl MockBatchRecognizer {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            confidence: 0.9,
            should_fail: false,
        }
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

#[async_trait]
impl BatchRecognizer for MockBatchRecognizer {
    async fn transcribe(&self, _wav: &[u8]) -> Result<BatchTranscript> {
        if self.should_fail {
            return Err(crate::error::TalktypeError::Recognition {
                message: "mock batch failure".to_string(),
            });
        }
        Ok(BatchTranscript {
            text: self.response.clone(),
            confidence: self.confidence,
        })
    }
}

/// Scripted enhancer for tests.
pub struct MockEnhancer {
    response: Option<String>,
}

impl MockEnhancer {
    pub fn new(response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { response: None }
    }
}

#[async_trait]
impl TranscriptEnhancer for MockEnhancer {
    async fn enhance(&self, _text: &str) -> Result<String> {
        match &self.response {
            Some(response) => Ok(response.clone()),
            None => Err(crate::error::TalktypeError::Other(
                "mock enhancer failure".to_string(),
            )),
        }
    }
}
