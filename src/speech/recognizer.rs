use tokio::sync::{broadcast, mpsc};

use crate::audio::AudioFrame;
use crate::error::{RecognitionError, VoiceResult};
use crate::language::LanguageTag;

/// Events emitted by a listening recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Best guess so far; may be superseded
    Interim(String),
    /// The session's transcript; at most one per session
    Final(String),
    /// Session failed without a transcript
    Failed(RecognitionError),
    /// Session is over; always the last event
    End,
}

/// Continuous speech-to-text engine
///
/// Implementations:
/// - NATS: streams audio frames to an STT service and listens for transcripts
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Begin listening on `audio`.
    ///
    /// `hint` is the expected language; `None` lets the engine detect it.
    /// Fails with `UnsupportedEngine` when no backend is present and with
    /// `RecognizerBusy` while a session is already running (the running
    /// session is left untouched).
    async fn start(
        &mut self,
        hint: Option<&LanguageTag>,
        audio: broadcast::Receiver<AudioFrame>,
    ) -> VoiceResult<mpsc::Receiver<RecognitionEvent>>;

    /// Finish early. Whatever was recognized so far is still delivered as
    /// `Final` before `End`. Safe to call when idle.
    async fn stop(&mut self) -> VoiceResult<()>;

    /// Check if a session is running
    fn is_listening(&self) -> bool;

    /// Get engine name for logging
    fn name(&self) -> &str;
}

/// Folds a stream of partial/final STT results into one session transcript
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    committed: String,
    pending: String,
    finished: bool,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn join(a: &str, b: &str) -> String {
        match (a.trim(), b.trim()) {
            ("", b) => b.to_string(),
            (a, "") => a.to_string(),
            (a, b) => format!("{} {}", a, b),
        }
    }

    /// Current best transcript (committed text plus the open partial)
    pub fn transcript(&self) -> String {
        Self::join(&self.committed, &self.pending)
    }

    /// Record a partial result; returns the interim transcript to emit
    pub fn partial(&mut self, text: &str) -> Option<RecognitionEvent> {
        if self.finished {
            return None;
        }
        self.pending = text.to_string();
        Some(RecognitionEvent::Interim(self.transcript()))
    }

    /// Record a final result for one utterance
    pub fn commit(&mut self, text: &str) {
        if self.finished {
            return;
        }
        self.committed = Self::join(&self.committed, text);
        self.pending.clear();
    }

    /// Close the session, producing the closing events exactly once
    pub fn finish(&mut self) -> Vec<RecognitionEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let transcript = self.transcript();
        if transcript.is_empty() {
            vec![
                RecognitionEvent::Failed(RecognitionError::NoMatch),
                RecognitionEvent::End,
            ]
        } else {
            vec![RecognitionEvent::Final(transcript), RecognitionEvent::End]
        }
    }

    /// Close the session after an engine failure
    pub fn fail(&mut self, error: RecognitionError) -> Vec<RecognitionEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![RecognitionEvent::Failed(error), RecognitionEvent::End]
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
