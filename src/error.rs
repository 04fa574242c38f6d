//! Error types shared by the capture, recognition, synthesis and conversation layers

use thiserror::Error;

/// Result alias for voice pipeline operations
pub type VoiceResult<T> = std::result::Result<T, VoiceError>;

/// Platform engine kinds that may be missing at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Recognition,
    Synthesis,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recognition => write!(f, "speech recognition"),
            Self::Synthesis => write!(f, "speech synthesis"),
        }
    }
}

/// Ways a recognition session can end without a usable transcript
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// The engine heard audio but could not match any speech
    #[error("no speech could be matched")]
    NoMatch,

    /// The session was torn down before the engine produced a result
    #[error("recognition aborted")]
    Aborted,

    /// Generic engine failure
    #[error("recognition engine failure: {0}")]
    Engine(String),
}

/// Errors surfaced by the voice conversation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    /// Microphone access was refused
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No capture device could be opened
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The platform lacks a recognition or synthesis backend
    #[error("{0} is not supported on this platform")]
    UnsupportedEngine(EngineKind),

    /// Recognition session failed
    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    /// `start` was called on a recognizer that is already listening
    #[error("recognizer is already listening")]
    RecognizerBusy,

    /// Conversation endpoint unreachable
    #[error("network error: {0}")]
    Network(String),

    /// Conversation endpoint answered with a non-2xx status
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// Speech engine failed while playing an utterance
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

impl VoiceError {
    /// Whether this error means a platform capability is absent, as opposed to a
    /// failure in the middle of a conversation
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_) | Self::DeviceUnavailable(_) | Self::UnsupportedEngine(_)
        )
    }
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
