use serde::{Deserialize, Serialize};

use crate::conversation::Message;
use crate::error::{RecognitionError, VoiceError};
use crate::language::LanguageTag;

/// Recording session token; bumped on every start so late callbacks from an
/// earlier session can be told apart
pub type Generation = u64;

/// Identifies one user utterance → assistant reply cycle
pub type TurnId = u64;

/// Where the conversation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    /// Microphone open, recognizer listening
    Recording,
    /// Stop requested; waiting for the recognizer to hand over its transcript
    Transcribing,
    /// User message sent, reply outstanding
    Sending { turn: TurnId },
    /// Reply being spoken
    Speaking { turn: TurnId },
}

impl Phase {
    /// Whether the microphone belongs to a live session
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Recording | Self::Transcribing)
    }
}

/// State of the current recording; exists only between start and stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSession {
    pub generation: Generation,
    pub active: bool,
    pub paused: bool,
    pub elapsed_seconds: u64,
    pub selected_language: Option<LanguageTag>,
    pub detected_language: Option<LanguageTag>,
}

impl RecordingSession {
    pub fn new(
        generation: Generation,
        selected_language: Option<LanguageTag>,
        detected_language: Option<LanguageTag>,
    ) -> Self {
        Self {
            generation,
            active: true,
            paused: false,
            elapsed_seconds: 0,
            selected_language,
            detected_language,
        }
    }
}

/// Notices shown to the user without entering the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// Microphone could not be opened
    MicrophoneUnavailable(String),
    /// Speech recognition is not supported here
    RecognitionUnsupported,
    /// The recognizer is still serving another session
    RecognizerBusy,
}

impl Notice {
    pub fn text(&self) -> String {
        match self {
            Self::MicrophoneUnavailable(reason) => {
                format!("Microphone unavailable: {}", reason)
            }
            Self::RecognitionUnsupported => {
                "Speech Recognition not supported on this platform.".to_string()
            }
            Self::RecognizerBusy => "Speech recognition is already in use.".to_string(),
        }
    }
}

/// Inputs to the conversation state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartRecording,
    StopRecording,
    PauseRecording,
    ResumeRecording,
    /// `None` switches back to auto-detection
    SelectLanguage(Option<LanguageTag>),
    MicrophoneReady { generation: Generation },
    MicrophoneFailed { generation: Generation, error: VoiceError },
    RecognizerFailed { generation: Generation, error: VoiceError },
    Transcript { generation: Generation, text: String, is_final: bool },
    RecognitionEnded { generation: Generation },
    RecognitionFailed { generation: Generation, error: RecognitionError },
    FinalizeTimedOut { generation: Generation },
    /// One elapsed second of recording
    Tick { generation: Generation },
    ReplyReceived { turn: TurnId, text: String },
    SendFailed { turn: TurnId, error: VoiceError },
    PlaybackFinished { turn: TurnId },
    /// Component teardown
    Shutdown,
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AcquireMicrophone { generation: Generation },
    ReleaseMicrophone,
    AttachLevelMeter,
    DetachLevelMeter,
    StartRecognizer { generation: Generation, hint: Option<LanguageTag> },
    StopRecognizer,
    StartElapsedTimer { generation: Generation },
    StopElapsedTimer,
    StartFinalizeTimer { generation: Generation },
    Send { turn: TurnId, text: String },
    Speak { turn: TurnId, text: String, language: Option<LanguageTag> },
    CancelSpeech,
    Notify(Notice),
}

/// Read-only view of the conversation for UIs and the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    #[serde(flatten)]
    pub phase: Phase,
    pub session: Option<RecordingSession>,
    /// Live transcript of the current recording
    pub transcript: String,
    pub selected_language: Option<LanguageTag>,
    pub detected_language: Option<LanguageTag>,
    pub messages: Vec<Message>,
    /// Latest user-visible notice, if any
    pub notice: Option<String>,
}
