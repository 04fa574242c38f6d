pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod language;
pub mod nats;
pub mod orchestrator;
pub mod speech;
pub mod synthesis;

pub use audio::{AudioFile, AudioFrame, CaptureConfig, FileCapture, LevelMeter, MicStream, MicrophoneCapture};
pub use config::Config;
pub use conversation::{ConversationClient, HttpConversationClient, Message, MessageLog, Sender};
pub use error::{EngineKind, RecognitionError, VoiceError, VoiceResult};
pub use http::{create_router, AppState};
pub use language::{detect, LanguageTag};
pub use nats::{AudioFrameMessage, NatsClient, TranscriptMessage};
pub use orchestrator::{
    ConversationDriver, ConversationHandle, ConversationMachine, ConversationSnapshot, DriverConfig,
    Phase, Platform,
};
pub use speech::{NatsRecognizer, RecognitionEvent, SpeechRecognizer};
pub use synthesis::{
    partition, NatsSpeechEngine, OverlapPolicy, PlaybackOutcome, SegmentedSynthesizer,
    SpeechEngine, TranscriptSegment, VoiceCatalog,
};
