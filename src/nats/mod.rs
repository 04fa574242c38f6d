pub mod client;
pub mod messages;

pub use client::NatsClient;
pub use messages::{
    AudioFrameMessage, SpeakReply, SpeakRequest, TranscriptMessage, VoiceListReply,
};

/// Subject prefix for outgoing audio frames (`audio.frame.<session>`)
pub const AUDIO_FRAME_SUBJECT: &str = "audio.frame";
/// Wildcard the STT service publishes partial and final transcripts on
pub const TRANSCRIPT_SUBJECT: &str = "stt.text.>";
/// Request/reply subject for speaking one utterance
pub const SPEAK_SUBJECT: &str = "tts.speak";
/// Fire-and-forget subject interrupting current playback
pub const CANCEL_SUBJECT: &str = "tts.cancel";
/// Request/reply subject returning the available voices
pub const VOICES_SUBJECT: &str = "tts.voices";
