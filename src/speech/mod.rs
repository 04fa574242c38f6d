//! Speech recognition
//!
//! `SpeechRecognizer` is the platform seam; `NatsRecognizer` streams audio to
//! an STT service. Both report through `RecognitionEvent`s.

pub mod nats;
pub mod recognizer;

pub use nats::{NatsRecognizer, RecognizerConfig};
pub use recognizer::{RecognitionEvent, SpeechRecognizer, TranscriptAccumulator};
