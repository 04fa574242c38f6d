//! Segmented multi-language speech synthesis
//!
//! A reply is stripped of emoji, split into same-script segments, and each
//! segment is spoken with the best matching voice, strictly one after another.

pub mod nats;
pub mod segment;
pub mod synthesizer;
pub mod voices;

pub use nats::NatsSpeechEngine;
pub use segment::{partition, strip_emoji, TranscriptSegment};
pub use synthesizer::{
    OverlapPolicy, PlaybackOutcome, SegmentedSynthesizer, SpeechEngine, SynthesizerConfig,
    Utterance,
};
pub use voices::{Voice, VoiceCatalog};
