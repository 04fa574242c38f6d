use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::audio::AudioFrame;
use crate::synthesis::Voice;

/// Audio frame message published to NATS for the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
    /// Recognition language hint; absent means auto-detect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "final")]
    pub final_frame: bool,
}

impl AudioFrameMessage {
    /// Encode `frame` as little-endian PCM for `session_id`
    pub fn from_frame(
        session_id: &str,
        sequence: u32,
        frame: &AudioFrame,
        language: Option<String>,
        final_frame: bool,
    ) -> Self {
        let pcm_bytes: Vec<u8> = frame.samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        Self {
            session_id: session_id.to_string(),
            sequence,
            pcm: base64::engine::general_purpose::STANDARD.encode(&pcm_bytes),
            sample_rate: frame.sample_rate,
            channels: frame.channels,
            timestamp: chrono::Utc::now().to_rfc3339(),
            language,
            final_frame,
        }
    }

    /// End-of-audio marker: no samples, `final` set
    pub fn final_marker(session_id: &str, sequence: u32, language: Option<String>) -> Self {
        let empty = AudioFrame {
            samples: Vec::new(),
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        };
        Self::from_frame(session_id, sequence, &empty, language, true)
    }

    /// Decode the PCM payload back into samples
    pub fn samples(&self) -> Result<Vec<i16>> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.pcm)
            .context("Invalid base64 PCM payload")?;

        Ok(bytes
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect())
    }
}

/// Transcript message received from STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Request sent to the TTS service; the reply arrives when playback is done
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// Reply from the TTS service once an utterance finished (or failed)
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakReply {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reply listing the voices the TTS service can use
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VoiceListReply {
    #[serde(default)]
    pub voices: Vec<Voice>,
}
