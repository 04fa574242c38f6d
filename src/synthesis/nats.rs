// Speech engine backed by a TTS service on NATS

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::synthesizer::{SpeechEngine, Utterance};
use super::voices::VoiceCatalog;
use crate::error::{EngineKind, VoiceError, VoiceResult};
use crate::nats::{
    NatsClient, SpeakReply, SpeakRequest, VoiceListReply, CANCEL_SUBJECT, SPEAK_SUBJECT,
    VOICES_SUBJECT,
};

/// How long voice discovery waits for the TTS service
const VOICES_TIMEOUT: Duration = Duration::from_secs(10);

/// Speaks utterances through `tts.speak` request/reply.
///
/// The TTS service answers each request only after the audio has finished
/// playing, which gives the synthesizer its completion signal. Speak requests
/// therefore have no timeout: a long segment can play for any length of time.
pub struct NatsSpeechEngine {
    nats: NatsClient,
}

impl NatsSpeechEngine {
    pub fn new(nats: NatsClient) -> Self {
        Self { nats }
    }

    /// Ask the TTS service for its voices and install them in `catalog`.
    ///
    /// Runs in the background; speakers wait on the catalog's ready signal.
    pub fn spawn_voice_discovery(&self, catalog: Arc<VoiceCatalog>) {
        let nats = self.nats.clone();
        tokio::spawn(async move {
            match nats
                .request_json::<_, VoiceListReply>(
                    VOICES_SUBJECT.to_string(),
                    &serde_json::json!({}),
                    Some(VOICES_TIMEOUT),
                )
                .await
            {
                Ok(reply) => {
                    info!("TTS service reported {} voices", reply.voices.len());
                    catalog.populate(reply.voices);
                }
                Err(e) => warn!("Failed to load voices from TTS service: {:#}", e),
            }
        });
    }
}

#[async_trait::async_trait]
impl SpeechEngine for NatsSpeechEngine {
    fn is_available(&self) -> bool {
        self.nats.is_connected()
    }

    async fn speak(&self, utterance: &Utterance) -> VoiceResult<()> {
        if !self.nats.is_connected() {
            return Err(VoiceError::UnsupportedEngine(EngineKind::Synthesis));
        }

        let request = SpeakRequest {
            text: utterance.text.clone(),
            language: utterance.language.to_string(),
            voice: utterance.voice.as_ref().map(|v| v.name.clone()),
        };

        let reply: SpeakReply = self
            .nats
            .request_json(SPEAK_SUBJECT.to_string(), &request, None)
            .await
            .map_err(|e| VoiceError::Synthesis(format!("{:#}", e)))?;

        if reply.ok {
            Ok(())
        } else {
            Err(VoiceError::Synthesis(
                reply.error.unwrap_or_else(|| "TTS service rejected utterance".into()),
            ))
        }
    }

    async fn cancel(&self) {
        if let Err(e) = self
            .nats
            .publish_json(CANCEL_SUBJECT.to_string(), &serde_json::json!({}))
            .await
        {
            error!("Failed to cancel speech: {:#}", e);
        }
    }

    fn name(&self) -> &str {
        "NATS TTS"
    }
}
