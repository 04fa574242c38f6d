// Streaming recognizer backed by an STT service on NATS

use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::recognizer::{RecognitionEvent, SpeechRecognizer, TranscriptAccumulator};
use crate::audio::AudioFrame;
use crate::error::{EngineKind, RecognitionError, VoiceError, VoiceResult};
use crate::language::LanguageTag;
use crate::nats::{
    AudioFrameMessage, NatsClient, TranscriptMessage, AUDIO_FRAME_SUBJECT, TRANSCRIPT_SUBJECT,
};

/// Recognizer tuning
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Keep listening across utterances until stopped
    pub continuous: bool,
    /// How long to wait for late transcripts after `stop`
    pub finalize_grace: Duration,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            finalize_grace: Duration::from_millis(1500),
        }
    }
}

/// Publishes microphone frames to `audio.frame.<session>` and turns
/// `stt.text.>` messages for that session into recognition events
pub struct NatsRecognizer {
    nats: NatsClient,
    config: RecognizerConfig,
    listening: Arc<AtomicBool>,
    stop_tx: Option<oneshot::Sender<()>>,
}

struct ListenTask {
    nats: NatsClient,
    session_id: String,
    language: Option<String>,
    config: RecognizerConfig,
    events: mpsc::Sender<RecognitionEvent>,
    listening: Arc<AtomicBool>,
}

impl NatsRecognizer {
    pub fn new(nats: NatsClient, config: RecognizerConfig) -> Self {
        Self {
            nats,
            config,
            listening: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
        }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for NatsRecognizer {
    async fn start(
        &mut self,
        hint: Option<&LanguageTag>,
        audio: broadcast::Receiver<AudioFrame>,
    ) -> VoiceResult<mpsc::Receiver<RecognitionEvent>> {
        if self.listening.load(Ordering::SeqCst) {
            warn!("Recognizer already listening");
            return Err(VoiceError::RecognizerBusy);
        }
        if !self.nats.is_connected() {
            return Err(VoiceError::UnsupportedEngine(EngineKind::Recognition));
        }

        let transcripts = self
            .nats
            .subscribe(TRANSCRIPT_SUBJECT.to_string())
            .await
            .map_err(|e| {
                error!("Failed to subscribe to transcripts: {:#}", e);
                VoiceError::UnsupportedEngine(EngineKind::Recognition)
            })?;

        let session_id = format!("voice-{}", uuid::Uuid::new_v4());
        let (events_tx, events_rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = oneshot::channel();

        info!(
            "Starting recognition session {} (language: {})",
            session_id,
            hint.map(|h| h.as_str()).unwrap_or("auto")
        );

        self.listening.store(true, Ordering::SeqCst);
        self.stop_tx = Some(stop_tx);

        let task = ListenTask {
            nats: self.nats.clone(),
            session_id,
            language: hint.map(|h| h.to_string()),
            config: self.config.clone(),
            events: events_tx,
            listening: Arc::clone(&self.listening),
        };
        tokio::spawn(task.run(audio, transcripts, stop_rx));

        Ok(events_rx)
    }

    async fn stop(&mut self) -> VoiceResult<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            info!("Stopping recognition session");
            // The task may already have ended on its own
            let _ = stop_tx.send(());
        }
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "NATS STT"
    }
}

impl ListenTask {
    async fn run(
        self,
        mut audio: broadcast::Receiver<AudioFrame>,
        mut transcripts: async_nats::Subscriber,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        let mut acc = TranscriptAccumulator::new();
        let mut sequence: u32 = 0;
        let mut audio_open = true;

        'listen: loop {
            tokio::select! {
                stopped = &mut stop_rx => {
                    if stopped.is_err() {
                        // Recognizer dropped without a stop request
                        warn!("Recognition session {} torn down", self.session_id);
                        let events = acc.fail(RecognitionError::Aborted);
                        self.emit_all(events).await;
                        self.listening.store(false, Ordering::SeqCst);
                        return;
                    }
                    break 'listen;
                }
                frame = audio.recv(), if audio_open => match frame {
                    Ok(frame) => {
                        self.publish_frame(&frame, sequence).await;
                        sequence += 1;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Recognizer fell behind, skipped {} frames", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Audio stream closed, waiting for transcripts");
                        audio_open = false;
                    }
                },
                msg = transcripts.next() => match msg {
                    Some(msg) => {
                        if self.handle_transcript(&msg.payload, &mut acc).await && !self.config.continuous {
                            self.finish(&mut acc).await;
                            return;
                        }
                    }
                    None => {
                        error!("Transcript subscription closed");
                        let events = acc.fail(RecognitionError::Engine("transcript stream closed".into()));
                        self.emit_all(events).await;
                        self.listening.store(false, Ordering::SeqCst);
                        return;
                    }
                },
            }
        }

        // Stopped manually: mark end of audio and collect late results
        self.publish_frame_marker(sequence).await;

        let deadline = tokio::time::sleep(self.config.finalize_grace);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                msg = transcripts.next() => match msg {
                    Some(msg) => {
                        if self.handle_transcript(&msg.payload, &mut acc).await && !self.config.continuous {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        self.finish(&mut acc).await;
    }

    /// Returns true when a final result for this session was committed
    async fn handle_transcript(&self, payload: &[u8], acc: &mut TranscriptAccumulator) -> bool {
        let transcript = match serde_json::from_slice::<TranscriptMessage>(payload) {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to parse transcript message: {}", e);
                return false;
            }
        };

        // Filter by session_id
        if transcript.session_id != self.session_id {
            return false;
        }

        if transcript.partial {
            if let Some(event) = acc.partial(&transcript.text) {
                self.emit(event).await;
            }
            false
        } else {
            debug!("Final result: {}", transcript.text);
            acc.commit(&transcript.text);
            if self.config.continuous {
                self.emit(RecognitionEvent::Interim(acc.transcript())).await;
            }
            true
        }
    }

    async fn finish(&self, acc: &mut TranscriptAccumulator) {
        let events = acc.finish();
        self.emit_all(events).await;
        self.listening.store(false, Ordering::SeqCst);
        info!("Recognition session {} ended", self.session_id);
    }

    async fn emit(&self, event: RecognitionEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Recognition listener dropped");
        }
    }

    async fn emit_all(&self, events: Vec<RecognitionEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }

    async fn publish(&self, message: AudioFrameMessage) {
        let subject = format!("{}.{}", AUDIO_FRAME_SUBJECT, self.session_id);
        if let Err(e) = self.nats.publish_json(subject, &message).await {
            error!("Failed to publish audio frame: {:#}", e);
        }
    }

    async fn publish_frame(&self, frame: &AudioFrame, sequence: u32) {
        let message = AudioFrameMessage::from_frame(
            &self.session_id,
            sequence,
            frame,
            self.language.clone(),
            false,
        );
        self.publish(message).await;
    }

    async fn publish_frame_marker(&self, sequence: u32) {
        let marker = AudioFrameMessage::final_marker(&self.session_id, sequence, self.language.clone());
        self.publish(marker).await;
    }
}
