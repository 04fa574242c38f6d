use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::segment::{partition, strip_emoji};
use super::voices::{Voice, VoiceCatalog};
use crate::error::VoiceResult;
use crate::language::LanguageTag;

/// A single utterance handed to the speech engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub language: LanguageTag,
    /// `None` lets the engine use its default voice
    pub voice: Option<Voice>,
}

/// Platform speech output
///
/// Implementations:
/// - NATS: request/reply against a TTS service
#[async_trait::async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Whether the platform can synthesize speech at all
    fn is_available(&self) -> bool;

    /// Play one utterance, resolving when playback has completed
    async fn speak(&self, utterance: &Utterance) -> VoiceResult<()>;

    /// Interrupt the utterance currently playing, if any
    async fn cancel(&self);

    /// Get engine name for logging
    fn name(&self) -> &str;
}

/// What to do when a reply arrives while another is still being spoken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Stop the current reply and speak the new one
    #[default]
    CancelAndReplace,
    /// Speak the new reply after the current one finishes
    Queue,
}

/// How a `speak` request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// All segments were played
    Completed { segments: usize },
    /// Superseded or cancelled before finishing
    Cancelled,
    /// No synthesis capability; nothing was played
    Unavailable,
    /// The engine failed mid-sequence
    Failed(String),
}

/// Synthesizer tuning
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub policy: OverlapPolicy,
    /// Upper bound on waiting for the voice catalog before speaking anyway
    pub catalog_wait: Duration,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            policy: OverlapPolicy::CancelAndReplace,
            catalog_wait: Duration::from_secs(5),
        }
    }
}

struct SpeakJob {
    generation: u64,
    text: String,
    preferred: Option<LanguageTag>,
    done: oneshot::Sender<PlaybackOutcome>,
}

/// Speaks mixed-language replies one segment at a time.
///
/// All jobs go through a single worker task, so segments (and, under
/// [`OverlapPolicy::Queue`], whole replies) never overlap. Every job carries
/// the generation current when it was submitted; bumping the generation
/// invalidates everything older.
pub struct SegmentedSynthesizer {
    engine: Arc<dyn SpeechEngine>,
    policy: OverlapPolicy,
    generation: Arc<AtomicU64>,
    jobs: mpsc::UnboundedSender<SpeakJob>,
}

impl SegmentedSynthesizer {
    /// Create the synthesizer and spawn its playback worker
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        catalog: Arc<VoiceCatalog>,
        config: SynthesizerConfig,
    ) -> Self {
        let (jobs, jobs_rx) = mpsc::unbounded_channel();
        let generation = Arc::new(AtomicU64::new(0));

        info!(
            "Segmented synthesizer using {} ({:?})",
            engine.name(),
            config.policy
        );

        tokio::spawn(Self::run_worker(
            Arc::clone(&engine),
            catalog,
            Arc::clone(&generation),
            config.catalog_wait,
            jobs_rx,
        ));

        Self {
            engine,
            policy: config.policy,
            generation,
            jobs,
        }
    }

    /// Queue `text` for playback.
    ///
    /// The returned receiver resolves once the whole reply has been played (or
    /// was cancelled). Without a synthesis engine this is a silent no-op that
    /// resolves to [`PlaybackOutcome::Unavailable`].
    pub async fn speak(
        &self,
        text: &str,
        preferred: Option<&LanguageTag>,
    ) -> oneshot::Receiver<PlaybackOutcome> {
        let (done, outcome) = oneshot::channel();

        if !self.engine.is_available() {
            debug!("No speech engine available, skipping playback");
            let _ = done.send(PlaybackOutcome::Unavailable);
            return outcome;
        }

        let generation = match self.policy {
            OverlapPolicy::CancelAndReplace => {
                let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                self.engine.cancel().await;
                next
            }
            OverlapPolicy::Queue => self.generation.load(Ordering::SeqCst),
        };

        let job = SpeakJob {
            generation,
            text: text.to_string(),
            preferred: preferred.cloned(),
            done,
        };

        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job) {
            error!("Playback worker is gone");
            let _ = job.done.send(PlaybackOutcome::Failed("playback worker stopped".into()));
        }

        outcome
    }

    /// Stop the current reply and drop everything queued behind it
    pub async fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.engine.cancel().await;
        debug!("Speech cancelled");
    }

    async fn run_worker(
        engine: Arc<dyn SpeechEngine>,
        catalog: Arc<VoiceCatalog>,
        generation: Arc<AtomicU64>,
        catalog_wait: Duration,
        mut jobs: mpsc::UnboundedReceiver<SpeakJob>,
    ) {
        while let Some(job) = jobs.recv().await {
            let is_stale = || generation.load(Ordering::SeqCst) != job.generation;

            if is_stale() {
                let _ = job.done.send(PlaybackOutcome::Cancelled);
                continue;
            }

            if !catalog.is_ready() {
                info!("Waiting for voice catalog before speaking");
                catalog.wait_ready_for(catalog_wait).await;
            }

            let segments = partition(&strip_emoji(&job.text), job.preferred.as_ref());
            let mut outcome = PlaybackOutcome::Completed {
                segments: segments.len(),
            };

            for (index, segment) in segments.iter().enumerate() {
                if is_stale() {
                    outcome = PlaybackOutcome::Cancelled;
                    break;
                }
                if !segment.is_speakable() {
                    continue;
                }

                let utterance = Utterance {
                    text: segment.text.clone(),
                    language: segment.language.clone(),
                    voice: catalog.pick(&segment.language),
                };

                debug!(
                    "Speaking segment {}/{} [{}] voice={:?}",
                    index + 1,
                    segments.len(),
                    utterance.language,
                    utterance.voice.as_ref().map(|v| v.name.as_str())
                );

                if let Err(e) = engine.speak(&utterance).await {
                    if is_stale() {
                        outcome = PlaybackOutcome::Cancelled;
                    } else {
                        warn!("Speech engine failed on segment {}: {}", index + 1, e);
                        // The engine may still be playing the failed segment
                        engine.cancel().await;
                        outcome = PlaybackOutcome::Failed(e.to_string());
                    }
                    break;
                }
            }

            let _ = job.done.send(outcome);
        }

        debug!("Playback worker stopped");
    }
}
