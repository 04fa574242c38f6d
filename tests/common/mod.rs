// Fake platform services shared by the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::Instant;
use voice_tutor::audio::{AudioFrame, MicStream, MicrophoneCapture};
use voice_tutor::conversation::ConversationClient;
use voice_tutor::error::{VoiceError, VoiceResult};
use voice_tutor::language::LanguageTag;
use voice_tutor::speech::{RecognitionEvent, SpeechRecognizer};
use voice_tutor::synthesis::{SpeechEngine, Utterance};

// ============================================================================
// Microphone
// ============================================================================

#[derive(Default)]
pub struct CaptureStats {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub fail_with: Mutex<Option<VoiceError>>,
    pub frames: Mutex<Option<broadcast::Sender<AudioFrame>>>,
}

impl CaptureStats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Push a frame into the most recently acquired stream
    pub fn feed(&self, frame: AudioFrame) {
        if let Some(tx) = self.frames.lock().unwrap().as_ref() {
            let _ = tx.send(frame);
        }
    }
}

pub struct FakeCapture {
    pub stats: Arc<CaptureStats>,
}

impl FakeCapture {
    pub fn new() -> (Self, Arc<CaptureStats>) {
        let stats = Arc::new(CaptureStats::default());
        (
            Self {
                stats: Arc::clone(&stats),
            },
            stats,
        )
    }
}

#[async_trait::async_trait]
impl MicrophoneCapture for FakeCapture {
    async fn acquire(&mut self) -> VoiceResult<MicStream> {
        if let Some(error) = self.stats.fail_with.lock().unwrap().clone() {
            return Err(error);
        }
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        let (tx, _) = broadcast::channel(16);
        *self.stats.frames.lock().unwrap() = Some(tx.clone());
        Ok(MicStream::new(1, tx, None))
    }

    async fn release(&mut self, stream: &MicStream) -> VoiceResult<()> {
        if stream.stop_tracks() {
            self.stats.released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "fake microphone"
    }
}

// ============================================================================
// Recognizer
// ============================================================================

#[derive(Default)]
pub struct RecognizerControl {
    sender: Mutex<Option<mpsc::Sender<RecognitionEvent>>>,
    on_stop: Mutex<Vec<RecognitionEvent>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub hints: Mutex<Vec<Option<LanguageTag>>>,
    pub fail_with: Mutex<Option<VoiceError>>,
    /// Ignore `stop` entirely, as a recognizer that never finalizes
    pub hang_on_stop: AtomicBool,
}

impl RecognizerControl {
    /// Deliver an event to the running session
    pub async fn emit(&self, event: RecognitionEvent) {
        let sender = self.sender.lock().unwrap().clone();
        if let Some(tx) = sender {
            let _ = tx.send(event).await;
        }
    }

    /// Final transcript the recognizer hands over when stopped
    pub fn finalize_with(&self, text: &str) {
        *self.on_stop.lock().unwrap() = vec![
            RecognitionEvent::Final(text.to_string()),
            RecognitionEvent::End,
        ];
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

pub struct FakeRecognizer {
    control: Arc<RecognizerControl>,
}

impl FakeRecognizer {
    pub fn new() -> (Self, Arc<RecognizerControl>) {
        let control = Arc::new(RecognizerControl::default());
        (
            Self {
                control: Arc::clone(&control),
            },
            control,
        )
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn start(
        &mut self,
        hint: Option<&LanguageTag>,
        _audio: broadcast::Receiver<AudioFrame>,
    ) -> VoiceResult<mpsc::Receiver<RecognitionEvent>> {
        if let Some(error) = self.control.fail_with.lock().unwrap().clone() {
            return Err(error);
        }
        self.control.starts.fetch_add(1, Ordering::SeqCst);
        self.control.hints.lock().unwrap().push(hint.cloned());

        let (tx, rx) = mpsc::channel(16);
        *self.control.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> VoiceResult<()> {
        self.control.stops.fetch_add(1, Ordering::SeqCst);
        if self.control.hang_on_stop.load(Ordering::SeqCst) {
            return Ok(());
        }

        let sender = self.control.sender.lock().unwrap().take();
        if let Some(tx) = sender {
            let events: Vec<_> = self.control.on_stop.lock().unwrap().drain(..).collect();
            for event in events {
                let _ = tx.try_send(event);
            }
        }
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.control.sender.lock().unwrap().is_some()
    }

    fn name(&self) -> &str {
        "fake recognizer"
    }
}

// ============================================================================
// Speech engine
// ============================================================================

/// Engine that "plays" each utterance for a fixed time and records overlap
///
/// `give_up_next` makes the next `speak` return an error after the given time
/// while the audio keeps playing, like a request that times out before the
/// service has finished talking. Starting another utterance while audio is
/// still playing counts as an overlap.
pub struct FakeEngine {
    pub available: bool,
    pub duration: Duration,
    pub spoken: Mutex<Vec<Utterance>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub cancels: AtomicUsize,
    cancelled: Notify,
    pub give_up_next: Mutex<Option<Duration>>,
    playing_until: Mutex<Option<Instant>>,
    pub overlaps: AtomicUsize,
}

impl FakeEngine {
    fn build(available: bool, duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            available,
            duration,
            spoken: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            cancelled: Notify::new(),
            give_up_next: Mutex::new(None),
            playing_until: Mutex::new(None),
            overlaps: AtomicUsize::new(0),
        })
    }

    pub fn new(duration: Duration) -> Arc<Self> {
        Self::build(true, duration)
    }

    pub fn unavailable() -> Arc<Self> {
        Self::build(false, Duration::ZERO)
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SpeechEngine for FakeEngine {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn speak(&self, utterance: &Utterance) -> VoiceResult<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.spoken.lock().unwrap().push(utterance.clone());

        let started = Instant::now();
        {
            let mut playing = self.playing_until.lock().unwrap();
            if playing.is_some_and(|until| until > started) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            *playing = Some(started + self.duration);
        }

        let give_up = self.give_up_next.lock().unwrap().take();
        let wait = give_up.unwrap_or(self.duration);

        let result = tokio::select! {
            _ = tokio::time::sleep(wait) => match give_up {
                Some(_) => Err(VoiceError::Synthesis("request timed out".into())),
                None => Ok(()),
            },
            _ = self.cancelled.notified() => Err(VoiceError::Synthesis("interrupted".into())),
        };

        if give_up.is_none() {
            *self.playing_until.lock().unwrap() = None;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        *self.playing_until.lock().unwrap() = None;
        self.cancelled.notify_waiters();
    }

    fn name(&self) -> &str {
        "fake engine"
    }
}

// ============================================================================
// Conversation endpoint
// ============================================================================

pub struct FakeClient {
    replies: Mutex<VecDeque<VoiceResult<String>>>,
    pub sent: Mutex<Vec<String>>,
    pub delay: Duration,
}

impl FakeClient {
    pub fn replying(replies: Vec<VoiceResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
            delay: Duration::from_millis(50),
        })
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ConversationClient for FakeClient {
    async fn send(&self, message: &str) -> VoiceResult<String> {
        self.sent.lock().unwrap().push(message.to_string());
        tokio::time::sleep(self.delay).await;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Okay.".to_string()))
    }
}
