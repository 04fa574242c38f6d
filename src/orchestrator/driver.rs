use anyhow::{anyhow, Context, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::machine::ConversationMachine;
use super::state::{Command, ConversationSnapshot, Event, Generation, TurnId};
use crate::audio::{LevelMeter, LevelMeterHandle, MicStream, MicrophoneCapture};
use crate::conversation::{ConversationClient, MessageLog};
use crate::error::VoiceError;
use crate::language::LanguageTag;
use crate::speech::{RecognitionEvent, SpeechRecognizer};
use crate::synthesis::{PlaybackOutcome, SegmentedSynthesizer};

/// Platform services the conversation runs against
pub struct Platform {
    pub capture: Box<dyn MicrophoneCapture>,
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub synthesizer: Arc<SegmentedSynthesizer>,
    pub client: Arc<dyn ConversationClient>,
}

/// Configuration for a conversation driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Assistant message shown before the first turn
    pub greeting: Option<String>,
    /// Pre-selected language; `None` means auto-detect
    pub language: Option<LanguageTag>,
    /// How long a stopped recognizer may take to hand over its transcript
    pub finalize_timeout: Duration,
    /// Level meter samples per second
    pub level_fps: u32,
    /// Interval of the elapsed-recording counter
    pub tick: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            greeting: None,
            language: None,
            finalize_timeout: Duration::from_secs(3),
            level_fps: 60,
            tick: Duration::from_secs(1),
        }
    }
}

/// Verdict on a control request, given once the driver has processed it
#[derive(Debug, Clone)]
pub enum ControlReply {
    /// Applied; carries the state right after
    Accepted(ConversationSnapshot),
    /// Not applicable in the current phase
    Rejected(String),
}

/// Items on the driver's queue
enum Inbox {
    Event(Event),
    /// Control request whose caller waits for the verdict
    Request {
        event: Event,
        reply: oneshot::Sender<ControlReply>,
    },
}

/// Cloneable control surface for a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    events: mpsc::UnboundedSender<Inbox>,
    snapshot: watch::Receiver<ConversationSnapshot>,
    level: watch::Receiver<u8>,
}

impl ConversationHandle {
    fn post(&self, event: Event) -> Result<()> {
        self.events
            .send(Inbox::Event(event))
            .map_err(|_| anyhow!("Conversation driver is not running"))
    }

    /// Submit a control event and wait for the driver to accept or reject it.
    ///
    /// The check and the transition happen in the same step of the driver
    /// loop, so no other event can slip in between.
    pub async fn request(&self, event: Event) -> Result<ControlReply> {
        let (reply, verdict) = oneshot::channel();
        self.events
            .send(Inbox::Request { event, reply })
            .map_err(|_| anyhow!("Conversation driver is not running"))?;
        verdict.await.context("Conversation driver stopped")
    }

    pub fn start_recording(&self) -> Result<()> {
        self.post(Event::StartRecording)
    }

    pub fn stop_recording(&self) -> Result<()> {
        self.post(Event::StopRecording)
    }

    pub fn pause_recording(&self) -> Result<()> {
        self.post(Event::PauseRecording)
    }

    pub fn resume_recording(&self) -> Result<()> {
        self.post(Event::ResumeRecording)
    }

    /// `None` switches to auto-detection
    pub fn select_language(&self, language: Option<LanguageTag>) -> Result<()> {
        self.post(Event::SelectLanguage(language))
    }

    /// Release every resource and stop the driver
    pub fn shutdown(&self) -> Result<()> {
        self.post(Event::Shutdown)
    }

    /// Latest published state
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Current microphone level (0-100)
    pub fn level(&self) -> u8 {
        *self.level.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<ConversationSnapshot>
    where
        F: FnMut(&ConversationSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .context("Conversation driver stopped")?;
        Ok(snapshot.clone())
    }
}

/// Runs the conversation state machine against real platform services.
///
/// A single task owns the machine and processes events one at a time. Quick
/// platform calls (opening the microphone, starting the recognizer) run
/// inline; anything that waits on the outside world runs in a spawned task
/// that posts its result back tagged with its generation or turn.
pub struct ConversationDriver {
    machine: ConversationMachine,
    platform: Platform,
    config: DriverConfig,
    events_tx: mpsc::WeakUnboundedSender<Inbox>,
    events_rx: mpsc::UnboundedReceiver<Inbox>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
    meter: LevelMeter,
    stream: Option<MicStream>,
    meter_handle: Option<LevelMeterHandle>,
    elapsed_timer: Option<JoinHandle<()>>,
    finalize_timer: Option<JoinHandle<()>>,
}

impl ConversationDriver {
    /// Start the driver task and return a handle to it
    pub fn spawn(platform: Platform, config: DriverConfig) -> (ConversationHandle, JoinHandle<()>) {
        let messages = match &config.greeting {
            Some(greeting) => MessageLog::with_greeting(greeting.clone()),
            None => MessageLog::new(),
        };
        let machine = ConversationMachine::new(messages, config.language.clone());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        let meter = LevelMeter::new(config.level_fps);

        let handle = ConversationHandle {
            events: events_tx.clone(),
            snapshot: snapshot_rx,
            level: meter.subscribe(),
        };

        info!(
            "Conversation driver starting (capture: {}, recognizer: {})",
            platform.capture.name(),
            platform.recognizer.name()
        );

        let driver = Self {
            machine,
            platform,
            config,
            events_tx: events_tx.downgrade(),
            events_rx,
            snapshot_tx,
            meter,
            stream: None,
            meter_handle: None,
            elapsed_timer: None,
            finalize_timer: None,
        };

        (handle, tokio::spawn(driver.run()))
    }

    async fn run(mut self) {
        while let Some(item) = self.events_rx.recv().await {
            let (event, reply) = match item {
                Inbox::Event(event) => (event, None),
                Inbox::Request { event, reply } => (event, Some(reply)),
            };

            let shutting_down = event == Event::Shutdown;
            match reply {
                Some(reply) => match self.machine.rejection(&event) {
                    Some(reason) => {
                        debug!("Rejected {:?}: {}", event, reason);
                        let _ = reply.send(ControlReply::Rejected(reason));
                        continue;
                    }
                    None => {
                        self.process(event).await;
                        let _ = reply.send(ControlReply::Accepted(self.machine.snapshot()));
                    }
                },
                None => self.process(event).await,
            }

            if shutting_down {
                break;
            }
        }

        // Every handle dropped without an explicit shutdown
        if self.stream.is_some() || self.machine.phase().is_capturing() {
            self.process(Event::Shutdown).await;
        }

        info!("Conversation driver stopped");
    }

    async fn process(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            for command in self.machine.handle(event) {
                if let Some(follow_up) = self.execute(command).await {
                    queue.push_back(follow_up);
                }
            }
        }

        self.snapshot_tx.send_replace(self.machine.snapshot());
    }

    fn sender(&self) -> Option<EventSender> {
        self.events_tx.upgrade().map(EventSender)
    }

    /// Run one command; inline results come back as a follow-up event
    async fn execute(&mut self, command: Command) -> Option<Event> {
        debug!("Executing {:?}", command);

        match command {
            Command::AcquireMicrophone { generation } => {
                self.release_stream().await;
                match self.platform.capture.acquire().await {
                    Ok(stream) => {
                        self.stream = Some(stream);
                        Some(Event::MicrophoneReady { generation })
                    }
                    Err(error) => Some(Event::MicrophoneFailed { generation, error }),
                }
            }

            Command::ReleaseMicrophone => {
                self.release_stream().await;
                None
            }

            Command::AttachLevelMeter => {
                self.detach_meter();
                if let Some(stream) = &self.stream {
                    self.meter_handle = Some(self.meter.attach(stream));
                }
                None
            }

            Command::DetachLevelMeter => {
                self.detach_meter();
                None
            }

            Command::StartRecognizer { generation, hint } => {
                let audio = match &self.stream {
                    Some(stream) => stream.subscribe(),
                    None => {
                        return Some(Event::RecognizerFailed {
                            generation,
                            error: VoiceError::DeviceUnavailable("no open microphone stream".into()),
                        })
                    }
                };

                match self.platform.recognizer.start(hint.as_ref(), audio).await {
                    Ok(events) => {
                        if let Some(tx) = self.sender() {
                            tokio::spawn(forward_recognition(generation, events, tx));
                        }
                        None
                    }
                    Err(error) => Some(Event::RecognizerFailed { generation, error }),
                }
            }

            Command::StopRecognizer => {
                if let Err(e) = self.platform.recognizer.stop().await {
                    error!("Failed to stop recognizer: {}", e);
                }
                None
            }

            Command::StartElapsedTimer { generation } => {
                abort_task(&mut self.elapsed_timer);
                if let Some(tx) = self.sender() {
                    self.elapsed_timer = Some(tokio::spawn(run_elapsed_timer(
                        generation,
                        self.config.tick,
                        tx,
                    )));
                }
                None
            }

            Command::StopElapsedTimer => {
                abort_task(&mut self.elapsed_timer);
                None
            }

            Command::StartFinalizeTimer { generation } => {
                abort_task(&mut self.finalize_timer);
                if let Some(tx) = self.sender() {
                    let timeout = self.config.finalize_timeout;
                    self.finalize_timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(timeout).await;
                        let _ = tx.send(Event::FinalizeTimedOut { generation });
                    }));
                }
                None
            }

            Command::Send { turn, text } => {
                if let Some(tx) = self.sender() {
                    let client = Arc::clone(&self.platform.client);
                    tokio::spawn(async move {
                        let event = match client.send(&text).await {
                            Ok(reply) => Event::ReplyReceived { turn, text: reply },
                            Err(error) => Event::SendFailed { turn, error },
                        };
                        let _ = tx.send(event);
                    });
                }
                None
            }

            Command::Speak {
                turn,
                text,
                language,
            } => {
                let outcome = self
                    .platform
                    .synthesizer
                    .speak(&text, language.as_ref())
                    .await;
                if let Some(tx) = self.sender() {
                    tokio::spawn(report_playback(turn, outcome, tx));
                }
                None
            }

            Command::CancelSpeech => {
                self.platform.synthesizer.cancel().await;
                None
            }

            Command::Notify(notice) => {
                warn!("Notice: {}", notice.text());
                None
            }
        }
    }

    async fn release_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = self.platform.capture.release(&stream).await {
                error!("Failed to release microphone: {}", e);
            }
        }
    }

    fn detach_meter(&mut self) {
        if let Some(mut handle) = self.meter_handle.take() {
            handle.detach();
        }
    }
}

/// Posts results of spawned work back onto the driver's queue
#[derive(Clone)]
struct EventSender(mpsc::UnboundedSender<Inbox>);

impl EventSender {
    fn send(&self, event: Event) -> Result<()> {
        self.0
            .send(Inbox::Event(event))
            .map_err(|_| anyhow!("Conversation driver is not running"))
    }
}

fn abort_task(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}

/// Relay recognizer events into the driver, tagged with their session
async fn forward_recognition(
    generation: Generation,
    mut events: mpsc::Receiver<RecognitionEvent>,
    tx: EventSender,
) {
    while let Some(event) = events.recv().await {
        let (event, done) = match event {
            RecognitionEvent::Interim(text) => (
                Event::Transcript {
                    generation,
                    text,
                    is_final: false,
                },
                false,
            ),
            RecognitionEvent::Final(text) => (
                Event::Transcript {
                    generation,
                    text,
                    is_final: true,
                },
                false,
            ),
            RecognitionEvent::Failed(error) => (Event::RecognitionFailed { generation, error }, true),
            RecognitionEvent::End => (Event::RecognitionEnded { generation }, true),
        };

        if tx.send(event).is_err() || done {
            return;
        }
    }

    // Recognizer went away without saying goodbye
    debug!("Recognition channel for generation {} closed", generation);
    let _ = tx.send(Event::RecognitionEnded { generation });
}

async fn run_elapsed_timer(generation: Generation, tick: Duration, tx: EventSender) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
    loop {
        ticker.tick().await;
        if tx.send(Event::Tick { generation }).is_err() {
            return;
        }
    }
}

async fn report_playback(
    turn: TurnId,
    outcome: oneshot::Receiver<PlaybackOutcome>,
    tx: EventSender,
) {
    match outcome.await {
        Ok(PlaybackOutcome::Completed { segments }) => {
            info!("Turn {} spoken in {} segments", turn, segments)
        }
        Ok(PlaybackOutcome::Unavailable) => debug!("Turn {} not spoken, no speech engine", turn),
        Ok(PlaybackOutcome::Cancelled) | Err(_) => info!("Playback for turn {} cancelled", turn),
        Ok(PlaybackOutcome::Failed(reason)) => warn!("Playback for turn {} failed: {}", turn, reason),
    }
    let _ = tx.send(Event::PlaybackFinished { turn });
}
