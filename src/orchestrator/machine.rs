//! Conversation state machine
//!
//! `ConversationMachine::handle` takes one event and returns the side effects
//! to run, without touching any platform API. The driver executes the
//! commands and feeds their results back in as events.
//!
//! Every asynchronous event carries the generation (recording) or turn it
//! belongs to. Events for anything but the live session or turn are logged
//! and dropped.

use tracing::{debug, info, warn};

use super::state::{
    Command, ConversationSnapshot, Event, Generation, Notice, Phase, RecordingSession, TurnId,
};
use crate::conversation::{Message, MessageLog};
use crate::error::{EngineKind, VoiceError};
use crate::language::{self, LanguageTag};

/// Assistant message appended when the conversation endpoint fails
pub const APOLOGY_TEXT: &str = "Sorry, I encountered an error. Please try again.";

pub struct ConversationMachine {
    phase: Phase,
    next_generation: Generation,
    next_turn: TurnId,
    session: Option<RecordingSession>,
    transcript: String,
    selected_language: Option<LanguageTag>,
    detected_language: Option<LanguageTag>,
    messages: MessageLog,
    /// Turn whose reply is still being spoken, possibly while a new recording runs
    playback_turn: Option<TurnId>,
    notice: Option<Notice>,
}

impl ConversationMachine {
    pub fn new(messages: MessageLog, selected_language: Option<LanguageTag>) -> Self {
        Self {
            phase: Phase::Idle,
            next_generation: 1,
            next_turn: 1,
            session: None,
            transcript: String::new(),
            selected_language,
            detected_language: None,
            messages,
            playback_turn: None,
            notice: None,
        }
    }

    /// Why a control event cannot apply in the current phase, if it cannot.
    /// Events that are not user controls are never rejected here.
    pub fn rejection(&self, event: &Event) -> Option<String> {
        match event {
            Event::StartRecording if !matches!(self.phase, Phase::Idle | Phase::Speaking { .. }) => {
                Some(format!("Cannot start recording while {:?}", self.phase))
            }
            Event::StopRecording | Event::PauseRecording | Event::ResumeRecording
                if self.phase != Phase::Recording =>
            {
                Some("No recording in progress".to_string())
            }
            Event::SelectLanguage(_) if self.phase.is_capturing() => {
                Some("Language cannot change while recording".to_string())
            }
            _ => None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn messages(&self) -> &[Message] {
        self.messages.messages()
    }

    pub fn selected_language(&self) -> Option<&LanguageTag> {
        self.selected_language.as_ref()
    }

    pub fn detected_language(&self) -> Option<&LanguageTag> {
        self.detected_language.as_ref()
    }

    pub fn playback_turn(&self) -> Option<TurnId> {
        self.playback_turn
    }

    /// Language for recognition hints and synthesis fallback
    pub fn effective_language(&self) -> Option<LanguageTag> {
        self.selected_language
            .clone()
            .or_else(|| self.detected_language.clone())
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            phase: self.phase,
            session: self.session.clone(),
            transcript: self.transcript.clone(),
            selected_language: self.selected_language.clone(),
            detected_language: self.detected_language.clone(),
            messages: self.messages.messages().to_vec(),
            notice: self.notice.as_ref().map(Notice::text),
        }
    }

    /// Apply one event and return the commands to execute, in order
    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        debug!("{:?} <- {:?}", self.phase, event);

        match event {
            Event::StartRecording => self.start_recording(),
            Event::StopRecording => self.stop_recording(),
            Event::PauseRecording => self.set_paused(true),
            Event::ResumeRecording => self.set_paused(false),
            Event::SelectLanguage(language) => self.select_language(language),
            Event::MicrophoneReady { generation } => self.microphone_ready(generation),
            Event::MicrophoneFailed { generation, error }
            | Event::RecognizerFailed { generation, error } => {
                self.capability_failed(generation, error)
            }
            Event::Transcript {
                generation,
                text,
                is_final,
            } => self.transcript_received(generation, text, is_final),
            Event::RecognitionEnded { generation } => self.recognition_ended(generation),
            Event::FinalizeTimedOut { generation } => self.finalize_timed_out(generation),
            Event::RecognitionFailed { generation, error } => {
                if !self.is_current(generation) {
                    warn!("Ignoring stale recognition failure ({}) for generation {}", error, generation);
                    return Vec::new();
                }
                info!("Recognition failed: {}", error);
                let mut commands = self.end_capture();
                commands.push(Command::StopRecognizer);
                self.transition(Phase::Idle);
                commands
            }
            Event::Tick { generation } => {
                if let Some(session) = self.session.as_mut() {
                    if session.generation == generation && !session.paused {
                        session.elapsed_seconds += 1;
                    }
                }
                Vec::new()
            }
            Event::ReplyReceived { turn, text } => self.reply_received(turn, text),
            Event::SendFailed { turn, error } => self.send_failed(turn, error),
            Event::PlaybackFinished { turn } => self.playback_finished(turn),
            Event::Shutdown => self.shutdown(),
        }
    }

    fn transition(&mut self, next: Phase) {
        if self.phase != next {
            info!("Conversation: {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
    }

    fn is_current(&self, generation: Generation) -> bool {
        self.phase.is_capturing()
            && self
                .session
                .as_ref()
                .is_some_and(|s| s.generation == generation)
    }

    fn start_recording(&mut self) -> Vec<Command> {
        if !matches!(self.phase, Phase::Idle | Phase::Speaking { .. }) {
            warn!("Cannot start recording while {:?}", self.phase);
            return Vec::new();
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        self.session = Some(RecordingSession::new(
            generation,
            self.selected_language.clone(),
            self.detected_language.clone(),
        ));
        self.transcript.clear();
        self.notice = None;
        self.transition(Phase::Recording);

        vec![Command::AcquireMicrophone { generation }]
    }

    fn microphone_ready(&mut self, generation: Generation) -> Vec<Command> {
        if !self.is_current(generation) || self.phase != Phase::Recording {
            warn!("Microphone ready for stale generation {}, releasing", generation);
            return vec![Command::ReleaseMicrophone];
        }

        vec![
            Command::AttachLevelMeter,
            Command::StartRecognizer {
                generation,
                hint: self.effective_language(),
            },
            Command::StartElapsedTimer { generation },
        ]
    }

    fn capability_failed(&mut self, generation: Generation, error: VoiceError) -> Vec<Command> {
        if !self.is_current(generation) {
            warn!("Ignoring stale failure for generation {}: {}", generation, error);
            return Vec::new();
        }

        warn!("Recording aborted: {}", error);

        let notice = match &error {
            VoiceError::RecognizerBusy => Some(Notice::RecognizerBusy),
            VoiceError::UnsupportedEngine(EngineKind::Recognition) => {
                Some(Notice::RecognitionUnsupported)
            }
            other if other.is_capability_error() => {
                Some(Notice::MicrophoneUnavailable(other.to_string()))
            }
            _ => None,
        };

        let mut commands = self.end_capture();
        // A busy recognizer is running someone else's session
        if error != VoiceError::RecognizerBusy {
            commands.push(Command::StopRecognizer);
        }
        if let Some(notice) = notice {
            self.notice = Some(notice.clone());
            commands.push(Command::Notify(notice));
        }
        self.transition(Phase::Idle);
        commands
    }

    /// Release everything a recording holds and drop the session.
    /// Returns the cleanup commands; the caller picks the next phase.
    fn end_capture(&mut self) -> Vec<Command> {
        if let Some(session) = self.session.as_mut() {
            session.active = false;
            session.paused = false;
        }
        self.session = None;

        vec![
            Command::ReleaseMicrophone,
            Command::DetachLevelMeter,
            Command::StopElapsedTimer,
        ]
    }

    fn stop_recording(&mut self) -> Vec<Command> {
        if self.phase != Phase::Recording {
            debug!("Stop requested while {:?}, nothing to do", self.phase);
            return Vec::new();
        }

        let generation = match self.session.as_mut() {
            Some(session) => {
                session.paused = false;
                session.generation
            }
            None => return Vec::new(),
        };

        self.transition(Phase::Transcribing);

        // Cleanup is unconditional; the recognizer keeps the session alive
        // until it hands over its final transcript
        vec![
            Command::ReleaseMicrophone,
            Command::DetachLevelMeter,
            Command::StopElapsedTimer,
            Command::StopRecognizer,
            Command::StartFinalizeTimer { generation },
        ]
    }

    fn set_paused(&mut self, paused: bool) -> Vec<Command> {
        if self.phase != Phase::Recording {
            return Vec::new();
        }
        if let Some(session) = self.session.as_mut() {
            if session.active && session.paused != paused {
                session.paused = paused;
                info!("Recording {}", if paused { "paused" } else { "resumed" });
            }
        }
        Vec::new()
    }

    fn select_language(&mut self, language: Option<LanguageTag>) -> Vec<Command> {
        if self.phase.is_capturing() {
            warn!("Language cannot change while recording");
            return Vec::new();
        }

        info!(
            "Language set to {}",
            language.as_ref().map(|l| l.as_str()).unwrap_or("auto")
        );
        self.selected_language = language;
        self.detected_language = None;
        Vec::new()
    }

    fn transcript_received(&mut self, generation: Generation, text: String, is_final: bool) -> Vec<Command> {
        if !self.is_current(generation) {
            warn!(
                "Ignoring stale {} transcript for generation {}: {:?}",
                if is_final { "final" } else { "interim" },
                generation,
                text
            );
            return Vec::new();
        }

        if is_final && self.selected_language.is_none() && self.detected_language.is_none() {
            let detected = language::detect(&text);
            info!("Detected language {}", detected);
            if let Some(session) = self.session.as_mut() {
                session.detected_language = Some(detected.clone());
            }
            self.detected_language = Some(detected);
        }

        self.transcript = text;
        Vec::new()
    }

    fn recognition_ended(&mut self, generation: Generation) -> Vec<Command> {
        if !self.is_current(generation) {
            warn!("Ignoring stale recognition end for generation {}", generation);
            return Vec::new();
        }

        let mut commands = Vec::new();
        if self.phase == Phase::Recording {
            // Recognizer finished on its own
            commands.extend(self.end_capture());
        } else {
            self.session = None;
        }
        commands.extend(self.complete_utterance());
        commands
    }

    fn finalize_timed_out(&mut self, generation: Generation) -> Vec<Command> {
        if !self.is_current(generation) || self.phase != Phase::Transcribing {
            debug!("Finalize timer for generation {} no longer relevant", generation);
            return Vec::new();
        }

        warn!("Recognizer did not finalize in time, using last transcript");
        self.session = None;
        self.complete_utterance()
    }

    /// Decide what follows a finished recording
    fn complete_utterance(&mut self) -> Vec<Command> {
        let text = std::mem::take(&mut self.transcript).trim().to_string();

        if text.is_empty() {
            info!("Empty transcript, nothing to send");
            self.transition(Phase::Idle);
            return Vec::new();
        }

        let turn = self.next_turn;
        self.next_turn += 1;

        // The user message must be in the log before the request leaves
        self.messages.append(Message::user(text.clone()));
        self.transition(Phase::Sending { turn });

        vec![Command::Send { turn, text }]
    }

    fn reply_received(&mut self, turn: TurnId, text: String) -> Vec<Command> {
        if self.phase != (Phase::Sending { turn }) {
            warn!("Ignoring reply for stale turn {}", turn);
            return Vec::new();
        }

        self.messages.append(Message::assistant(text.clone()));
        self.playback_turn = Some(turn);
        self.transition(Phase::Speaking { turn });

        vec![Command::Speak {
            turn,
            text,
            language: self.effective_language(),
        }]
    }

    fn send_failed(&mut self, turn: TurnId, error: VoiceError) -> Vec<Command> {
        if self.phase != (Phase::Sending { turn }) {
            warn!("Ignoring send failure for stale turn {}: {}", turn, error);
            return Vec::new();
        }

        warn!("Conversation request failed: {}", error);
        self.messages.append(Message::assistant(APOLOGY_TEXT));
        self.transition(Phase::Idle);
        Vec::new()
    }

    fn playback_finished(&mut self, turn: TurnId) -> Vec<Command> {
        if self.playback_turn == Some(turn) {
            self.playback_turn = None;
        }
        if self.phase == (Phase::Speaking { turn }) {
            self.transition(Phase::Idle);
        } else {
            debug!("Playback for turn {} finished while {:?}", turn, self.phase);
        }
        Vec::new()
    }

    fn shutdown(&mut self) -> Vec<Command> {
        info!("Conversation shutting down");
        let mut commands = self.end_capture();
        commands.push(Command::StopRecognizer);
        commands.push(Command::CancelSpeech);
        self.transcript.clear();
        self.playback_turn = None;
        self.transition(Phase::Idle);
        commands
    }
}
