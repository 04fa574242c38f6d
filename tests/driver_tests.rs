// End-to-end conversation tests
//
// A real driver runs against fake platform services on a paused clock.

mod common;

use common::{CaptureStats, FakeCapture, FakeClient, FakeEngine, FakeRecognizer, RecognizerControl};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use voice_tutor::conversation::Sender;
use voice_tutor::error::{EngineKind, RecognitionError, VoiceError, VoiceResult};
use voice_tutor::language::LanguageTag;
use voice_tutor::orchestrator::{
    ControlReply, ConversationDriver, ConversationHandle, DriverConfig, Event, Phase, Platform,
    APOLOGY_TEXT,
};
use voice_tutor::speech::RecognitionEvent;
use voice_tutor::synthesis::{OverlapPolicy, SegmentedSynthesizer, SynthesizerConfig, Voice, VoiceCatalog};

struct Harness {
    conversation: ConversationHandle,
    driver: JoinHandle<()>,
    capture: Arc<CaptureStats>,
    recognizer: Arc<RecognizerControl>,
    engine: Arc<FakeEngine>,
    client: Arc<FakeClient>,
}

fn harness(replies: Vec<VoiceResult<String>>, config: DriverConfig) -> Harness {
    let (capture, capture_stats) = FakeCapture::new();
    let (recognizer, recognizer_control) = FakeRecognizer::new();
    let engine = FakeEngine::new(Duration::from_millis(500));
    let client = FakeClient::replying(replies);

    let catalog = Arc::new(VoiceCatalog::new());
    catalog.populate(vec![Voice::new("Samantha", "en-US"), Voice::new("Lekha", "hi-IN")]);

    let platform = Platform {
        capture: Box::new(capture),
        recognizer: Box::new(recognizer),
        synthesizer: Arc::new(SegmentedSynthesizer::new(
            engine.clone(),
            catalog,
            SynthesizerConfig {
                policy: OverlapPolicy::CancelAndReplace,
                catalog_wait: Duration::from_secs(1),
            },
        )),
        client: client.clone(),
    };

    let (conversation, driver) = ConversationDriver::spawn(platform, config);

    Harness {
        conversation,
        driver,
        capture: capture_stats,
        recognizer: recognizer_control,
        engine,
        client,
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_turn() -> anyhow::Result<()> {
    let h = harness(vec![Ok("Great, let's practice!".to_string())], DriverConfig::default());

    h.conversation.start_recording()?;
    h.conversation.wait_for(|s| s.phase == Phase::Recording).await?;
    assert_eq!(h.capture.acquired(), 1);
    assert_eq!(h.recognizer.starts(), 1);

    h.recognizer
        .emit(RecognitionEvent::Interim("I want".to_string()))
        .await;
    h.conversation.wait_for(|s| s.transcript == "I want").await?;

    h.recognizer.finalize_with("I want to practice");
    h.conversation.stop_recording()?;

    let done = h
        .conversation
        .wait_for(|s| s.phase == Phase::Idle && s.messages.len() == 2)
        .await?;

    assert_eq!(done.messages[0].sender, Sender::User);
    assert_eq!(done.messages[0].text, "I want to practice");
    assert_eq!(done.messages[1].sender, Sender::Assistant);
    assert_eq!(done.messages[1].text, "Great, let's practice!");
    assert_eq!(done.detected_language, Some(LanguageTag::new("en-US")));

    assert_eq!(h.client.sent(), vec!["I want to practice"]);
    assert_eq!(h.engine.spoken_texts(), vec!["Great, let's practice!"]);
    assert_eq!(h.capture.released(), 1);
    assert_eq!(h.recognizer.stops(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_greeting_seeds_log() -> anyhow::Result<()> {
    let h = harness(
        vec![],
        DriverConfig {
            greeting: Some("Hello! Tap the mic to start.".to_string()),
            ..DriverConfig::default()
        },
    );

    let snapshot = h.conversation.snapshot();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].sender, Sender::Assistant);
    assert_eq!(snapshot.phase, Phase::Idle);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_server_error_appends_apology() -> anyhow::Result<()> {
    // Scenario C
    let h = harness(
        vec![Err(VoiceError::Server {
            status: 500,
            body: "internal".to_string(),
        })],
        DriverConfig::default(),
    );

    h.conversation.start_recording()?;
    h.recognizer.finalize_with("hi");
    h.conversation.stop_recording()?;

    let done = h
        .conversation
        .wait_for(|s| s.phase == Phase::Idle && s.messages.len() == 2)
        .await?;

    assert_eq!(done.messages[1].text, APOLOGY_TEXT);
    assert_eq!(h.capture.acquired(), 1, "microphone not re-acquired");
    assert!(h.engine.spoken_texts().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_speech() -> anyhow::Result<()> {
    // Scenario D
    let h = harness(vec![], DriverConfig::default());

    h.conversation.start_recording()?;
    h.conversation.wait_for(|s| s.phase == Phase::Recording).await?;
    h.conversation.stop_recording()?;

    let done = h
        .conversation
        .wait_for(|s| s.phase == Phase::Idle && s.session.is_none())
        .await?;

    assert!(done.messages.is_empty());
    assert_eq!(h.capture.released(), 1);
    assert!(h.client.sent().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_finalize_timeout_sends_last_transcript() -> anyhow::Result<()> {
    let h = harness(
        vec![Ok("Nice.".to_string())],
        DriverConfig {
            finalize_timeout: Duration::from_secs(2),
            ..DriverConfig::default()
        },
    );
    h.recognizer.hang_on_stop.store(true, Ordering::SeqCst);

    h.conversation.start_recording()?;
    h.recognizer
        .emit(RecognitionEvent::Interim("half a sentence".to_string()))
        .await;
    h.conversation
        .wait_for(|s| s.transcript == "half a sentence")
        .await?;

    h.conversation.stop_recording()?;
    h.conversation.wait_for(|s| s.phase == Phase::Transcribing).await?;

    let done = h
        .conversation
        .wait_for(|s| s.phase == Phase::Idle && s.messages.len() == 2)
        .await?;
    assert_eq!(done.messages[0].text, "half a sentence");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_microphone_denied_shows_notice() -> anyhow::Result<()> {
    let h = harness(vec![], DriverConfig::default());
    *h.capture.fail_with.lock().unwrap() = Some(VoiceError::PermissionDenied("denied".into()));

    h.conversation.start_recording()?;
    let done = h.conversation.wait_for(|s| s.notice.is_some()).await?;

    assert_eq!(done.phase, Phase::Idle);
    assert!(done.messages.is_empty());
    assert_eq!(h.recognizer.starts(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_recognizer_releases_microphone() -> anyhow::Result<()> {
    let h = harness(vec![], DriverConfig::default());
    *h.recognizer.fail_with.lock().unwrap() =
        Some(VoiceError::UnsupportedEngine(EngineKind::Recognition));

    h.conversation.start_recording()?;
    let done = h.conversation.wait_for(|s| s.notice.is_some()).await?;

    assert_eq!(done.phase, Phase::Idle);
    assert_eq!(
        done.notice.as_deref(),
        Some("Speech Recognition not supported on this platform.")
    );
    assert_eq!(h.capture.acquired(), 1);
    assert_eq!(h.capture.released(), 1);
    assert_eq!(h.conversation.level(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_recognition_error_returns_to_idle() -> anyhow::Result<()> {
    let h = harness(vec![], DriverConfig::default());

    h.conversation.start_recording()?;
    h.conversation.wait_for(|s| s.phase == Phase::Recording).await?;
    h.recognizer
        .emit(RecognitionEvent::Failed(RecognitionError::NoMatch))
        .await;

    let done = h.conversation.wait_for(|s| s.phase == Phase::Idle).await?;
    assert!(done.messages.is_empty());
    assert!(done.notice.is_none());
    assert_eq!(h.capture.released(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_seconds_and_pause() -> anyhow::Result<()> {
    let h = harness(vec![], DriverConfig::default());

    h.conversation.start_recording()?;
    h.conversation.wait_for(|s| s.phase == Phase::Recording).await?;

    tokio::time::sleep(Duration::from_millis(2500)).await;
    h.conversation.pause_recording()?;
    let paused = h
        .conversation
        .wait_for(|s| s.session.as_ref().is_some_and(|r| r.paused))
        .await?;
    let frozen = paused.session.unwrap().elapsed_seconds;
    assert_eq!(frozen, 2);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(
        h.conversation.snapshot().session.unwrap().elapsed_seconds,
        frozen
    );

    h.conversation.resume_recording()?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let resumed = h.conversation.snapshot().session.unwrap();
    assert!(!resumed.paused);
    assert!(resumed.elapsed_seconds > frozen);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_selected_language_is_recognizer_hint() -> anyhow::Result<()> {
    let h = harness(vec![], DriverConfig::default());

    h.conversation.select_language(Some(LanguageTag::new("hi-IN")))?;
    h.conversation
        .wait_for(|s| s.selected_language.is_some())
        .await?;

    h.conversation.start_recording()?;
    h.conversation.wait_for(|s| s.phase == Phase::Recording).await?;

    let hints = h.recognizer.hints.lock().unwrap().clone();
    assert_eq!(hints, vec![Some(LanguageTag::new("hi-IN"))]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_everything() -> anyhow::Result<()> {
    let h = harness(vec![], DriverConfig::default());

    h.conversation.start_recording()?;
    h.conversation.wait_for(|s| s.phase == Phase::Recording).await?;

    h.conversation.shutdown()?;
    h.driver.await?;

    assert_eq!(h.capture.released(), 1);
    assert!(h.recognizer.stops() >= 1);
    assert!(h.conversation.start_recording().is_err(), "driver is gone");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_busy_recognizer_is_not_stopped() -> anyhow::Result<()> {
    let h = harness(vec![], DriverConfig::default());
    *h.recognizer.fail_with.lock().unwrap() = Some(VoiceError::RecognizerBusy);

    h.conversation.start_recording()?;
    let done = h.conversation.wait_for(|s| s.notice.is_some()).await?;

    assert_eq!(done.phase, Phase::Idle);
    assert_eq!(done.notice.as_deref(), Some("Speech recognition is already in use."));
    assert_eq!(h.capture.released(), 1);
    assert_eq!(h.recognizer.stops(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_control_requests_report_verdict() -> anyhow::Result<()> {
    let h = harness(vec![], DriverConfig::default());

    match h.conversation.request(Event::StopRecording).await? {
        ControlReply::Rejected(reason) => assert_eq!(reason, "No recording in progress"),
        other => panic!("expected rejection, got {:?}", other),
    }

    // Fire-and-forget start queued ahead of the selection
    h.conversation.start_recording()?;
    match h
        .conversation
        .request(Event::SelectLanguage(Some(LanguageTag::new("ta-IN"))))
        .await?
    {
        ControlReply::Rejected(reason) => {
            assert_eq!(reason, "Language cannot change while recording")
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(h.conversation.snapshot().selected_language.is_none());

    match h.conversation.request(Event::PauseRecording).await? {
        ControlReply::Accepted(snapshot) => {
            assert_eq!(snapshot.phase, Phase::Recording);
            assert!(snapshot.session.unwrap().paused);
        }
        other => panic!("expected acceptance, got {:?}", other),
    }

    Ok(())
}
