use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::language::LanguageTag;
use crate::orchestrator::DriverConfig;
use crate::speech::RecognizerConfig;
use crate::synthesis::{OverlapPolicy, SynthesizerConfig};

/// Prefix for environment overrides, e.g. `VOICE_TUTOR__NATS__URL`
pub const ENV_PREFIX: &str = "VOICE_TUTOR";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub nats: NatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Chat endpoint taking `{"message"}` and answering `{"solution"}`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Assistant message that opens the conversation; empty for none
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Fixed conversation language; unset means auto-detect
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            greeting: default_greeting(),
            language: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub continuous: bool,
    #[serde(default = "default_finalize_grace_ms")]
    pub finalize_grace_ms: u64,
    #[serde(default = "default_finalize_timeout_ms")]
    pub finalize_timeout_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            finalize_grace_ms: default_finalize_grace_ms(),
            finalize_timeout_ms: default_finalize_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
    #[serde(default = "default_catalog_wait_ms")]
    pub catalog_wait_ms: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            overlap_policy: OverlapPolicy::default(),
            catalog_wait_ms: default_catalog_wait_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// WAV file replayed as the microphone
    #[serde(default = "default_input_path")]
    pub input_path: String,
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    #[serde(default = "default_level_fps")]
    pub level_fps: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            frame_ms: default_frame_ms(),
            level_fps: default_level_fps(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_nats_url")]
    pub url: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
        }
    }
}

fn default_service_name() -> String {
    "voice-tutor".to_string()
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3100
}

fn default_endpoint() -> String {
    "http://localhost:8000/chat".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_greeting() -> String {
    "Hello! I'm your AI language partner. Tap the mic and speak to start a voice conversation."
        .to_string()
}

fn default_finalize_grace_ms() -> u64 {
    1500
}

fn default_finalize_timeout_ms() -> u64 {
    3000
}

fn default_catalog_wait_ms() -> u64 {
    5000
}

fn default_input_path() -> String {
    "fixtures/microphone.wav".to_string()
}

fn default_frame_ms() -> u64 {
    100
}

fn default_level_fps() -> u32 {
    60
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

impl Config {
    /// Load `path` (any extension the `config` crate understands, optional)
    /// and apply `VOICE_TUTOR__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            frame_ms: self.audio.frame_ms,
            ..CaptureConfig::default()
        }
    }

    pub fn recognizer(&self) -> RecognizerConfig {
        RecognizerConfig {
            continuous: self.speech.continuous,
            finalize_grace: Duration::from_millis(self.speech.finalize_grace_ms),
        }
    }

    pub fn synthesizer(&self) -> SynthesizerConfig {
        SynthesizerConfig {
            policy: self.synthesis.overlap_policy,
            catalog_wait: Duration::from_millis(self.synthesis.catalog_wait_ms),
        }
    }

    pub fn driver(&self) -> DriverConfig {
        let greeting = self.conversation.greeting.trim();
        DriverConfig {
            greeting: (!greeting.is_empty()).then(|| greeting.to_string()),
            language: self
                .conversation
                .language
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("auto"))
                .map(LanguageTag::new),
            finalize_timeout: Duration::from_millis(self.speech.finalize_timeout_ms),
            level_fps: self.audio.level_fps,
            ..DriverConfig::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.conversation.timeout_secs)
    }
}
