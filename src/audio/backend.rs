use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::error::VoiceResult;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Root-mean-square amplitude normalized to 0.0..=1.0
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let sum: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let v = s as f64 / i16::MAX as f64;
                v * v
            })
            .sum();

        ((sum / self.samples.len() as f64).sqrt() as f32).min(1.0)
    }
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Frame duration in milliseconds (affects latency)
    pub frame_ms: u64,
    /// How many frames subscribers may fall behind before frames are dropped
    pub fanout_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_ms: 100,
            fanout_capacity: 64,
        }
    }
}

struct StreamInner {
    released: AtomicBool,
    producer: Mutex<Option<JoinHandle<()>>>,
}

impl StreamInner {
    fn stop_tracks(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        let producer = match self.producer.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = producer {
            task.abort();
        }
        true
    }
}

impl Drop for StreamInner {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// A live microphone stream.
///
/// Frames fan out to every subscriber (level meter, recognizer). Tracks stop
/// when the stream is released or the last handle is dropped.
#[derive(Clone)]
pub struct MicStream {
    id: Uuid,
    track_count: usize,
    frames: broadcast::Sender<AudioFrame>,
    inner: Arc<StreamInner>,
}

impl MicStream {
    /// Wrap a frame sender; `producer` is the task feeding it, aborted on release
    pub fn new(
        track_count: usize,
        frames: broadcast::Sender<AudioFrame>,
        producer: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            track_count,
            frames,
            inner: Arc::new(StreamInner {
                released: AtomicBool::new(false),
                producer: Mutex::new(producer),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of audio tracks; zero means the stream carries no audio
    pub fn track_count(&self) -> usize {
        self.track_count
    }

    pub fn has_audio(&self) -> bool {
        self.track_count > 0
    }

    /// Receive frames from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<AudioFrame> {
        self.frames.subscribe()
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Stop all tracks. Returns `false` when the stream was already released.
    pub fn stop_tracks(&self) -> bool {
        let stopped = self.inner.stop_tracks();
        if stopped {
            info!("Microphone stream {} released", self.id);
        }
        stopped
    }
}

impl std::fmt::Debug for MicStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicStream")
            .field("id", &self.id)
            .field("track_count", &self.track_count)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Microphone access
///
/// Implementations:
/// - File: replay a WAV file in real time (testing, headless hosts)
#[async_trait::async_trait]
pub trait MicrophoneCapture: Send + Sync {
    /// Open the microphone, prompting for permission if the platform does
    async fn acquire(&mut self) -> VoiceResult<MicStream>;

    /// Stop every track of `stream`; safe to call on an already released stream
    async fn release(&mut self, stream: &MicStream) -> VoiceResult<()> {
        stream.stop_tracks();
        Ok(())
    }

    /// Get backend name for logging
    fn name(&self) -> &str;
}
