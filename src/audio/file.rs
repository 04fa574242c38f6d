use anyhow::{Context, Result};
use hound::WavReader;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::backend::{AudioFrame, CaptureConfig, MicStream, MicrophoneCapture};
use crate::error::{VoiceError, VoiceResult};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split the file into frames of `frame_ms`, timestamped from zero
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let per_frame = (self.sample_rate as u64 * frame_ms / 1000) as usize
            * self.channels.max(1) as usize;
        if per_frame == 0 {
            return Vec::new();
        }

        self.samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Microphone stand-in that replays a WAV file at real-time pace
pub struct FileCapture {
    path: PathBuf,
    config: CaptureConfig,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Probe the file the way a device open would fail
    fn check_access(&self) -> VoiceResult<()> {
        match std::fs::File::open(&self.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(VoiceError::PermissionDenied(self.path.display().to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(VoiceError::DeviceUnavailable(
                format!("{} does not exist", self.path.display()),
            )),
            Err(e) => Err(VoiceError::DeviceUnavailable(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait::async_trait]
impl MicrophoneCapture for FileCapture {
    async fn acquire(&mut self) -> VoiceResult<MicStream> {
        self.check_access()?;

        let audio = AudioFile::open(&self.path).map_err(|e| {
            VoiceError::DeviceUnavailable(format!("{}: {:#}", self.path.display(), e))
        })?;
        let frames = audio.frames(self.config.frame_ms);
        let track_count = if audio.channels > 0 && !frames.is_empty() { 1 } else { 0 };

        let (tx, _) = broadcast::channel(self.config.fanout_capacity.max(1));
        let producer_tx = tx.clone();
        let frame_period = Duration::from_millis(self.config.frame_ms.max(1));

        let producer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_period);
            for frame in frames {
                ticker.tick().await;
                // No subscribers is fine, the frame is simply not heard
                let _ = producer_tx.send(frame);
            }
            debug!("File capture reached end of input");
        });

        info!(
            "File capture started: {} ({}Hz, {} channels)",
            audio.path, audio.sample_rate, audio.channels
        );

        Ok(MicStream::new(track_count, tx, Some(producer)))
    }

    fn name(&self) -> &str {
        "WAV file replay"
    }
}
