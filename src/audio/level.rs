// Streaming input level for visual feedback
//
// The meter samples the most recent frame once per render tick and maps its
// RMS onto a 0-100 scale (-60 dBFS and below reads as 0). It only observes
// frames and runs independently of recognition.

use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::backend::{AudioFrame, MicStream};

/// Quietest level, in dBFS, that still registers above zero
const FLOOR_DBFS: f32 = -60.0;

/// Convert a frame to a 0-100 level
pub fn frame_level(frame: &AudioFrame) -> u8 {
    let rms = frame.rms();
    if rms <= 0.0 {
        return 0;
    }
    let dbfs = 20.0 * rms.log10();
    let scaled = (dbfs - FLOOR_DBFS) / -FLOOR_DBFS * 100.0;
    scaled.clamp(0.0, 100.0).round() as u8
}

/// Publishes levels for whichever stream is currently attached
pub struct LevelMeter {
    cadence: Duration,
    level_tx: watch::Sender<u8>,
}

impl LevelMeter {
    /// `fps` is the number of samples per second (one per render frame)
    pub fn new(fps: u32) -> Self {
        let (level_tx, _) = watch::channel(0);
        Self {
            cadence: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            level_tx,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Observe levels; stays valid across attach/detach cycles
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.level_tx.subscribe()
    }

    /// Start sampling `stream`
    pub fn attach(&self, stream: &MicStream) -> LevelMeterHandle {
        let level_tx = self.level_tx.clone();
        let cadence = self.cadence;

        if !stream.has_audio() {
            debug!("Stream {} has no audio tracks, level stays at zero", stream.id());
            level_tx.send_replace(0);
            return LevelMeterHandle {
                task: None,
                level_tx,
            };
        }

        let frames = stream.subscribe();
        let task = tokio::spawn(Self::sample(frames, level_tx.clone(), cadence));

        info!("Level meter attached to stream {}", stream.id());

        LevelMeterHandle {
            task: Some(task),
            level_tx,
        }
    }

    async fn sample(
        mut frames: broadcast::Receiver<AudioFrame>,
        level_tx: watch::Sender<u8>,
        cadence: Duration,
    ) {
        let mut ticker = tokio::time::interval(cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            // Keep only the newest frame received since the last tick
            let mut latest = None;
            loop {
                match frames.try_recv() {
                    Ok(frame) => latest = Some(frame),
                    Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                    Err(broadcast::error::TryRecvError::Empty) => break,
                    Err(broadcast::error::TryRecvError::Closed) => {
                        level_tx.send_replace(0);
                        return;
                    }
                }
            }

            if let Some(frame) = latest {
                level_tx.send_replace(frame_level(&frame));
            }
        }
    }
}

/// A running sampling loop; detach to stop it
pub struct LevelMeterHandle {
    task: Option<JoinHandle<()>>,
    level_tx: watch::Sender<u8>,
}

impl LevelMeterHandle {
    /// Stop sampling and reset the level to zero; safe to call repeatedly
    pub fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Level meter detached");
        }
        self.level_tx.send_replace(0);
    }

    pub fn is_attached(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for LevelMeterHandle {
    fn drop(&mut self) {
        self.detach();
    }
}
