pub mod backend;
pub mod file;
pub mod level;

pub use backend::{AudioFrame, CaptureConfig, MicStream, MicrophoneCapture};
pub use file::{AudioFile, FileCapture};
pub use level::{frame_level, LevelMeter, LevelMeterHandle};
