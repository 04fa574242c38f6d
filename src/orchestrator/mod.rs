//! Voice conversation orchestration
//!
//! This module coordinates one conversation:
//! - Microphone capture and level metering
//! - Speech recognition and language auto-detection
//! - Turn-taking with the conversation endpoint
//! - Segmented playback of replies
//! - The visible message log

mod driver;
mod machine;
mod state;

pub use driver::{ControlReply, ConversationDriver, ConversationHandle, DriverConfig, Platform};
pub use machine::{ConversationMachine, APOLOGY_TEXT};
pub use state::{
    Command, ConversationSnapshot, Event, Generation, Notice, Phase, RecordingSession, TurnId,
};
