//! HTTP API server for driving the conversation from a UI
//!
//! - POST /conversation/record/start - Start recording an utterance
//! - POST /conversation/record/stop - Stop recording and send the utterance
//! - POST /conversation/record/pause - Freeze the elapsed-time counter
//! - POST /conversation/record/resume - Unfreeze it
//! - PUT /conversation/language - Select a language (`null` for auto-detect)
//! - GET /conversation/status - Current phase, session and transcript
//! - GET /conversation/messages - Message history
//! - GET /conversation/level - Microphone level (0-100)
//! - GET /health - Health check
//!
//! Control requests answer once the driver has applied them: 200 with the
//! resulting phase, 409 when the current phase does not allow them, 503 once
//! the driver has stopped.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
