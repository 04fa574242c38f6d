use crate::orchestrator::ConversationHandle;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Control surface of the running conversation
    pub conversation: ConversationHandle,
}

impl AppState {
    pub fn new(conversation: ConversationHandle) -> Self {
        Self { conversation }
    }
}
