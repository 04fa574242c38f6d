use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{VoiceError, VoiceResult};

/// Reply used when the endpoint answers successfully but says nothing usable
pub const FALLBACK_REPLY: &str = "No response received.";

/// Remote conversational partner
#[async_trait::async_trait]
pub trait ConversationClient: Send + Sync {
    /// Send one user utterance and return the partner's reply.
    ///
    /// Success always yields some text; a malformed or empty body becomes
    /// [`FALLBACK_REPLY`].
    async fn send(&self, message: &str) -> VoiceResult<String>;
}

#[derive(Debug, Serialize)]
struct ConversationRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConversationReply {
    #[serde(default)]
    solution: Option<String>,
}

/// JSON-over-HTTP conversation endpoint: `POST {message}` → `{solution}`
pub struct HttpConversationClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpConversationClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> VoiceResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.into();

        info!("Conversation endpoint: {}", endpoint);

        Ok(Self { client, endpoint })
    }

    fn extract_reply(body: &str) -> String {
        match serde_json::from_str::<ConversationReply>(body) {
            Ok(ConversationReply {
                solution: Some(solution),
            }) if !solution.trim().is_empty() => solution,
            Ok(_) => {
                debug!("Reply carried no solution, using fallback");
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                warn!("Malformed reply body ({}), using fallback", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl ConversationClient for HttpConversationClient {
    async fn send(&self, message: &str) -> VoiceResult<String> {
        debug!("Sending {} chars to conversation endpoint", message.len());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ConversationRequest { message })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(VoiceError::Server {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Self::extract_reply(&body))
    }
}
