use anyhow::{Context, Result};
use async_nats::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Thin wrapper over the NATS connection shared by the recognizer and speech engine
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Publish a JSON payload
    pub async fn publish_json<T: Serialize>(&self, subject: String, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", subject))?;

        debug!("Published to {}", subject);

        Ok(())
    }

    /// Send a JSON request and decode the JSON reply.
    ///
    /// `timeout: None` waits for the reply indefinitely instead of using the
    /// connection's default request timeout.
    pub async fn request_json<T: Serialize, R: DeserializeOwned>(
        &self,
        subject: String,
        message: &T,
        timeout: Option<Duration>,
    ) -> Result<R> {
        let payload = serde_json::to_vec(message)?;
        let request = async_nats::Request::new()
            .payload(payload.into())
            .timeout(timeout);

        let reply = self
            .client
            .send_request(subject.clone(), request)
            .await
            .with_context(|| format!("Request to {} failed", subject))?;

        serde_json::from_slice(&reply.payload)
            .with_context(|| format!("Malformed reply on {}", subject))
    }

    /// Subscribe to a subject (wildcards allowed)
    pub async fn subscribe(&self, subject: String) -> Result<async_nats::Subscriber> {
        info!("Subscribing to {}", subject);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        Ok(subscriber)
    }

    /// Whether the connection is currently up
    pub fn is_connected(&self) -> bool {
        matches!(
            self.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }
}
