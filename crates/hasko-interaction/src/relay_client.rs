//! HTTP client for the inference relay backend.
//!
//! Two endpoints: `GET /models` lists available model identifiers and
//! `POST /send-message` relays a chat message, answering with a chunked
//! plain-text stream of the assistant's reply.

use crate::decode::Utf8Accumulator;
use async_trait::async_trait;
use futures::StreamExt;
use hasko_core::chat::{ChatBackend, ReplyStream, SendMessageRequest};
use hasko_core::error::{HaskoError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// Buffered snapshots between the reader task and the consumer. Arrival
/// order is preserved; the consumer applies back-pressure through the
/// channel, chunks are never reordered or dropped.
const REPLY_CHANNEL_CAPACITY: usize = 32;

/// Client for the relay backend, implementing [`ChatBackend`].
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<String>,
}

impl RelayClient {
    /// Creates a client against the given base URL.
    ///
    /// `request_timeout` bounds connection establishment for all requests
    /// and the whole `/models` round trip. The `/send-message` request
    /// deliberately gets only the connect bound: reqwest's per-request
    /// timeout covers the full body read, and generation may legitimately
    /// stream for longer than any fixed deadline.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }
}

#[async_trait]
impl ChatBackend for RelayClient {
    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HaskoError::http(format!("GET /models returned {}", status)));
        }

        let parsed: ModelsResponse = response.json().await?;
        tracing::debug!("Relay reported {} models", parsed.models.len());
        Ok(parsed.models)
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<ReplyStream> {
        let url = format!("{}/send-message", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HaskoError::http(format!(
                "POST /send-message returned {}",
                status
            )));
        }

        let (tx, rx) = mpsc::channel(REPLY_CHANNEL_CAPACITY);
        let mut body = response.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = Utf8Accumulator::new();
            let mut accumulated = String::new();

            while let Some(chunk) = body.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        // A mid-stream transport failure ends the sequence;
                        // whatever accumulated so far stands.
                        tracing::warn!("Reply stream ended early: {}", e);
                        break;
                    }
                };

                let decoded = decoder.push(&bytes);
                if decoded.is_empty() {
                    continue;
                }
                accumulated.push_str(&decoded);

                // Each snapshot carries the entire accumulated text to date.
                if tx.send(accumulated.clone()).await.is_err() {
                    // Receiver dropped; release the response stream.
                    break;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_stripped() {
        let client = RelayClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_models_response_shape() {
        let parsed: ModelsResponse =
            serde_json::from_str(r#"{"models": ["llama3", "mistral"]}"#).unwrap();
        assert_eq!(parsed.models, vec!["llama3", "mistral"]);
    }
}
