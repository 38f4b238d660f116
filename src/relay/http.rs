//! Live relay: one authenticated POST to the configured upstream URL.

use super::{BioUpdate, Outcome, Relay};
use crate::credentials::RevealedToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Non-JSON upstream bodies are cut to this many characters.
const MAX_TEXT_CHARS: usize = 400;

const USER_AGENT: &str = concat!("bioportal/", env!("CARGO_PKG_VERSION"));

pub struct HttpRelay {
    client: reqwest::Client,
    url: String,
}

impl HttpRelay {
    /// Builds the relay with a client bounded by `timeout` for the whole request.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn forward(&self, token: RevealedToken, update: &BioUpdate) -> Outcome {
        debug!(url = %self.url, "Forwarding bio update upstream");

        let request = self
            .client
            .post(&self.url)
            .bearer_auth(token.expose())
            .json(update);
        drop(token);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Upstream request failed");
                return Outcome::TransportError(e.to_string());
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, status = status.as_u16(), "Failed to read upstream response");
                return Outcome::TransportError(e.to_string());
            }
        };

        let body = normalize_body(status, &text);

        if status.is_success() {
            Outcome::Success(body)
        } else {
            warn!(status = status.as_u16(), "Upstream returned error");
            Outcome::UpstreamRejected {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// Parsed JSON if possible, otherwise `{status_code, text}` with the text truncated.
fn normalize_body(status: StatusCode, text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| {
        serde_json::json!({
            "status_code": status.as_u16(),
            "text": text.chars().take(MAX_TEXT_CHARS).collect::<String>(),
        })
    })
}
