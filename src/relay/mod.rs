//! Upstream relay: forwards a bio update to the upstream API on the caller's behalf.
//!
//! Two implementations:
//! - [`MockRelay`] when no upstream URL is configured (no network I/O)
//! - [`HttpRelay`] for a live upstream endpoint
//!
//! A relay takes the decrypted token by value. Ownership ends inside the one
//! `forward` call, so the `RevealedToken` buffer is wiped by the time that call
//! returns, whatever the outcome. The live relay also copies the token into the
//! request's `Authorization` header; that copy belongs to reqwest and is freed,
//! not wiped, once the request completes.

mod http;
mod mock;

pub use http::HttpRelay;
pub use mock::MockRelay;

use crate::config::UpstreamConfig;
use crate::credentials::RevealedToken;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// JSON body sent upstream.
#[derive(Debug, Clone, Serialize)]
pub struct BioUpdate {
    pub bio: String,
}

/// Normalized result of one relay call.
#[derive(Debug)]
pub enum Outcome {
    /// Upstream answered 2xx. Body is the parsed JSON or a `{status_code, text}` fallback.
    Success(Value),
    /// Upstream answered non-2xx.
    UpstreamRejected { status: u16, body: Value },
    /// The request never produced a response (connect error, timeout, broken body).
    TransportError(String),
}

/// Performs exactly one outbound call per `forward`. Never retries.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn forward(&self, token: RevealedToken, update: &BioUpdate) -> Outcome;

    /// True when the relay does not talk to a real upstream.
    fn is_mock(&self) -> bool {
        false
    }
}

/// Picks the relay for the configured upstream. No URL (or an empty one) means mock mode.
pub fn from_config(config: &UpstreamConfig) -> Result<Arc<dyn Relay>> {
    match config.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            info!(url = %url, timeout_seconds = config.timeout_seconds, "Upstream relay: live mode");
            let relay = HttpRelay::new(url, Duration::from_secs(config.timeout_seconds))?;
            Ok(Arc::new(relay))
        }
        _ => {
            info!("Upstream relay: MOCK mode (no TARGET_API_URL configured)");
            Ok(Arc::new(MockRelay))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_selects_mock() {
        let config = UpstreamConfig {
            url: None,
            timeout_seconds: 10,
        };
        assert!(from_config(&config).unwrap().is_mock());

        let config = UpstreamConfig {
            url: Some("   ".to_string()),
            timeout_seconds: 10,
        };
        assert!(from_config(&config).unwrap().is_mock());
    }

    #[test]
    fn test_url_selects_live() {
        let config = UpstreamConfig {
            url: Some("https://api.example.com/v1/profile/bio".to_string()),
            timeout_seconds: 10,
        };
        assert!(!from_config(&config).unwrap().is_mock());
    }

    #[test]
    fn test_bio_update_wire_shape() {
        let update = BioUpdate {
            bio: "hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"bio": "hello"})
        );
    }
}
