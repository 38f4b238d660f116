//! Token lifecycle: save, use-for-update, delete.
//!
//! ```text
//! ABSENT --save--> SAVED --update-bio--> SAVED ... --delete--> DELETED
//! ```
//!
//! Plaintext exists only between `decrypt` and the end of the single
//! `Relay::forward` call that consumes it. It is never written to the store,
//! logged, or returned.

use crate::credentials::{decrypt, encrypt, AuthenticationFailure, SecretKey, TokenStore};
use crate::relay::{BioUpdate, Outcome, Relay};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Errors from lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Bad or missing caller input
    #[error("validation failed: {0}")]
    Validation(&'static str),

    #[error("token {0} not found")]
    NotFound(i64),

    /// Stored envelope could not be opened (corruption or key mismatch)
    #[error("failed to decrypt token: {0}")]
    Decryption(#[from] AuthenticationFailure),

    #[error("upstream rejected request with status {status}")]
    UpstreamRejected { status: u16, body: Value },

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("encryption error: {0:#}")]
    Encryption(anyhow::Error),
}

/// Orchestrates the cipher envelope, the token store and the upstream relay.
///
/// Holds no per-request state; every call reads what it needs from the store.
pub struct TokenService {
    key: Arc<SecretKey>,
    store: Arc<TokenStore>,
    relay: Arc<dyn Relay>,
}

impl TokenService {
    pub fn new(key: Arc<SecretKey>, store: Arc<TokenStore>, relay: Arc<dyn Relay>) -> Self {
        Self { key, store, relay }
    }

    /// Encrypts and stores a token. Returns the new record id.
    pub fn save(&self, token: &str, label: &str) -> Result<i64, LifecycleError> {
        if token.is_empty() {
            return Err(LifecycleError::Validation("token required"));
        }

        let envelope = encrypt(token, &self.key).map_err(LifecycleError::Encryption)?;
        let id = self
            .store
            .insert(label, &envelope)
            .map_err(LifecycleError::Storage)?;

        info!(id, label = %label, "Token saved");
        Ok(id)
    }

    /// Decrypts the stored token and relays one bio update with it.
    ///
    /// Decryption happens before the relay is consulted, mock mode included,
    /// so a corrupted envelope always surfaces as `Decryption`.
    ///
    /// # Returns
    /// * `Ok(Value)` - Upstream (or mock) response body
    /// * `Err(NotFound)` - No record with this id
    /// * `Err(Decryption)` - Envelope failed authentication
    /// * `Err(UpstreamRejected | Transport)` - Relay did not succeed
    pub async fn update_bio(&self, id: i64, new_bio: &str) -> Result<Value, LifecycleError> {
        let record = self
            .store
            .get(id)
            .map_err(LifecycleError::Storage)?
            .ok_or(LifecycleError::NotFound(id))?;

        let token = decrypt(&record.encrypted_token, &self.key).map_err(|e| {
            error!(id, reason = e.reason(), "Token decryption failed");
            LifecycleError::Decryption(e)
        })?;

        let update = BioUpdate {
            bio: new_bio.to_string(),
        };

        // `token` moves into the relay and is wiped when forward returns
        match self.relay.forward(token, &update).await {
            Outcome::Success(body) => {
                info!(id, "Bio updated");
                Ok(body)
            }
            Outcome::UpstreamRejected { status, body } => {
                warn!(id, status, "Bio update rejected upstream");
                Err(LifecycleError::UpstreamRejected { status, body })
            }
            Outcome::TransportError(message) => Err(LifecycleError::Transport(message)),
        }
    }

    /// Deletes a record. Returns 1 if it existed, 0 otherwise.
    pub fn delete(&self, id: i64) -> Result<usize, LifecycleError> {
        let deleted = self.store.delete(id).map_err(LifecycleError::Storage)?;
        info!(id, deleted, "Token delete");
        Ok(deleted)
    }
}
