//! Encrypted storage for user-supplied access tokens.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       TokenService (lifecycle)           │
//! │  - save / update-bio / delete            │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!    (encrypt)            (decrypt)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       Encryption Module                  │
//! │  - AES-256-GCM                           │
//! │  - base64(nonce || ciphertext || tag)    │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       TokenStore (SQLite)                │
//! │  - Envelopes at rest, never plaintext    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use bioportal::credentials::{decrypt, encrypt, SecretKey, TokenStore};
//!
//! # fn main() -> anyhow::Result<()> {
//! let key = SecretKey::from_hex(&std::env::var("ENCRYPTION_KEY")?)?;
//! let store = TokenStore::new("tokens.db")?;
//!
//! let id = store.insert("work", &encrypt("ghp_example", &key)?)?;
//!
//! if let Some(record) = store.get(id)? {
//!     let token = decrypt(&record.encrypted_token, &key)?;
//!     assert_eq!(token.expose(), "ghp_example");
//! }
//!
//! store.delete(id)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - Tokens are encrypted at rest with AES-256-GCM, one random nonce per token
//! - The key lives in memory only and is wiped on drop
//! - Decrypted tokens are `RevealedToken` values, wiped on drop and never printed

use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::Zeroizing;

mod encryption;
mod storage;

pub use encryption::{decrypt, encrypt, AuthenticationFailure, SecretKey, KEY_SIZE};
pub use storage::TokenStore;

/// A persisted token entry. Holds only the encrypted envelope.
#[derive(Clone, Debug)]
pub struct TokenRecord {
    pub id: i64,
    pub label: String,
    /// base64 envelope produced by [`encrypt`]
    pub encrypted_token: String,
    /// None when the stored value is missing or unreadable
    pub created_at: Option<DateTime<Utc>>,
}

/// A decrypted access token.
///
/// Exists only while a single update request is being handled. The buffer
/// is zeroed when the value is dropped, and `Debug` never prints it.
pub struct RevealedToken(Zeroizing<String>);

impl RevealedToken {
    pub fn new(token: String) -> Self {
        Self(Zeroizing::new(token))
    }

    /// Borrow the plaintext, e.g. to build an `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for RevealedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RevealedToken([REDACTED])")
    }
}
