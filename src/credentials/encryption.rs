//! AES-256-GCM envelope encryption for stored access tokens.
//!
//! An envelope is `base64(nonce || ciphertext || tag)`: a fresh 12-byte nonce
//! is generated for every call, so the envelope is self-contained and only the
//! key is needed to open it again.

use super::RevealedToken;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes
const TAG_SIZE: usize = 16;

/// Process-wide symmetric key used to seal and open envelopes.
///
/// Held in memory only. The bytes are wiped when the key is dropped and
/// `Debug` never prints them.
pub struct SecretKey(Zeroizing<[u8; KEY_SIZE]>);

impl SecretKey {
    /// Parses a hex-encoded key (64 hex characters).
    ///
    /// # Returns
    /// * `Ok(SecretKey)` - Decoded 32-byte key
    /// * `Err` - If the value is not hex or does not decode to exactly 32 bytes
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let mut decoded = hex::decode(key_hex.trim())
            .context("Encryption key must be valid hex")?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(anyhow!(
                "Encryption key must be {} bytes ({} hex chars), got {} bytes",
                KEY_SIZE,
                KEY_SIZE * 2,
                len
            ));
        }

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(&decoded);
        decoded.zeroize();

        Ok(Self(key))
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.0.as_slice()))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Opening an envelope failed.
///
/// Covers tag mismatch (tampered data or wrong key) as well as malformed
/// envelopes. The reason is safe to log; it never contains envelope bytes.
#[derive(Debug, thiserror::Error)]
#[error("envelope authentication failed: {reason}")]
pub struct AuthenticationFailure {
    reason: &'static str,
}

impl AuthenticationFailure {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

/// Seals `plaintext` into a base64 envelope.
///
/// Uses a fresh random nonce per call, so sealing the same plaintext twice
/// yields different envelopes. No associated data is bound.
pub fn encrypt(plaintext: &str, key: &SecretKey) -> Result<String> {
    let cipher = key.cipher();

    // Generate random nonce (never reuse!)
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&envelope))
}

/// Opens a base64 envelope produced by [`encrypt`].
///
/// # Returns
/// * `Ok(RevealedToken)` - Recovered plaintext
/// * `Err(AuthenticationFailure)` - Bad encoding, truncated envelope, wrong key,
///   tampered bytes, or plaintext that is not UTF-8
pub fn decrypt(envelope: &str, key: &SecretKey) -> Result<RevealedToken, AuthenticationFailure> {
    let raw = BASE64
        .decode(envelope)
        .map_err(|_| AuthenticationFailure::new("envelope is not valid base64"))?;

    if raw.len() < NONCE_SIZE + TAG_SIZE {
        return Err(AuthenticationFailure::new("envelope too short"));
    }

    let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| AuthenticationFailure::new("tag verification failed"))?;

    match String::from_utf8(plaintext) {
        Ok(token) => Ok(RevealedToken::new(token)),
        Err(e) => {
            e.into_bytes().zeroize();
            Err(AuthenticationFailure::new("plaintext is not valid UTF-8"))
        }
    }
}
