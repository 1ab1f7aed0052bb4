//! Text-in, text-out authenticated encryption under a loaded master key.

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::crypto::{self, Envelope, KeyMaterial};
use crate::error::{Result, VaultError};

/// Encrypts UTF-8 payloads into envelope strings and back.
///
/// Holds a shared handle to the key, so an engine obtained before a `lock`
/// finishes its work with the key it started with.
#[derive(Debug, Clone)]
pub struct CipherEngine {
    key: Arc<KeyMaterial>,
}

impl CipherEngine {
    pub fn new(key: Arc<KeyMaterial>) -> Self {
        Self { key }
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    ///
    /// Encrypting the same text twice yields different envelopes.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let (ciphertext, nonce) = crypto::encrypt(&self.key, plaintext.as_bytes())?;
        Ok(Envelope::new(nonce, ciphertext).to_string())
    }

    /// Decrypts an envelope produced by [`CipherEngine::encrypt`].
    ///
    /// # Errors
    ///
    /// * [`VaultError::MalformedEnvelope`] if the string is not a well-formed
    ///   envelope or the authenticated payload is not UTF-8.
    /// * [`VaultError::DecryptionFailed`] on a wrong key or tampered data.
    pub fn decrypt(&self, envelope: &str) -> Result<Zeroizing<String>> {
        let envelope: Envelope = envelope.parse()?;
        let plaintext = crypto::decrypt(&self.key, envelope.nonce(), envelope.ciphertext())?;

        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| VaultError::MalformedEnvelope("payload is not valid UTF-8"))?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}
