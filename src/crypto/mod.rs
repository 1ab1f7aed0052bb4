//! Cryptographic primitives for the vault.
//!
//! Provides key derivation, authenticated encryption and the envelope
//! string format.

pub mod aead;
pub mod envelope;
pub mod kdf;
pub mod key;

pub use aead::{decrypt, encrypt, generate_nonce, generate_salt};
pub use envelope::Envelope;
pub use kdf::{KdfParams, derive_key, fingerprint};
pub use key::{Fingerprint, KeyMaterial};

/// Length of the salt (16 bytes / 128 bits).
pub const SALT_LEN: usize = 16;
/// Length of the nonce (24 bytes for XChaCha20-Poly1305).
pub const NONCE_LEN: usize = 24;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;
/// Length of a SHA-256 key fingerprint.
pub const FINGERPRINT_LEN: usize = 32;
