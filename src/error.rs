//! Error type shared by every vault component.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Message shown to end users for any failed unlock, whether the password
/// was wrong or the key file is damaged.
const UNLOCK_FAILED: &str = "unable to unlock vault: wrong password or damaged key file";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault is not initialized: no key file at {}", .path.display())]
    NotInitialized { path: PathBuf },

    #[error("vault is already initialized at {}; use reset to replace the master password", .path.display())]
    AlreadyInitialized { path: PathBuf },

    #[error("key file {} is corrupt: {reason}", .path.display())]
    KeyFileCorrupt { path: PathBuf, reason: String },

    #[error("invalid master password")]
    InvalidCredential,

    #[error("master key is not loaded")]
    KeyNotLoaded,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    /// Wrong key, tampering and corruption are deliberately indistinguishable.
    #[error("decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("encryption failed")]
    Encryption,

    #[error("invalid key derivation parameters: {0}")]
    InvalidKdfParams(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("OS random generator unavailable")]
    Random,

    #[error("credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("remote store error: {0}")]
    Remote(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fieldless classification of [`VaultError`], convenient for matching in
/// callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotInitialized,
    AlreadyInitialized,
    KeyFileCorrupt,
    InvalidCredential,
    KeyNotLoaded,
    MalformedEnvelope,
    DecryptionFailed,
    Encryption,
    InvalidKdfParams,
    KeyDerivation,
    Random,
    CredentialUnavailable,
    Remote,
    Serialization,
    Io,
}

impl VaultError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::KeyFileCorrupt {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized { .. } => ErrorKind::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorKind::AlreadyInitialized,
            Self::KeyFileCorrupt { .. } => ErrorKind::KeyFileCorrupt,
            Self::InvalidCredential => ErrorKind::InvalidCredential,
            Self::KeyNotLoaded => ErrorKind::KeyNotLoaded,
            Self::MalformedEnvelope(_) => ErrorKind::MalformedEnvelope,
            Self::DecryptionFailed => ErrorKind::DecryptionFailed,
            Self::Encryption => ErrorKind::Encryption,
            Self::InvalidKdfParams(_) => ErrorKind::InvalidKdfParams,
            Self::KeyDerivation(_) => ErrorKind::KeyDerivation,
            Self::Random => ErrorKind::Random,
            Self::CredentialUnavailable(_) => ErrorKind::CredentialUnavailable,
            Self::Remote(_) => ErrorKind::Remote,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Message suitable for end users.
    ///
    /// A corrupt key file and a wrong password produce the same text; the
    /// full [`Display`](std::fmt::Display) form keeps them apart for logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::KeyFileCorrupt { .. } | Self::InvalidCredential => UNLOCK_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
