//! String form of one encrypted value.
//!
//! ```text
//! <hex nonce, 48 chars>:<standard base64 of ciphertext || tag>
//! ```
//!
//! Neither alphabet contains `:`, so the separator is unambiguous.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD};

use super::{NONCE_LEN, TAG_LEN};
use crate::error::VaultError;

pub const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn new(nonce: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Self {
        Self { nonce, ciphertext }
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}",
            hex::encode(self.nonce),
            STANDARD.encode(&self.ciphertext)
        )
    }
}

impl FromStr for Envelope {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(SEPARATOR);
        let (Some(nonce), Some(ciphertext), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(VaultError::MalformedEnvelope(
                "expected exactly one ':' separator",
            ));
        };

        let nonce = hex::decode(nonce)
            .map_err(|_| VaultError::MalformedEnvelope("nonce is not valid hex"))?;
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| VaultError::MalformedEnvelope("nonce has the wrong length"))?;

        let ciphertext = STANDARD
            .decode(ciphertext)
            .map_err(|_| VaultError::MalformedEnvelope("ciphertext is not valid base64"))?;
        if ciphertext.len() < TAG_LEN {
            return Err(VaultError::MalformedEnvelope(
                "ciphertext is shorter than the authentication tag",
            ));
        }

        Ok(Self { nonce, ciphertext })
    }
}
