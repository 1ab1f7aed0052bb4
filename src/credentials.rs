//! Sources of the master password.
//!
//! A provider yields a password-equivalent secret; the session feeds it
//! into `initialize`/`unlock` without knowing where it came from. A
//! platform biometric or PIN gate is just another provider.

use std::env;

use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::keyfile::Protection;

pub trait CredentialProvider {
    fn password(&self) -> Result<Zeroizing<String>>;

    /// Protection mode recorded when this provider initializes a vault.
    fn protection(&self) -> Protection {
        Protection::Passphrase
    }
}

/// A password already held by the caller, e.g. typed into a dialog.
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }
}

impl From<Zeroizing<String>> for Passphrase {
    fn from(password: Zeroizing<String>) -> Self {
        Self(password)
    }
}

impl CredentialProvider for Passphrase {
    fn password(&self) -> Result<Zeroizing<String>> {
        if self.0.is_empty() {
            return Err(VaultError::CredentialUnavailable(
                "password cannot be empty".to_string(),
            ));
        }
        Ok(self.0.clone())
    }
}

/// Reads the password from an environment variable on each call.
pub struct EnvPassphrase {
    var: String,
}

impl EnvPassphrase {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvPassphrase {
    fn password(&self) -> Result<Zeroizing<String>> {
        match env::var(&self.var) {
            Ok(pw) if !pw.is_empty() => Ok(Zeroizing::new(pw)),
            _ => Err(VaultError::CredentialUnavailable(format!(
                "environment variable {} is not set",
                self.var
            ))),
        }
    }
}

/// Opt-in convenience mode: no passphrase, the OS account is the only gate.
///
/// The secret is derived from the account name and is therefore guessable
/// by anyone who knows it. Vaults created this way are marked
/// [`Protection::OsAccount`] so the mode stays visible to the user.
pub struct OsAccount {
    user: String,
}

impl OsAccount {
    /// Uses the account of the current process.
    pub fn current() -> Result<Self> {
        ["USER", "USERNAME", "LOGNAME"]
            .iter()
            .find_map(|var| env::var(var).ok().filter(|u| !u.is_empty()))
            .map(|user| Self { user })
            .ok_or_else(|| {
                VaultError::CredentialUnavailable("cannot determine OS account name".to_string())
            })
    }

    pub fn for_user(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl CredentialProvider for OsAccount {
    fn password(&self) -> Result<Zeroizing<String>> {
        Ok(Zeroizing::new(format!("{}@safekey-os-account", self.user)))
    }

    fn protection(&self) -> Protection {
        Protection::OsAccount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn passphrase_rejects_empty() {
        assert_eq!(
            Passphrase::new("").password().unwrap_err().kind(),
            ErrorKind::CredentialUnavailable
        );
        assert_eq!(Passphrase::new("pw").password().unwrap().as_str(), "pw");
        assert_eq!(Passphrase::new("pw").protection(), Protection::Passphrase);
    }

    #[test]
    fn missing_env_var_is_unavailable() {
        let provider = EnvPassphrase::new("SAFEKEY_TEST_SURELY_UNSET_VARIABLE");
        assert_eq!(
            provider.password().unwrap_err().kind(),
            ErrorKind::CredentialUnavailable
        );
    }

    #[test]
    fn os_account_is_stable_per_user_and_marked() {
        let a = OsAccount::for_user("alice");
        assert_eq!(a.password().unwrap(), OsAccount::for_user("alice").password().unwrap());
        assert_ne!(a.password().unwrap(), OsAccount::for_user("bob").password().unwrap());
        assert_eq!(a.protection(), Protection::OsAccount);
    }
}
