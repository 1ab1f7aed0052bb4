use anyhow::{Result, bail};
use safekey::{CredentialProvider, VaultError};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "SAFEKEY_PASSWORD";

/// Password from the environment, piped stdin or an interactive prompt.
pub struct Prompt {
    confirm: bool,
}

impl Prompt {
    /// Asks once for the current master password.
    pub fn existing() -> Self {
        Self { confirm: false }
    }

    /// Asks for a new master password and its confirmation.
    pub fn new_password() -> Self {
        Self { confirm: true }
    }
}

impl CredentialProvider for Prompt {
    fn password(&self) -> safekey::Result<Zeroizing<String>> {
        let password = if self.confirm {
            read_new_password_with_confirmation()
        } else {
            read_password()
        };
        password.map_err(|e| VaultError::CredentialUnavailable(e.to_string()))
    }
}

fn password_from_env() -> Option<Zeroizing<String>> {
    //  SAFEKEY_PASSWORD="supersecret" safekey decrypt ...
    match std::env::var(PASSWORD_ENV) {
        Ok(pw) if !pw.is_empty() => Some(Zeroizing::new(pw)),
        _ => None,
    }
}

pub fn read_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        return Ok(pw);
    }

    //  echo "supersecret" | safekey decrypt ...
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    }

    if io::stdin().is_terminal() {
        let pw = Zeroizing::new(rpassword::prompt_password("Master password: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("no password provided")
}

pub fn read_new_password_with_confirmation() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        return Ok(pw);
    }

    let (pw1, pw2) = if io::stdin().is_terminal() {
        (
            Zeroizing::new(rpassword::prompt_password("New master password: ")?),
            Zeroizing::new(rpassword::prompt_password("Confirm password: ")?),
        )
    } else {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        let mut pw1 = Zeroizing::new(String::new());
        let mut pw2 = Zeroizing::new(String::new());
        handle.read_line(&mut pw1)?;
        handle.read_line(&mut pw2)?;
        trim_newline(&mut pw1);
        trim_newline(&mut pw2);
        (pw1, pw2)
    };

    if pw1.is_empty() {
        bail!("password cannot be empty");
    }

    if pw1 != pw2 {
        bail!("passwords do not match");
    }

    Ok(pw1)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
