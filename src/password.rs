//! Passwords and the sources they are read from
//!
//! A password is Unicode text. It reaches the KDF as its UTF-8 bytes,
//! unnormalized and untrimmed, so the same character sequence always derives
//! the same key regardless of platform or locale.

use crate::error::{ErrorCategory, ErrorKind, PwcryptError, Result};
use std::fmt;
use std::io::{self, IsTerminal, Read, Write};
use zeroize::{Zeroize, Zeroizing};

/// Owned password text, wiped from memory when dropped.
#[derive(Clone)]
pub struct Password(Zeroizing<String>);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    /// Builds a password from a character sequence.
    pub fn from_chars(chars: &[char]) -> Self {
        // Sized up front so no reallocation leaves a partial copy behind.
        let mut text = String::with_capacity(chars.iter().map(|c| c.len_utf8()).sum());
        text.extend(chars);
        Self(Zeroizing::new(text))
    }

    /// Takes ownership of UTF-8 bytes. Invalid input is wiped before the
    /// error is returned.
    pub fn from_utf8(mut bytes: Zeroizing<Vec<u8>>) -> Result<Self> {
        match String::from_utf8(std::mem::take(&mut *bytes)) {
            Ok(text) => Ok(Self(Zeroizing::new(text))),
            Err(e) => {
                let utf8_error = e.utf8_error();
                let mut rejected = e.into_bytes();
                rejected.zeroize();
                Err(PwcryptError::with_kind_and_source(
                    ErrorCategory::InvalidInput,
                    ErrorKind::PasswordNotUtf8,
                    "password is not valid UTF-8",
                    utf8_error,
                ))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// UTF-8 encoding of the password, as fed to the KDF.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

impl From<&str> for Password {
    fn from(password: &str) -> Self {
        Self::new(password)
    }
}

impl From<String> for Password {
    fn from(password: String) -> Self {
        Self::new(password)
    }
}

/// A source of passwords: fixed, piped, or typed at a terminal.
pub trait PasswordReader {
    fn read_password(&mut self) -> Result<Password>;
}

/// Always hands out the same password.
pub struct ConstantPasswordReader {
    password: Password,
}

impl ConstantPasswordReader {
    pub fn new(password: impl Into<Password>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl PasswordReader for ConstantPasswordReader {
    fn read_password(&mut self) -> Result<Password> {
        Ok(self.password.clone())
    }
}

/// Reads a password from any io::Read source until EOF
///
/// A single trailing line terminator (`\n` or `\r\n`) is dropped so that
/// `echo secret | pwcrypt --passphrase-stdin ...` works. Nothing else is
/// trimmed.
pub struct ReaderPasswordReader {
    reader: Box<dyn Read>,
}

impl ReaderPasswordReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PasswordReader for ReaderPasswordReader {
    fn read_password(&mut self) -> Result<Password> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader
            .read_to_end(&mut data)
            .map_err(|e| PwcryptError::io("error reading password", e))?;

        let terminator = if data.ends_with(b"\r\n") {
            2
        } else if data.ends_with(b"\n") {
            1
        } else {
            0
        };
        let len = data.len() - terminator;
        data.truncate(len);

        Password::from_utf8(data)
    }
}

/// Prompts on stderr and reads a password from the terminal with no echo.
#[derive(Default)]
pub struct TerminalPasswordReader;

impl TerminalPasswordReader {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordReader for TerminalPasswordReader {
    fn read_password(&mut self) -> Result<Password> {
        if !io::stdin().is_terminal() {
            return Err(PwcryptError::with_kind(
                ErrorCategory::Environment,
                ErrorKind::PassphraseUnavailable,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        let mut stderr = io::stderr().lock();
        stderr
            .write_all(b"Password (pwcrypt): ")
            .and_then(|()| stderr.flush())
            .map_err(|e| PwcryptError::io("failed to write password prompt", e))?;
        drop(stderr);

        // rpassword hands back a plain String; move it straight into the
        // zeroizing wrapper.
        rpassword::read_password().map(Password::new).map_err(|e| {
            PwcryptError::with_kind_and_source(
                ErrorCategory::Environment,
                ErrorKind::PassphraseUnavailable,
                "failed to read password from terminal",
                e,
            )
        })
    }
}
