//! Whole-file encryption and decryption
//!
//! An encrypted file holds the base64 text form of exactly one envelope.
//! Both directions read the whole input into memory.

use crate::encoding;
use crate::envelope::{self, EnvelopeParts};
use crate::error::{ErrorCategory, ErrorKind, PwcryptError, Result};
use crate::password::PasswordReader;
use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Encrypt the contents of `input_path` into `output_path` as envelope text.
///
/// The input is read before a password is asked for, so a missing file
/// fails without prompting.
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    password_reader: &mut dyn PasswordReader,
) -> Result<()> {
    let plaintext = read_file(input_path)?;
    let password = password_reader.read_password()?;
    let sealed = envelope::encrypt(&plaintext, &password)?;
    write_private(output_path, encoding::to_text(&sealed).as_bytes())?;

    info!(
        "encrypted {} ({} bytes) into {}",
        input_path.display(),
        plaintext.len(),
        output_path.display()
    );
    Ok(())
}

/// Decrypt the envelope text in `input_path` into `output_path`.
///
/// Nothing is written unless decryption succeeds.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    password_reader: &mut dyn PasswordReader,
) -> Result<()> {
    let sealed = read_envelope(input_path)?;
    let password = password_reader.read_password()?;
    let plaintext = envelope::decrypt(&sealed, &password)
        .map_err(|e| e.with_context(format!("failed to decrypt {}", input_path.display())))?;
    write_private(output_path, &plaintext)?;

    info!(
        "decrypted {} into {} ({} bytes)",
        input_path.display(),
        output_path.display(),
        plaintext.len()
    );
    Ok(())
}

/// Load an encrypted file and check that it holds a well-formed envelope.
///
/// Surrounding ASCII whitespace is dropped first, since editors like to add
/// a final newline. The envelope structure is checked here so that a
/// damaged file is reported before the user is asked for a password.
fn read_envelope(path: &Path) -> Result<Vec<u8>> {
    let raw = read_file(path)?;
    let text = std::str::from_utf8(&raw).map_err(|e| {
        PwcryptError::with_kind_and_source(
            ErrorCategory::InvalidInput,
            ErrorKind::TextDecode,
            format!("{} is not a text file", path.display()),
            e,
        )
    })?;

    let context = || format!("{} does not hold a pwcrypt envelope", path.display());
    let sealed = encoding::from_text(text.trim_ascii()).map_err(|e| e.with_context(context()))?;
    EnvelopeParts::parse(&sealed).map_err(|e| e.with_context(context()))?;

    debug!("read {} byte envelope from {}", sealed.len(), path.display());
    Ok(sealed)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| PwcryptError::io(format!("failed to read {}", path.display()), e))
}

/// Create or truncate `path` and write `contents`. On Unix a newly created
/// file is readable by its owner only.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options
        .open(path)
        .and_then(|mut file| file.write_all(contents))
        .map_err(|e| PwcryptError::io(format!("failed to write {}", path.display()), e))
}
